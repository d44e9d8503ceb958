/// Client configuration
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::recovery::ResendPolicy;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_OUTPUT: &str = "output.json";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("receive timeout must be greater than zero")]
    ZeroTimeout,

    #[error("resend attempts must be at least 1")]
    ZeroAttempts,

    #[error("host must not be empty")]
    EmptyHost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub output_path: PathBuf,
    pub resend: ResendPolicy,
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.resend.attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }

    /// `host:port` for connecting
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            output_path: PathBuf::from(DEFAULT_OUTPUT),
            resend: ResendPolicy::default(),
        }
    }
}
