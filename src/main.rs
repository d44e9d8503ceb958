use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feed_reconciler::config::{DEFAULT_HOST, DEFAULT_OUTPUT, DEFAULT_PORT, DEFAULT_TIMEOUT_SECS};
use feed_reconciler::{
    project, write_json_file, ClientConfig, Outcome, Reconciler, ResendPolicy, Session,
};

#[derive(Debug, Parser)]
#[command(version, about = "Retrieve a gapless, sequence-ordered record set from the exchange feed")]
struct Args {
    /// Feed server host
    #[arg(long, env = "FEED_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Feed server port
    #[arg(long, env = "FEED_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Receive timeout per read, in seconds
    #[arg(long, env = "FEED_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Output JSON file
    #[arg(long, short = 'o', env = "FEED_OUTPUT", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Resend requests per missing sequence
    #[arg(long, env = "FEED_RESEND_ATTEMPTS", default_value_t = 1)]
    resend_attempts: u32,

    /// Pause between resend retries, in milliseconds
    #[arg(long, env = "FEED_RESEND_BACKOFF_MS", default_value_t = 0)]
    resend_backoff_ms: u64,
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        ClientConfig {
            host: args.host,
            port: args.port,
            timeout: Duration::from_secs(args.timeout_secs),
            output_path: args.output,
            resend: ResendPolicy {
                attempts: args.resend_attempts,
                backoff: Duration::from_millis(args.resend_backoff_ms),
            },
        }
    }
}

fn run(config: &ClientConfig) -> Result<Outcome> {
    let addr = config.address();
    let session = Session::connect(&addr, config.timeout)?;
    info!(%addr, "connected");

    let mut reconciler = Reconciler::new(session, config.resend);
    let result = reconciler.run().context("stream request failed")?;

    let records = project(&result.records);
    write_json_file(&records, &config.output_path)
        .with_context(|| format!("write {}", config.output_path.display()))?;
    info!(path = %config.output_path.display(), records = records.len(), "JSON file saved");

    Ok(result.outcome)
}

fn main() -> ExitCode {
    let _ = dotenv();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ClientConfig::from(args);
    if let Err(e) = config.validate() {
        error!("invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    match run(&config) {
        Ok(Outcome::Complete) => ExitCode::SUCCESS,
        Ok(outcome) => {
            warn!(
                missing = outcome.missing_count(),
                ranges = ?outcome.missing_ranges(),
                "record set is incomplete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
