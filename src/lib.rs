/// Feed Reconciler - Gapless Market Data Retrieval
///
/// Client for a fixed-format binary exchange feed. Features include:
/// - Fixed-width record decoding (17-byte big-endian frames)
/// - Request/response session over a byte stream with timeout-based quiescence
/// - Sequence number gap detection
/// - Per-sequence resend backfill with a configurable retry policy
/// - Ordered JSON projection of the reconciled record set

pub mod protocol;
pub mod decoder;
pub mod session;
pub mod record_set;
pub mod gap_detector;
pub mod recovery;
pub mod output;
pub mod config;
pub mod stats;

pub use protocol::{Request, RequestKind, ProtocolError, RECORD_SIZE, REQUEST_SIZE, MAX_RESEND_SEQUENCE};
pub use decoder::{Decoder, DecodeError, Record};
pub use session::{Session, SessionError, Transport, TcpTransport, FrameRead};
pub use record_set::{RecordSet, Insert};
pub use gap_detector::{GapDetector, GapSet};
pub use recovery::{Reconciler, ReconcileContext, Reconciliation, Outcome, Phase, ResendPolicy};
pub use output::{OutputRecord, project, write_json, write_json_file};
pub use config::{ClientConfig, ConfigError};
pub use stats::ReconcileStats;
