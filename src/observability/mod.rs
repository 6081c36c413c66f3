//! Outward-facing reporting: the score sink collaborator and process logging.

pub mod score_log;
pub mod tracing_setup;

pub use score_log::{
    ReportError, ScoreLog, ScoreLogPolicy, ScoreRecord, ScoreSegment, ScoreSink, ScoreWriter,
    SystemWallClock, WallClock,
};
pub use tracing_setup::{build_env_filter, init_subscriber, Verbosity, LOG_ENV_VAR};
