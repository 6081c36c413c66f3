//! Stream alignment and pairwise evaluation engine.
//!
//! Two asynchronous producers (ground truth and candidate output) feed
//! timestamped frames into an [`EvaluationNode`]; periodic notification
//! ticks release matched pairs to a [`MetricEvaluator`] and the scores flow
//! out through a [`ScoreSink`].

pub mod app;
pub mod config;
pub mod engine;
pub mod event_model;
pub mod observability;

pub use config::{ConfigError, EvalConfig, GapPolicy, MatchPolicy, PayloadSource};
pub use engine::{
    EngineError, EvaluationNode, FrameDisposition, GarbageCollector, IouScore, LabelMap,
    MatchScheduler, MeanIou, MetricError, MetricEvaluator, NodeTelemetry, PassSummary,
    PendingMatch, RetentionPlan, TickReport,
};
pub use event_model::{
    quantize, BufferError, ClockError, Frame, FrameBuffer, GameTime, SequenceGap, SequenceGuard,
    StreamRole, TickClock, TickOutcome, Timestamp, NOTIFICATION_STREAM,
};
pub use observability::{
    ReportError, ScoreLog, ScoreLogPolicy, ScoreRecord, ScoreSegment, ScoreSink, ScoreWriter,
    SystemWallClock, Verbosity, WallClock,
};
