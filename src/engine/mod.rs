//! Matching engine: pending-match scheduling, retention, scoring, and the
//! node that ties them to the per-stream primitives.

pub mod metric;
pub mod node;
pub mod retention;
pub mod scheduler;

pub use metric::{IouScore, LabelMap, MeanIou, MetricError, MetricEvaluator};
pub use node::{
    EngineError, EvaluationNode, FrameDisposition, NodeTelemetry, PassSummary, TickReport,
};
pub use retention::{GarbageCollector, RetentionPlan};
pub use scheduler::{MatchScheduler, PendingMatch};
