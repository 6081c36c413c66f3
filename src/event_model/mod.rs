//! Per-stream primitives: timestamps, sequence validation, retention buffers,
//! and the notification clock. Each piece is owned by exactly one node.

pub mod buffer;
pub mod clock;
pub mod sequence;
pub mod timestamp;

pub use buffer::{BufferError, FrameBuffer};
pub use clock::{quantize, ClockError, TickClock, TickOutcome};
pub use sequence::{SequenceGap, SequenceGuard, NOTIFICATION_STREAM};
pub use timestamp::{Frame, GameTime, StreamRole, Timestamp};
