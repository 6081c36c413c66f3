use std::collections::HashMap;
use thiserror::Error;

/// Reserved stream id used for pipeline notification ticks.
pub const NOTIFICATION_STREAM: &str = "notifications";

/// Raised when a stream skips or repeats a sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected msg with seq num {expected} but received {actual}")]
pub struct SequenceGap {
    pub expected: u64,
    pub actual: u64,
}

/// Tracks the last accepted sequence number per stream.
///
/// The incoming value is always recorded, gap or not, so a single lost
/// message produces exactly one gap instead of latching every later one.
#[derive(Debug, Default, Clone)]
pub struct SequenceGuard {
    last_accepted: HashMap<String, u64>,
    gaps_total: u64,
}

impl SequenceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `sequence` against the stream's last accepted value.
    pub fn validate(&mut self, stream_id: &str, sequence: u64) -> Result<(), SequenceGap> {
        let previous = self.last_accepted.insert(stream_id.to_string(), sequence);
        match previous {
            Some(last) if last.checked_add(1) != Some(sequence) => {
                self.gaps_total += 1;
                Err(SequenceGap {
                    expected: last.saturating_add(1),
                    actual: sequence,
                })
            }
            _ => Ok(()),
        }
    }

    /// Returns the last recorded sequence number for a stream, if any.
    pub fn last_accepted(&self, stream_id: &str) -> Option<u64> {
        self.last_accepted.get(stream_id).copied()
    }

    /// Number of gaps observed across all streams.
    pub fn gaps_total(&self) -> u64 {
        self.gaps_total
    }
}
