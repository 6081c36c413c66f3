use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical simulation time shared by every producer stream.
pub type GameTime = u64;

/// Pipeline timestamp: a shared `game_time` plus a per-stream sequence number.
///
/// Timestamps from different streams are only comparable by `game_time`; the
/// sequence number is used for intra-stream gap detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub game_time: GameTime,
    pub sequence: u64,
}

impl Timestamp {
    pub fn new(game_time: GameTime, sequence: u64) -> Self {
        Self {
            game_time,
            sequence,
        }
    }
}

/// Which side of the comparison a producer stream feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamRole {
    GroundTruth,
    Candidate,
}

impl StreamRole {
    /// Stream identifier used by the sequence guard and in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            StreamRole::GroundTruth => "ground_truth",
            StreamRole::Candidate => "candidate",
        }
    }
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A retained payload keyed by its `game_time`. The payload is opaque to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<P> {
    pub game_time: GameTime,
    pub payload: P,
}

impl<P> Frame<P> {
    pub fn new(game_time: GameTime, payload: P) -> Self {
        Self { game_time, payload }
    }
}
