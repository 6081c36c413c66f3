use crate::observability::ScoreLogPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_NODE_NAME: &str = "eval";

/// How pairing requests are derived from candidate frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchPolicy {
    /// Compare against the counterpart frame at the identical game time.
    #[serde(rename = "exact")]
    ExactTime,
    /// Compare against the counterpart frame current once the payload's
    /// processing latency has elapsed, rounded to the sampling grid.
    #[serde(rename = "latency-adjusted")]
    LatencyAdjusted,
}

impl MatchPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchPolicy::ExactTime => "exact",
            MatchPolicy::LatencyAdjusted => "latency-adjusted",
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "exact" | "mIoU" => Ok(MatchPolicy::ExactTime),
            "latency-adjusted" | "timely-mIoU" => Ok(MatchPolicy::LatencyAdjusted),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}

/// What the node does when a stream skips a sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Log a warning and keep processing.
    #[default]
    Continue,
    /// Halt the node.
    Abort,
}

/// Buffer the payload side of a match is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadSource {
    /// Candidate output scored against later ground truth.
    #[default]
    Candidate,
    /// Ground truth scored against later ground truth (temporal decay of a perfect model).
    GroundTruth,
}

/// Typed configuration for one evaluation node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalConfig {
    pub node_name: String,
    pub policy: MatchPolicy,
    pub on_sequence_gap: GapPolicy,
    pub payload_source: PayloadSource,
    pub warmup_frames: u64,
    pub score_log: ScoreLogPolicy,
}

impl EvalConfig {
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            node_name: DEFAULT_NODE_NAME.to_string(),
            policy,
            on_sequence_gap: GapPolicy::default(),
            payload_source: PayloadSource::default(),
            warmup_frames: 0,
            score_log: ScoreLogPolicy::default(),
        }
    }

    pub fn with_node_name(mut self, name: impl Into<String>) -> Self {
        self.node_name = name.into();
        self
    }

    pub fn with_gap_policy(mut self, policy: GapPolicy) -> Self {
        self.on_sequence_gap = policy;
        self
    }

    pub fn with_payload_source(mut self, source: PayloadSource) -> Self {
        self.payload_source = source;
        self
    }

    pub fn with_warmup_frames(mut self, frames: u64) -> Self {
        self.warmup_frames = frames;
        self
    }

    /// Parses a JSON document. Policy identifiers are resolved here, never per frame.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let raw: RawEvalConfig = serde_json::from_str(document)?;
        raw.try_into()
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let document = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&document)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEvalConfig {
    #[serde(default = "default_node_name")]
    node_name: String,
    policy: String,
    #[serde(default)]
    on_sequence_gap: GapPolicy,
    #[serde(default)]
    payload_source: PayloadSource,
    #[serde(default)]
    warmup_frames: u64,
    #[serde(default)]
    score_log: Option<RawScoreLog>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScoreLog {
    max_bytes: usize,
    max_files: usize,
}

impl TryFrom<RawEvalConfig> for EvalConfig {
    type Error = ConfigError;

    fn try_from(raw: RawEvalConfig) -> Result<Self, Self::Error> {
        let policy = raw.policy.parse()?;
        let score_log = match raw.score_log {
            Some(log) if log.max_bytes == 0 => {
                return Err(ConfigError::Invalid("score_log.max_bytes must be positive".into()))
            }
            Some(log) => ScoreLogPolicy {
                max_bytes: log.max_bytes,
                max_files: log.max_files,
            },
            None => ScoreLogPolicy::default(),
        };
        Ok(Self {
            node_name: raw.node_name,
            policy,
            on_sequence_gap: raw.on_sequence_gap,
            payload_source: raw.payload_source,
            warmup_frames: raw.warmup_frames,
            score_log,
        })
    }
}

fn default_node_name() -> String {
    DEFAULT_NODE_NAME.to_string()
}

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown matching policy `{0}`")]
    UnknownPolicy(String),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
