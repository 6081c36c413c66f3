use crate::config::MatchPolicy;
use crate::event_model::GameTime;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// A score plus the match context it was computed for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRecord<S> {
    pub node: String,
    pub policy: MatchPolicy,
    pub metric: String,
    pub payload_time: GameTime,
    pub ready_time: GameTime,
    pub score: S,
}

/// Receives every score the node emits.
pub trait ScoreSink<S> {
    fn on_score(&mut self, record: ScoreRecord<S>) -> Result<(), ReportError>;
}

impl<S> ScoreSink<S> for Vec<ScoreRecord<S>> {
    fn on_score(&mut self, record: ScoreRecord<S>) -> Result<(), ReportError> {
        self.push(record);
        Ok(())
    }
}

/// Errors surfaced while reporting a score.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to serialize score record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write score line: {0}")]
    Io(#[from] std::io::Error),
}

/// Wall-clock source used to stamp score lines.
pub trait WallClock {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&mut self) -> u64;
}

/// `SystemTime`-backed wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now_ms(&mut self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis().min(u128::from(u64::MAX)) as u64)
            .unwrap_or(0)
    }
}

/// Rotation policy for score segments (default 1 MiB x 10 segments).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreLogPolicy {
    pub max_bytes: usize,
    pub max_files: usize,
}

impl Default for ScoreLogPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 1 << 20,
            max_files: 10,
        }
    }
}

/// Lines accumulated in one rotated segment.
#[derive(Debug, Default, Clone)]
pub struct ScoreSegment {
    lines: Vec<String>,
    bytes_written: usize,
}

impl ScoreSegment {
    /// Lines contained in the segment.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Total bytes recorded before rotation.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }
}

/// JSON-line score log with size-based rotation.
pub struct ScoreLog {
    policy: ScoreLogPolicy,
    clock: Box<dyn WallClock + Send>,
    segments: VecDeque<ScoreSegment>,
    active: ScoreSegment,
    records_total: u64,
}

impl fmt::Debug for ScoreLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoreLog")
            .field("policy", &self.policy)
            .field("segments", &self.segments.len())
            .field("records_total", &self.records_total)
            .finish()
    }
}

impl ScoreLog {
    /// Creates a log stamped by the system wall clock.
    pub fn new(policy: ScoreLogPolicy) -> Self {
        Self::with_clock(policy, Box::new(SystemWallClock))
    }

    /// Creates a log stamped by a custom clock (deterministic in tests).
    pub fn with_clock(policy: ScoreLogPolicy, clock: Box<dyn WallClock + Send>) -> Self {
        Self {
            policy,
            clock,
            segments: VecDeque::new(),
            active: ScoreSegment::default(),
            records_total: 0,
        }
    }

    /// Rotated segments followed by the active one, oldest first.
    pub fn segments(&self) -> impl Iterator<Item = &ScoreSegment> {
        self.segments.iter().chain(std::iter::once(&self.active))
    }

    /// Every retained line, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.segments()
            .flat_map(|segment| segment.lines.iter().map(String::as_str))
    }

    /// Records written since construction, including rotated-out ones.
    pub fn records_total(&self) -> u64 {
        self.records_total
    }

    /// Serializes a record into the active segment and returns the written line.
    pub fn record<S: Serialize>(&mut self, record: &ScoreRecord<S>) -> Result<&str, ReportError> {
        let line = serde_json::to_string(&ScoreLine {
            ts_ms: self.clock.now_ms(),
            node: &record.node,
            policy: record.policy.as_str(),
            metric: &record.metric,
            payload_time: record.payload_time,
            ready_time: record.ready_time,
            score: &record.score,
        })?;
        self.rotate_if_needed(line.len());
        self.active.bytes_written = self.active.bytes_written.saturating_add(line.len());
        self.active.lines.push(line);
        self.records_total += 1;
        Ok(self.active.lines.last().map(String::as_str).unwrap_or_default())
    }

    fn rotate_if_needed(&mut self, next_line_len: usize) {
        if self.active.bytes_written + next_line_len <= self.policy.max_bytes {
            return;
        }
        if !self.active.lines.is_empty() {
            self.segments.push_back(std::mem::take(&mut self.active));
            while self.segments.len() > self.policy.max_files {
                self.segments.pop_front();
            }
        }
    }
}

impl<S: Serialize> ScoreSink<S> for ScoreLog {
    fn on_score(&mut self, record: ScoreRecord<S>) -> Result<(), ReportError> {
        self.record(&record)?;
        Ok(())
    }
}

/// Score sink that keeps the rotating log and streams every line to a writer,
/// so nothing rotated out of memory is lost from the output.
pub struct ScoreWriter<W> {
    log: ScoreLog,
    out: W,
    lines_written: u64,
}

impl<W: Write> ScoreWriter<W> {
    /// Creates a sink forwarding each line of `log` to `out`.
    pub fn new(log: ScoreLog, out: W) -> Self {
        Self {
            log,
            out,
            lines_written: 0,
        }
    }

    /// Returns the in-memory rotating log.
    pub fn log(&self) -> &ScoreLog {
        &self.log
    }

    /// Lines successfully written to the output.
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> Result<(), ReportError> {
        self.out.flush()?;
        Ok(())
    }

    /// Returns the log and the writer.
    pub fn into_parts(self) -> (ScoreLog, W) {
        (self.log, self.out)
    }
}

impl<S: Serialize, W: Write> ScoreSink<S> for ScoreWriter<W> {
    fn on_score(&mut self, record: ScoreRecord<S>) -> Result<(), ReportError> {
        let line = self.log.record(&record)?;
        writeln!(self.out, "{line}")?;
        self.lines_written += 1;
        Ok(())
    }
}

#[derive(Serialize)]
struct ScoreLine<'a, S> {
    ts_ms: u64,
    node: &'a str,
    policy: &'a str,
    metric: &'a str,
    payload_time: GameTime,
    ready_time: GameTime,
    score: &'a S,
}
