use super::metric::{MetricError, MetricEvaluator};
use super::retention::{GarbageCollector, RetentionPlan};
use super::scheduler::{MatchScheduler, PendingMatch};
use crate::config::{EvalConfig, GapPolicy, MatchPolicy, PayloadSource};
use crate::event_model::{
    BufferError, ClockError, Frame, FrameBuffer, GameTime, SequenceGap, SequenceGuard,
    StreamRole, TickClock, TickOutcome, Timestamp, NOTIFICATION_STREAM,
};
use crate::observability::{ReportError, ScoreRecord, ScoreSink};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Failures that terminate a node's run. Nothing here is retried.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("sequence gap on stream {stream}: {gap}")]
    SequenceGap { stream: String, gap: SequenceGap },
    #[error(
        "could not find {role} frame at game time {game_time} (payload {}, ready {})",
        .pending.payload_time,
        .pending.ready_time
    )]
    LookupFailure {
        role: StreamRole,
        game_time: GameTime,
        pending: PendingMatch,
    },
    #[error("{role} stream: {source}")]
    Buffer {
        role: StreamRole,
        #[source]
        source: BufferError,
    },
    #[error(transparent)]
    Clock(#[from] ClockError),
    #[error(
        "metric evaluation failed for payload {} at ready {}: {source}",
        .pending.payload_time,
        .pending.ready_time
    )]
    Metric {
        pending: PendingMatch,
        #[source]
        source: MetricError,
    },
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("node halted after fatal error: {0}")]
    Halted(String),
}

/// What happened to a frame handed to [`EvaluationNode::on_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Sequence number inside the warm-up window; validated but not retained.
    Warmup,
    /// Retained without creating a pairing request.
    Buffered,
    /// Retained and a pairing request was queued.
    Enqueued(PendingMatch),
    /// Retained; the request waits for the sampling interval.
    Deferred,
    /// Retained; a request for this payload time was already pending.
    Duplicate,
}

/// Outcome of a scheduling pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub watermark: GameTime,
    pub evaluated: Vec<PendingMatch>,
    pub retention: RetentionPlan,
}

/// What a notification tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickReport {
    /// One of the first two ticks; no pass runs.
    Bootstrap { sampling_interval: Option<GameTime> },
    Pass(PassSummary),
}

/// Point-in-time counters for a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTelemetry {
    pub ground_truth_buffered: usize,
    pub candidate_buffered: usize,
    pub pending_matches: usize,
    pub deferred_requests: usize,
    pub retention_floor: Option<GameTime>,
    pub sampling_interval: Option<GameTime>,
    pub sequence_gaps_total: u64,
    pub scores_emitted_total: u64,
    pub frames_evicted_total: u64,
    pub halted: bool,
}

/// Aligns a ground-truth stream with a candidate stream and scores matched pairs.
///
/// Single-threaded: every call runs to completion before the next event is accepted.
pub struct EvaluationNode<E: MetricEvaluator, K> {
    config: EvalConfig,
    evaluator: E,
    sink: K,
    guard: SequenceGuard,
    clock: TickClock,
    ground_truth: FrameBuffer<E::Payload>,
    candidate: FrameBuffer<E::Payload>,
    scheduler: MatchScheduler,
    collector: GarbageCollector,
    // (payload_time, latency) held until the sampling interval is known
    deferred: Vec<(GameTime, GameTime)>,
    scores_emitted_total: u64,
    halted: Option<String>,
}

impl<E, K> EvaluationNode<E, K>
where
    E: MetricEvaluator,
    K: ScoreSink<E::Score>,
{
    pub fn new(config: EvalConfig, evaluator: E, sink: K) -> Self {
        Self {
            config,
            evaluator,
            sink,
            guard: SequenceGuard::new(),
            clock: TickClock::new(),
            ground_truth: FrameBuffer::new(),
            candidate: FrameBuffer::new(),
            scheduler: MatchScheduler::new(),
            collector: GarbageCollector::new(),
            deferred: Vec::new(),
            scores_emitted_total: 0,
            halted: None,
        }
    }

    /// Feeds one producer frame. `latency` is the payload's processing time,
    /// used only by the latency-adjusted policy.
    pub fn on_frame(
        &mut self,
        role: StreamRole,
        timestamp: Timestamp,
        payload: E::Payload,
        latency: Option<GameTime>,
    ) -> Result<FrameDisposition, EngineError> {
        self.ensure_running()?;
        let result = self.process_frame(role, timestamp, payload, latency);
        self.record_outcome(result)
    }

    /// Feeds one notification tick.
    pub fn on_tick(&mut self, timestamp: Timestamp) -> Result<TickReport, EngineError> {
        self.ensure_running()?;
        let result = self.process_tick(timestamp);
        self.record_outcome(result)
    }

    /// Configuration the node was built with.
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Borrows the score sink.
    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Consumes the node, returning the score sink.
    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Retained ground-truth frames.
    pub fn ground_truth(&self) -> &FrameBuffer<E::Payload> {
        &self.ground_truth
    }

    /// Retained candidate frames.
    pub fn candidate(&self) -> &FrameBuffer<E::Payload> {
        &self.candidate
    }

    /// Pending match requests.
    pub fn scheduler(&self) -> &MatchScheduler {
        &self.scheduler
    }

    /// Notification clock state.
    pub fn clock(&self) -> &TickClock {
        &self.clock
    }

    /// True once any operation has returned an error.
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// Snapshot of the node's counters.
    pub fn telemetry(&self) -> NodeTelemetry {
        NodeTelemetry {
            ground_truth_buffered: self.ground_truth.len(),
            candidate_buffered: self.candidate.len(),
            pending_matches: self.scheduler.len(),
            deferred_requests: self.deferred.len(),
            retention_floor: self.collector.floor(&self.scheduler),
            sampling_interval: self.clock.sampling_interval(),
            sequence_gaps_total: self.guard.gaps_total(),
            scores_emitted_total: self.scores_emitted_total,
            frames_evicted_total: self.ground_truth.evicted_total()
                + self.candidate.evicted_total(),
            halted: self.halted.is_some(),
        }
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        match &self.halted {
            Some(reason) => Err(EngineError::Halted(reason.clone())),
            None => Ok(()),
        }
    }

    fn record_outcome<T>(&mut self, result: Result<T, EngineError>) -> Result<T, EngineError> {
        if let Err(err) = &result {
            error!(node = %self.config.node_name, error = %err, "evaluation node halted");
            self.halted = Some(err.to_string());
        }
        result
    }

    fn validate_sequence(&mut self, stream: &str, sequence: u64) -> Result<(), EngineError> {
        let Err(gap) = self.guard.validate(stream, sequence) else {
            return Ok(());
        };
        match self.config.on_sequence_gap {
            GapPolicy::Continue => {
                warn!(
                    node = %self.config.node_name,
                    stream,
                    expected = gap.expected,
                    actual = gap.actual,
                    "sequence gap tolerated"
                );
                Ok(())
            }
            GapPolicy::Abort => Err(EngineError::SequenceGap {
                stream: stream.to_string(),
                gap,
            }),
        }
    }

    fn process_frame(
        &mut self,
        role: StreamRole,
        timestamp: Timestamp,
        payload: E::Payload,
        latency: Option<GameTime>,
    ) -> Result<FrameDisposition, EngineError> {
        self.validate_sequence(role.as_str(), timestamp.sequence)?;
        if timestamp.sequence < self.config.warmup_frames {
            return Ok(FrameDisposition::Warmup);
        }
        let game_time = timestamp.game_time;
        let buffer = match role {
            StreamRole::GroundTruth => &mut self.ground_truth,
            StreamRole::Candidate => &mut self.candidate,
        };
        buffer
            .append(Frame::new(game_time, payload))
            .map_err(|source| EngineError::Buffer { role, source })?;
        if role == StreamRole::GroundTruth {
            return Ok(FrameDisposition::Buffered);
        }
        match self.config.policy {
            MatchPolicy::ExactTime => Ok(self.enqueue(PendingMatch::new(game_time, game_time))),
            MatchPolicy::LatencyAdjusted => {
                let latency = latency.unwrap_or(0);
                match self.clock.quantize(game_time.saturating_add(latency)) {
                    Some(target) => Ok(self.enqueue(PendingMatch::new(target, game_time))),
                    None => {
                        debug!(
                            node = %self.config.node_name,
                            payload_time = game_time,
                            latency,
                            "deferring request until sampling interval is known"
                        );
                        self.deferred.push((game_time, latency));
                        Ok(FrameDisposition::Deferred)
                    }
                }
            }
        }
    }

    fn enqueue(&mut self, pending: PendingMatch) -> FrameDisposition {
        if !self.scheduler.enqueue(pending) {
            warn!(
                node = %self.config.node_name,
                payload_time = pending.payload_time,
                "duplicate request for pending payload time dropped"
            );
            return FrameDisposition::Duplicate;
        }
        debug!(
            node = %self.config.node_name,
            payload_time = pending.payload_time,
            ready_time = pending.ready_time,
            "match enqueued"
        );
        FrameDisposition::Enqueued(pending)
    }

    fn process_tick(&mut self, timestamp: Timestamp) -> Result<TickReport, EngineError> {
        self.validate_sequence(NOTIFICATION_STREAM, timestamp.sequence)?;
        match self.clock.on_tick(timestamp.game_time)? {
            TickOutcome::Baseline => Ok(TickReport::Bootstrap {
                sampling_interval: None,
            }),
            TickOutcome::IntervalEstablished { sampling_interval } => {
                info!(
                    node = %self.config.node_name,
                    sampling_interval,
                    "sampling interval established"
                );
                self.flush_deferred(sampling_interval);
                Ok(TickReport::Bootstrap {
                    sampling_interval: Some(sampling_interval),
                })
            }
            TickOutcome::Advance { watermark } => self.run_pass(watermark).map(TickReport::Pass),
        }
    }

    fn flush_deferred(&mut self, sampling_interval: GameTime) {
        for (payload_time, latency) in std::mem::take(&mut self.deferred) {
            let target = crate::event_model::quantize(
                payload_time.saturating_add(latency),
                sampling_interval,
            );
            self.enqueue(PendingMatch::new(target, payload_time));
        }
    }

    fn run_pass(&mut self, watermark: GameTime) -> Result<PassSummary, EngineError> {
        let mut evaluated = Vec::new();
        while let Some(pending) = self.scheduler.pop_ready(watermark) {
            self.evaluate(pending)?;
            evaluated.push(pending);
        }
        let retention =
            self.collector
                .collect(&self.scheduler, &mut self.ground_truth, &mut self.candidate);
        if retention.evicted_total() > 0 {
            debug!(
                node = %self.config.node_name,
                floor = ?retention.floor,
                evicted = retention.evicted_total(),
                "buffers trimmed"
            );
        }
        Ok(PassSummary {
            watermark,
            evaluated,
            retention,
        })
    }

    fn evaluate(&mut self, pending: PendingMatch) -> Result<(), EngineError> {
        let counterpart = self.ground_truth.lookup(pending.ready_time).ok_or(
            EngineError::LookupFailure {
                role: StreamRole::GroundTruth,
                game_time: pending.ready_time,
                pending,
            },
        )?;
        let (payload_role, payload_buffer) = match self.config.payload_source {
            PayloadSource::Candidate => (StreamRole::Candidate, &self.candidate),
            PayloadSource::GroundTruth => (StreamRole::GroundTruth, &self.ground_truth),
        };
        let payload =
            payload_buffer
                .lookup(pending.payload_time)
                .ok_or(EngineError::LookupFailure {
                    role: payload_role,
                    game_time: pending.payload_time,
                    pending,
                })?;
        info!(
            node = %self.config.node_name,
            payload_time = pending.payload_time,
            ready_time = pending.ready_time,
            "computing score for matched pair"
        );
        let score = self
            .evaluator
            .evaluate(&counterpart.payload, &payload.payload)
            .map_err(|source| EngineError::Metric { pending, source })?;
        self.sink.on_score(ScoreRecord {
            node: self.config.node_name.clone(),
            policy: self.config.policy,
            metric: self.evaluator.name().to_string(),
            payload_time: pending.payload_time,
            ready_time: pending.ready_time,
            score,
        })?;
        self.scores_emitted_total += 1;
        Ok(())
    }
}
