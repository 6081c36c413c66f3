use super::timestamp::GameTime;
use thiserror::Error;

/// Failures raised while deriving the sampling interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClockError {
    #[error("second bootstrap tick at {second} does not advance past {first}")]
    InvalidSamplingInterval { first: GameTime, second: GameTime },
}

/// Result of feeding one notification tick to the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// First tick: baseline recorded, nothing to schedule.
    Baseline,
    /// Second tick: the sampling interval is now known.
    IntervalEstablished { sampling_interval: GameTime },
    /// Steady state: run a scheduling pass with this watermark.
    Advance { watermark: GameTime },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClockState {
    AwaitingBaseline,
    AwaitingInterval { baseline: GameTime },
    Running { sampling_interval: GameTime },
}

/// Consumes notification ticks, derives the sampling interval from the first
/// two, and hands out the current watermark afterwards.
#[derive(Debug, Clone)]
pub struct TickClock {
    state: ClockState,
    watermark: Option<GameTime>,
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickClock {
    pub fn new() -> Self {
        Self {
            state: ClockState::AwaitingBaseline,
            watermark: None,
        }
    }

    /// Builds a clock that skips bootstrap, for callers that already know the interval.
    pub fn with_interval(sampling_interval: GameTime) -> Result<Self, ClockError> {
        if sampling_interval == 0 {
            return Err(ClockError::InvalidSamplingInterval {
                first: 0,
                second: 0,
            });
        }
        Ok(Self {
            state: ClockState::Running { sampling_interval },
            watermark: None,
        })
    }

    /// Advances the bootstrap state machine, or the watermark once running.
    pub fn on_tick(&mut self, game_time: GameTime) -> Result<TickOutcome, ClockError> {
        match self.state {
            ClockState::AwaitingBaseline => {
                self.state = ClockState::AwaitingInterval {
                    baseline: game_time,
                };
                Ok(TickOutcome::Baseline)
            }
            ClockState::AwaitingInterval { baseline } => {
                if game_time <= baseline {
                    return Err(ClockError::InvalidSamplingInterval {
                        first: baseline,
                        second: game_time,
                    });
                }
                let sampling_interval = game_time - baseline;
                self.state = ClockState::Running { sampling_interval };
                Ok(TickOutcome::IntervalEstablished { sampling_interval })
            }
            ClockState::Running { .. } => {
                self.watermark = Some(game_time);
                Ok(TickOutcome::Advance {
                    watermark: game_time,
                })
            }
        }
    }

    pub fn sampling_interval(&self) -> Option<GameTime> {
        match self.state {
            ClockState::Running { sampling_interval } => Some(sampling_interval),
            _ => None,
        }
    }

    /// Watermark of the latest steady-state tick.
    pub fn watermark(&self) -> Option<GameTime> {
        self.watermark
    }

    /// True once the sampling interval is known.
    pub fn is_bootstrapped(&self) -> bool {
        matches!(self.state, ClockState::Running { .. })
    }

    /// Rounds `time` to the nearest multiple of the sampling interval,
    /// returning `None` until the interval is known.
    pub fn quantize(&self, time: GameTime) -> Option<GameTime> {
        self.sampling_interval()
            .map(|interval| quantize(time, interval))
    }
}

/// Rounds to the nearest multiple of `interval`; a remainder of at least half
/// the interval rounds up.
pub fn quantize(time: GameTime, interval: GameTime) -> GameTime {
    if interval == 0 {
        return time;
    }
    let base = time / interval * interval;
    let remainder = time - base;
    if remainder.saturating_mul(2) >= interval {
        base.saturating_add(interval)
    } else {
        base
    }
}
