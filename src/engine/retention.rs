use super::scheduler::MatchScheduler;
use crate::event_model::{FrameBuffer, GameTime};

/// Result of one garbage-collection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionPlan {
    /// Floor applied to the buffers; `None` when nothing was pending and eviction was skipped.
    pub floor: Option<GameTime>,
    pub ground_truth_evicted: usize,
    pub candidate_evicted: usize,
}

impl RetentionPlan {
    pub fn evicted_total(&self) -> usize {
        self.ground_truth_evicted + self.candidate_evicted
    }
}

/// Derives the safe eviction floor from outstanding matches and trims both buffers.
#[derive(Debug, Default, Clone, Copy)]
pub struct GarbageCollector;

impl GarbageCollector {
    pub fn new() -> Self {
        Self
    }

    /// Floor below which no pending match can reach. Undefined with an empty queue.
    pub fn floor(&self, scheduler: &MatchScheduler) -> Option<GameTime> {
        scheduler.retention_floor()
    }

    /// Trims both buffers to the floor. An empty queue skips eviction entirely,
    /// since frames arriving ahead of their request must stay retained.
    pub fn collect<P>(
        &self,
        scheduler: &MatchScheduler,
        ground_truth: &mut FrameBuffer<P>,
        candidate: &mut FrameBuffer<P>,
    ) -> RetentionPlan {
        let Some(floor) = self.floor(scheduler) else {
            return RetentionPlan::default();
        };
        RetentionPlan {
            floor: Some(floor),
            ground_truth_evicted: ground_truth.trim(floor),
            candidate_evicted: candidate.trim(floor),
        }
    }
}
