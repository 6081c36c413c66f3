use super::timestamp::{Frame, GameTime};
use std::collections::VecDeque;
use thiserror::Error;

/// Protocol violations raised by a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("frame at game time {game_time} appended after {last}")]
    OutOfOrder { last: GameTime, game_time: GameTime },
}

/// Time-ordered retention buffer for one stream side.
///
/// Frames are appended at the tail in non-decreasing `game_time` order and
/// trimmed only from the head, so lookups can binary search.
#[derive(Debug, Clone)]
pub struct FrameBuffer<P> {
    frames: VecDeque<Frame<P>>,
    evicted_total: u64,
}

impl<P> Default for FrameBuffer<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> FrameBuffer<P> {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
            evicted_total: 0,
        }
    }

    /// Appends a frame; `game_time` must not go backwards.
    pub fn append(&mut self, frame: Frame<P>) -> Result<(), BufferError> {
        if let Some(last) = self.last_game_time() {
            if frame.game_time < last {
                return Err(BufferError::OutOfOrder {
                    last,
                    game_time: frame.game_time,
                });
            }
        }
        self.frames.push_back(frame);
        Ok(())
    }

    /// Exact-match lookup. Nearest-neighbour matching never happens here.
    pub fn lookup(&self, game_time: GameTime) -> Option<&Frame<P>> {
        let idx = self
            .frames
            .partition_point(|frame| frame.game_time < game_time);
        self.frames
            .get(idx)
            .filter(|frame| frame.game_time == game_time)
    }

    /// Discards the longest prefix with `game_time < floor`, returning how many frames went.
    pub fn trim(&mut self, floor: GameTime) -> usize {
        let cut = self.frames.partition_point(|frame| frame.game_time < floor);
        self.frames.drain(..cut);
        self.evicted_total += cut as u64;
        cut
    }

    /// Frames currently retained.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Oldest retained game time.
    pub fn first_game_time(&self) -> Option<GameTime> {
        self.frames.front().map(|frame| frame.game_time)
    }

    /// Newest retained game time, the ordering bound for `append`.
    pub fn last_game_time(&self) -> Option<GameTime> {
        self.frames.back().map(|frame| frame.game_time)
    }

    /// Total frames discarded by `trim` since construction.
    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }
}
