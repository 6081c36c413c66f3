use crate::event_model::GameTime;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

/// A pairing request waiting for its counterpart frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMatch {
    /// Game time at which the counterpart frame is expected to exist.
    pub ready_time: GameTime,
    /// Game time of the already-known payload frame.
    pub payload_time: GameTime,
}

impl PendingMatch {
    pub fn new(ready_time: GameTime, payload_time: GameTime) -> Self {
        Self {
            ready_time,
            payload_time,
        }
    }

    /// Lowest game time this request still needs retained in any buffer.
    pub fn retention_floor(&self) -> GameTime {
        self.ready_time.min(self.payload_time)
    }
}

/// Priority queue of pending matches, released in `ready_time` order with
/// insertion order breaking ties.
#[derive(Debug, Default, Clone)]
pub struct MatchScheduler {
    heap: BinaryHeap<Reverse<HeapEntry>>,
    next_insertion: u64,
    payload_times: BTreeSet<GameTime>,
    floors: BTreeMap<GameTime, usize>,
}

impl MatchScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a request. Returns `false` (and leaves the queue untouched)
    /// when the same `payload_time` is already pending.
    pub fn enqueue(&mut self, pending: PendingMatch) -> bool {
        if !self.payload_times.insert(pending.payload_time) {
            return false;
        }
        *self.floors.entry(pending.retention_floor()).or_default() += 1;
        let insertion = self.next_insertion;
        self.next_insertion += 1;
        self.heap.push(Reverse(HeapEntry { pending, insertion }));
        true
    }

    /// Head of the queue without removing it.
    pub fn peek(&self) -> Option<PendingMatch> {
        self.heap.peek().map(|Reverse(entry)| entry.pending)
    }

    /// Pops the head if its `ready_time` is at or below `watermark`.
    pub fn pop_ready(&mut self, watermark: GameTime) -> Option<PendingMatch> {
        let head = self.peek()?;
        if head.ready_time > watermark {
            return None;
        }
        self.heap.pop();
        self.payload_times.remove(&head.payload_time);
        decrement(&mut self.floors, head.retention_floor());
        Some(head)
    }

    /// Removes every entry with `ready_time <= watermark`, in release order.
    pub fn drain_ready(&mut self, watermark: GameTime) -> Vec<PendingMatch> {
        let mut released = Vec::new();
        while let Some(pending) = self.pop_ready(watermark) {
            released.push(pending);
        }
        released
    }

    /// Minimum `payload_time` over outstanding requests.
    pub fn watermark(&self) -> Option<GameTime> {
        self.payload_times.first().copied()
    }

    /// Minimum game time any outstanding request still references.
    pub fn retention_floor(&self) -> Option<GameTime> {
        self.floors.keys().next().copied()
    }

    /// Outstanding requests in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = PendingMatch> + '_ {
        self.heap.iter().map(|Reverse(entry)| entry.pending)
    }

    /// Whether a request for `payload_time` is still outstanding.
    pub fn contains_payload(&self, payload_time: GameTime) -> bool {
        self.payload_times.contains(&payload_time)
    }

    /// Outstanding requests.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

fn decrement(counts: &mut BTreeMap<GameTime, usize>, key: GameTime) {
    if let Some(count) = counts.get_mut(&key) {
        *count -= 1;
        if *count == 0 {
            counts.remove(&key);
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct HeapEntry {
    pending: PendingMatch,
    insertion: u64,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pending
            .ready_time
            .cmp(&other.pending.ready_time)
            .then_with(|| self.insertion.cmp(&other.insertion))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
