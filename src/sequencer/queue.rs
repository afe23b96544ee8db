// Sequence queue - current / queued / follow sequence indices
// Shared through atomics so the control thread can queue and read without
// waiting on the audio thread, which commits at loop boundaries.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

const NONE: i32 = -1;

fn encode(index: Option<usize>) -> i32 {
    index
        .and_then(|i| i32::try_from(i).ok())
        .unwrap_or(NONE)
}

fn decode(raw: i32) -> Option<usize> {
    usize::try_from(raw).ok()
}

/// Plain snapshot of the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceQueueState {
    pub current: usize,
    pub queued: Option<usize>,
    pub follow: Option<usize>,
}

/// Lock-free sequence queue
#[derive(Debug)]
pub struct SequenceQueue {
    current: AtomicI32,
    queued: AtomicI32,
    follow: AtomicI32,
    sequence_count: usize,
}

impl SequenceQueue {
    pub fn new(sequence_count: usize) -> Arc<Self> {
        Arc::new(Self {
            current: AtomicI32::new(0),
            queued: AtomicI32::new(NONE),
            follow: AtomicI32::new(NONE),
            sequence_count,
        })
    }

    pub fn sequence_count(&self) -> usize {
        self.sequence_count
    }

    /// Request `index` at the next loop end and `follow` after it.
    ///
    /// An out-of-range `index` leaves the queue untouched; an out-of-range
    /// `follow` is treated as "no follow".
    pub fn queue_sequence(&self, index: usize, follow: Option<usize>) -> bool {
        if index >= self.sequence_count {
            return false;
        }
        let follow = follow.filter(|f| *f < self.sequence_count);
        // follow first: a commit racing this call must never see the new
        // queued index paired with the old follow index
        self.follow.store(encode(follow), Ordering::Release);
        self.queued.store(encode(Some(index)), Ordering::Release);
        true
    }

    /// Loop completed: `current = queued ?? follow ?? current`, queued cleared.
    ///
    /// Returns `(previous, new)` current indices.
    pub fn commit(&self) -> (usize, usize) {
        let previous = self.current_sequence();
        let queued = decode(self.queued.swap(NONE, Ordering::AcqRel));
        let follow = decode(self.follow.load(Ordering::Acquire));
        let next = queued.or(follow).unwrap_or(previous);
        self.current.store(encode(Some(next)), Ordering::Release);
        (previous, next)
    }

    pub fn current_sequence(&self) -> usize {
        decode(self.current.load(Ordering::Acquire)).unwrap_or(0)
    }

    pub fn queued_sequence(&self) -> Option<usize> {
        decode(self.queued.load(Ordering::Acquire))
    }

    pub fn follow_sequence(&self) -> Option<usize> {
        decode(self.follow.load(Ordering::Acquire))
    }

    pub fn state(&self) -> SequenceQueueState {
        SequenceQueueState {
            current: self.current_sequence(),
            queued: self.queued_sequence(),
            follow: self.follow_sequence(),
        }
    }
}
