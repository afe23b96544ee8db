// Track - bounded collection of note events with a length in beats
// Storage is preallocated so edits applied on the audio thread never reallocate

use super::note::NoteEvent;

/// Default number of events a keyboard track can hold
pub const TRACK_CAPACITY: usize = 256;

/// Loop settings of a track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopInfo {
    /// Loop length in beats, 0 when looping is disabled
    pub length: f64,
    /// Number of repeats, 0 means infinite
    pub count: u32,
}

impl LoopInfo {
    pub fn disabled() -> Self {
        Self {
            length: 0.0,
            count: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.length > 0.0
    }
}

/// Ordered note events bounded by a length in beats
///
/// Events keep insertion order; playback sorts by time and breaks ties with
/// that order.
#[derive(Debug, Clone)]
pub struct Track {
    events: Vec<NoteEvent>,
    capacity: usize,
    length: f64,
    loop_info: LoopInfo,
}

impl Track {
    pub fn new(length: f64) -> Self {
        Self::with_capacity(length, TRACK_CAPACITY)
    }

    pub fn with_capacity(length: f64, capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            capacity,
            length: length.max(0.0),
            loop_info: LoopInfo::disabled(),
        }
    }

    /// Add an event. Returns false if the track is full.
    pub fn add(&mut self, event: NoteEvent) -> bool {
        if self.events.len() >= self.capacity {
            return false;
        }
        self.events.push(event);
        true
    }

    /// Remove every event matching `predicate`, returning how many were removed
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&NoteEvent) -> bool,
    {
        let before = self.events.len();
        self.events.retain(|e| !predicate(e));
        before - self.events.len()
    }

    /// Remove events whose start lies in `[start, start + duration)`
    pub fn clear_range(&mut self, start: f64, duration: f64) -> usize {
        let end = start + duration;
        self.remove_where(|e| e.position >= start && e.position < end)
    }

    /// Remove all events
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Change the length, truncating notes that now overrun it.
    ///
    /// Events starting at or past the new length are dropped; events
    /// overlapping it are shortened to end exactly at the boundary.
    pub fn set_length(&mut self, length: f64) {
        let length = length.max(0.0);
        self.events.retain(|e| e.position < length);
        for event in self.events.iter_mut() {
            if event.end() > length {
                event.duration = length - event.position;
            }
        }
        self.length = length;
        if self.loop_info.is_enabled() {
            self.loop_info.length = length;
        }
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    /// Loop the whole track forever
    pub fn enable_looping(&mut self) {
        self.loop_info = LoopInfo {
            length: self.length,
            count: 0,
        };
    }

    pub fn disable_looping(&mut self) {
        self.loop_info = LoopInfo::disabled();
    }

    pub fn loop_info(&self) -> LoopInfo {
        self.loop_info
    }

    pub fn is_looping(&self) -> bool {
        self.loop_info.is_enabled()
    }

    pub fn events(&self) -> &[NoteEvent] {
        &self.events
    }

    /// Events sounding over any part of `[start, end)`
    pub fn events_in_range(&self, start: f64, end: f64) -> impl Iterator<Item = &NoteEvent> {
        self.events
            .iter()
            .filter(move |e| e.position < end && e.end() > start)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.events.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
