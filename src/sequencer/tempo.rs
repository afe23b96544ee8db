// Tempo map - ordered tempo changes on the tempo track

use super::timeline::{DEFAULT_TEMPO_BPM, Tempo};

/// Maximum number of tempo changes kept on the tempo track
pub const TEMPO_EVENT_CAPACITY: usize = 64;

/// A tempo change at a position in beats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEvent {
    pub position: f64,
    pub bpm: f64,
}

impl TempoEvent {
    pub fn new(position: f64, bpm: f64) -> Self {
        Self {
            position,
            bpm: Tempo::new(bpm).bpm(),
        }
    }
}

/// Tempo changes sorted by position
///
/// Events at the same position keep insertion order, so the most recently
/// added one wins a lookup at that position.
#[derive(Debug, Clone)]
pub struct TempoMap {
    events: Vec<TempoEvent>,
}

impl TempoMap {
    pub fn new() -> Self {
        Self {
            events: Vec::with_capacity(TEMPO_EVENT_CAPACITY),
        }
    }

    /// Map holding a single tempo at beat 0
    pub fn with_tempo(bpm: f64) -> Self {
        let mut map = Self::new();
        map.insert(TempoEvent::new(0.0, bpm));
        map
    }

    /// Insert a tempo event. Returns false when the map is full.
    pub fn insert(&mut self, event: TempoEvent) -> bool {
        if self.events.len() >= TEMPO_EVENT_CAPACITY {
            return false;
        }
        let index = self
            .events
            .partition_point(|e| e.position <= event.position);
        self.events.insert(index, event);
        true
    }

    /// Remove events whose position lies in `[start, end)`
    pub fn clear_range(&mut self, start: f64, end: f64) {
        self.events
            .retain(|e| !(e.position >= start && e.position < end));
    }

    /// Remove every tempo event
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Tempo active at `position`: the last event at or before it, 120 BPM if none
    pub fn tempo_at(&self, position: f64) -> f64 {
        let mut tempo = DEFAULT_TEMPO_BPM;
        for event in &self.events {
            if event.position <= position {
                tempo = event.bpm;
            } else {
                break;
            }
        }
        tempo
    }

    /// Replace the whole map with a single tempo at beat 0.
    ///
    /// When `playhead` is given, an anchor with the previous tempo is placed at
    /// the playhead first; the range clear that follows removes it together
    /// with every other change in `[0, length)`.
    pub fn set_tempo(&mut self, bpm: f64, playhead: Option<f64>, length: f64) {
        if let Some(position) = playhead {
            let previous = self.tempo_at(position);
            self.insert(TempoEvent::new(position, previous));
        }
        self.clear_range(0.0, length);
        self.clear();
        self.insert(TempoEvent::new(0.0, bpm));
    }

    pub fn events(&self) -> &[TempoEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_map_defaults_to_120() {
        let map = TempoMap::new();
        assert_eq!(map.tempo_at(0.0), 120.0);
        assert_eq!(map.tempo_at(17.5), 120.0);
    }

    #[test]
    fn test_lookup_uses_last_event_at_or_before() {
        let mut map = TempoMap::new();
        map.insert(TempoEvent::new(4.0, 90.0));
        map.insert(TempoEvent::new(0.0, 100.0));
        map.insert(TempoEvent::new(2.0, 140.0));

        assert_eq!(map.tempo_at(0.0), 100.0);
        assert_eq!(map.tempo_at(1.99), 100.0);
        assert_eq!(map.tempo_at(2.0), 140.0);
        assert_eq!(map.tempo_at(3.5), 140.0);
        assert_eq!(map.tempo_at(100.0), 90.0);
    }

    #[test]
    fn test_position_before_first_event_uses_default() {
        let mut map = TempoMap::new();
        map.insert(TempoEvent::new(1.0, 80.0));
        assert_eq!(map.tempo_at(0.5), 120.0);
    }

    #[test]
    fn test_latest_insert_wins_at_same_position() {
        let mut map = TempoMap::new();
        map.insert(TempoEvent::new(1.0, 80.0));
        map.insert(TempoEvent::new(1.0, 95.0));
        assert_eq!(map.tempo_at(1.0), 95.0);
    }

    #[test]
    fn test_events_clamped() {
        let event = TempoEvent::new(0.0, 0.0);
        assert_eq!(event.bpm, 1.0);
    }

    #[test]
    fn test_set_tempo_leaves_single_event() {
        let mut map = TempoMap::with_tempo(100.0);
        map.insert(TempoEvent::new(2.0, 130.0));
        map.insert(TempoEvent::new(6.0, 70.0));

        map.set_tempo(150.0, None, 8.0);
        assert_eq!(map.events(), &[TempoEvent::new(0.0, 150.0)]);
        assert_eq!(map.tempo_at(5.0), 150.0);
    }

    #[test]
    fn test_set_tempo_while_playing_discards_anchor() {
        let mut map = TempoMap::with_tempo(100.0);
        map.set_tempo(60.0, Some(3.25), 8.0);
        assert_eq!(map.len(), 1);
        assert_eq!(map.tempo_at(3.25), 60.0);
    }

    #[test]
    fn test_clear_range_is_half_open() {
        let mut map = TempoMap::new();
        map.insert(TempoEvent::new(0.0, 100.0));
        map.insert(TempoEvent::new(2.0, 110.0));
        map.insert(TempoEvent::new(4.0, 120.0));

        map.clear_range(0.0, 4.0);
        assert_eq!(map.events(), &[TempoEvent::new(4.0, 120.0)]);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut map = TempoMap::new();
        for i in 0..TEMPO_EVENT_CAPACITY {
            assert!(map.insert(TempoEvent::new(i as f64, 100.0)));
        }
        assert!(!map.insert(TempoEvent::new(0.5, 100.0)));
        assert_eq!(map.len(), TEMPO_EVENT_CAPACITY);
    }
}
