// Drum tracks - per-sequence event lists, one track per drum voice

use super::note::{NoteEvent, RhythmEvent};
use super::track::Track;
use serde::{Deserialize, Serialize};

/// Number of events a single drum track can hold
pub const DRUM_TRACK_CAPACITY: usize = 128;

/// Drum track contents as exchanged with the control surface
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrumTrackData {
    pub sequence: usize,
    pub track: usize,
    #[serde(default)]
    pub events: Vec<RhythmEvent>,
}

/// Drum tracks addressed by (sequence index, track index)
#[derive(Debug, Clone)]
pub struct DrumTrackSet {
    sequences: Vec<Vec<Track>>,
    tracks_per_sequence: usize,
}

impl DrumTrackSet {
    pub fn new(sequence_count: usize, tracks_per_sequence: usize, length: f64) -> Self {
        let sequences = (0..sequence_count)
            .map(|_| {
                (0..tracks_per_sequence)
                    .map(|_| Track::with_capacity(length, DRUM_TRACK_CAPACITY))
                    .collect()
            })
            .collect();
        Self {
            sequences,
            tracks_per_sequence,
        }
    }

    pub fn sequence_count(&self) -> usize {
        self.sequences.len()
    }

    pub fn tracks_per_sequence(&self) -> usize {
        self.tracks_per_sequence
    }

    pub fn contains(&self, sequence: usize, track: usize) -> bool {
        sequence < self.sequences.len() && track < self.tracks_per_sequence
    }

    pub fn track(&self, sequence: usize, track: usize) -> Option<&Track> {
        self.sequences.get(sequence)?.get(track)
    }

    pub fn track_mut(&mut self, sequence: usize, track: usize) -> Option<&mut Track> {
        self.sequences.get_mut(sequence)?.get_mut(track)
    }

    /// All tracks of one sequence, empty when out of range
    pub fn sequence(&self, sequence: usize) -> &[Track] {
        self.sequences
            .get(sequence)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Remove every event from one track. Out-of-range indices are ignored.
    pub fn clear_track(&mut self, sequence: usize, track: usize) {
        if let Some(track) = self.track_mut(sequence, track) {
            track.clear();
        }
    }

    /// Add one event. Returns false for a bad index or a full track.
    pub fn add(&mut self, sequence: usize, track: usize, event: NoteEvent) -> bool {
        self.track_mut(sequence, track)
            .map(|t| t.add(event))
            .unwrap_or(false)
    }

    /// Apply a new length to every drum track
    pub fn set_length(&mut self, length: f64) {
        for track in self.sequences.iter_mut().flatten() {
            track.set_length(length);
        }
    }

    /// Read one track back in exchange form; empty for a bad index
    pub fn track_data(&self, sequence: usize, track: usize) -> DrumTrackData {
        let events = self
            .track(sequence, track)
            .map(|t| t.events().iter().copied().map(RhythmEvent::from).collect())
            .unwrap_or_default();
        DrumTrackData {
            sequence,
            track,
            events,
        }
    }
}

/// A basic kick / snare / hi-hat groove for sequence 0
pub fn default_groove() -> Vec<DrumTrackData> {
    let hit = |note, timestamp, duration| RhythmEvent {
        note,
        velocity: 100,
        timestamp,
        duration,
    };
    vec![
        DrumTrackData {
            sequence: 0,
            track: 0,
            events: vec![
                hit(36, 0.0, 0.3),
                hit(36, 0.75, 0.15),
                hit(36, 2.0, 0.3),
                hit(36, 2.75, 0.15),
            ],
        },
        DrumTrackData {
            sequence: 0,
            track: 1,
            events: vec![hit(37, 1.0, 0.3), hit(37, 3.0, 0.3), hit(37, 3.75, 0.15)],
        },
        DrumTrackData {
            sequence: 0,
            track: 2,
            events: (0..8).map(|i| hit(39, i as f64 * 0.5, 0.2)).collect(),
        },
    ]
}
