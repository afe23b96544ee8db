// Sequence model - keyboard tracks, tempo map and drum tracks
// The control thread keeps one copy as a mirror for reads, the audio thread
// keeps another; both apply the same stream of edits in the same order.

use super::drum::DrumTrackSet;
use super::note::{EventKey, NoteEvent};
use super::tempo::{TempoEvent, TempoMap};
use super::track::{TRACK_CAPACITY, Track};

/// The two keyboard tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackId {
    Chords,
    Rhythm,
}

impl TrackId {
    pub const ALL: [TrackId; 2] = [TrackId::Chords, TrackId::Rhythm];

    pub fn index(self) -> usize {
        match self {
            TrackId::Chords => 0,
            TrackId::Rhythm => 1,
        }
    }
}

/// A single change to the sequence model
///
/// `Copy` so it can cross the lock-free command channel without allocating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelEdit {
    AddNote {
        track: TrackId,
        event: NoteEvent,
    },
    /// Remove notes matching `key`, and `note` when given
    RemoveNotes {
        track: TrackId,
        key: EventKey,
        note: Option<u8>,
    },
    ClearTrack(TrackId),
    /// Remove keyboard notes starting in `[start, start + duration)`
    ClearRange {
        start: f64,
        duration: f64,
    },
    SetTempo {
        bpm: f64,
        /// Playhead to anchor the previous tempo at, when playing
        playhead: Option<f64>,
    },
    AddTempoEvent(TempoEvent),
    SetLength(f64),
    SetLooping(bool),
    ClearDrumTrack {
        sequence: usize,
        track: usize,
    },
    AddDrumNote {
        sequence: usize,
        track: usize,
        event: NoteEvent,
    },
}

/// Sizes fixed at construction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelLayout {
    pub tempo: f64,
    pub length: f64,
    pub drum_sequences: usize,
    pub drum_tracks: usize,
}

#[derive(Debug, Clone)]
pub struct SequenceModel {
    tracks: [Track; 2],
    tempo_map: TempoMap,
    drums: DrumTrackSet,
    length: f64,
    looping: bool,
}

impl SequenceModel {
    pub fn new(layout: ModelLayout) -> Self {
        let length = layout.length.max(0.0);
        let mut model = Self {
            tracks: [
                Track::with_capacity(length, TRACK_CAPACITY),
                Track::with_capacity(length, TRACK_CAPACITY),
            ],
            tempo_map: TempoMap::with_tempo(layout.tempo),
            drums: DrumTrackSet::new(layout.drum_sequences, layout.drum_tracks, length),
            length,
            looping: false,
        };
        model.set_looping(true);
        model
    }

    /// Apply one edit. Returns false when it was rejected (bad index, full track).
    pub fn apply(&mut self, edit: &ModelEdit) -> bool {
        match *edit {
            ModelEdit::AddNote { track, event } => self.tracks[track.index()].add(event),
            ModelEdit::RemoveNotes { track, key, note } => {
                self.tracks[track.index()]
                    .remove_where(|e| key.matches(e) && note.is_none_or(|n| n == e.note));
                true
            }
            ModelEdit::ClearTrack(track) => {
                self.tracks[track.index()].clear();
                true
            }
            ModelEdit::ClearRange { start, duration } => {
                for track in self.tracks.iter_mut() {
                    track.clear_range(start, duration);
                }
                true
            }
            ModelEdit::SetTempo { bpm, playhead } => {
                self.tempo_map.set_tempo(bpm, playhead, self.length);
                true
            }
            ModelEdit::AddTempoEvent(event) => self.tempo_map.insert(event),
            ModelEdit::SetLength(length) => {
                self.set_length(length);
                true
            }
            ModelEdit::SetLooping(looping) => {
                self.set_looping(looping);
                true
            }
            ModelEdit::ClearDrumTrack { sequence, track } => {
                if !self.drums.contains(sequence, track) {
                    return false;
                }
                self.drums.clear_track(sequence, track);
                true
            }
            ModelEdit::AddDrumNote {
                sequence,
                track,
                event,
            } => self.drums.add(sequence, track, event),
        }
    }

    fn set_length(&mut self, length: f64) {
        let length = if length.is_finite() { length.max(0.0) } else { 0.0 };
        for track in self.tracks.iter_mut() {
            track.set_length(length);
        }
        self.drums.set_length(length);
        self.length = length;
    }

    fn set_looping(&mut self, looping: bool) {
        for track in self.tracks.iter_mut() {
            if looping {
                track.enable_looping();
            } else {
                track.disable_looping();
            }
        }
        self.looping = looping;
    }

    pub fn track(&self, id: TrackId) -> &Track {
        &self.tracks[id.index()]
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn tempo_map(&self) -> &TempoMap {
        &self.tempo_map
    }

    pub fn drums(&self) -> &DrumTrackSet {
        &self.drums
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Room left on a keyboard track once events matching `key` are removed
    pub fn free_slots_after_removing(&self, id: TrackId, key: EventKey) -> usize {
        let track = self.track(id);
        let kept = track.events().iter().filter(|e| !key.matches(e)).count();
        track.capacity().saturating_sub(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> ModelLayout {
        ModelLayout {
            tempo: 120.0,
            length: 8.0,
            drum_sequences: 4,
            drum_tracks: 4,
        }
    }

    fn note(position: f64, duration: f64, pitch: u8) -> NoteEvent {
        NoteEvent::new(position, duration, pitch, 100, 0)
    }

    #[test]
    fn test_new_model_loops_by_default() {
        let model = SequenceModel::new(layout());
        assert!(model.is_looping());
        assert_eq!(model.length(), 8.0);
        assert_eq!(model.tempo_map().tempo_at(0.0), 120.0);
        assert!(model.tracks().iter().all(|t| t.loop_info().length == 8.0));
    }

    #[test]
    fn test_remove_notes_by_key_and_note() {
        let mut model = SequenceModel::new(layout());
        model.apply(&ModelEdit::AddNote {
            track: TrackId::Rhythm,
            event: note(1.0, 0.5, 36),
        });
        model.apply(&ModelEdit::AddNote {
            track: TrackId::Rhythm,
            event: note(1.0, 0.5, 38),
        });

        model.apply(&ModelEdit::RemoveNotes {
            track: TrackId::Rhythm,
            key: EventKey::new(1.0, 0.5),
            note: Some(38),
        });
        let left: Vec<u8> = model.track(TrackId::Rhythm).events().iter().map(|e| e.note).collect();
        assert_eq!(left, vec![36]);

        model.apply(&ModelEdit::RemoveNotes {
            track: TrackId::Rhythm,
            key: EventKey::new(1.0, 0.5),
            note: None,
        });
        assert!(model.track(TrackId::Rhythm).is_empty());
    }

    #[test]
    fn test_clear_range_hits_every_keyboard_track() {
        let mut model = SequenceModel::new(layout());
        for track in TrackId::ALL {
            model.apply(&ModelEdit::AddNote {
                track,
                event: note(2.0, 1.0, 60),
            });
            model.apply(&ModelEdit::AddNote {
                track,
                event: note(5.0, 1.0, 62),
            });
        }
        model.apply(&ModelEdit::ClearRange {
            start: 1.0,
            duration: 2.0,
        });
        assert!(model.tracks().iter().all(|t| t.len() == 1));
    }

    #[test]
    fn test_set_length_reaches_drums() {
        let mut model = SequenceModel::new(layout());
        model.apply(&ModelEdit::AddDrumNote {
            sequence: 1,
            track: 2,
            event: NoteEvent::new(3.5, 1.0, 36, 100, 9),
        });
        model.apply(&ModelEdit::SetLength(4.0));

        assert_eq!(model.length(), 4.0);
        let drum = model.drums().track(1, 2).unwrap();
        assert_eq!(drum.events()[0].end(), 4.0);
        assert_eq!(model.track(TrackId::Chords).loop_info().length, 4.0);
    }

    #[test]
    fn test_bad_drum_index_is_rejected() {
        let mut model = SequenceModel::new(layout());
        assert!(!model.apply(&ModelEdit::ClearDrumTrack {
            sequence: 9,
            track: 0
        }));
        assert!(!model.apply(&ModelEdit::AddDrumNote {
            sequence: 0,
            track: 9,
            event: note(0.0, 1.0, 36),
        }));
    }

    #[test]
    fn test_set_tempo_replaces_map() {
        let mut model = SequenceModel::new(layout());
        model.apply(&ModelEdit::AddTempoEvent(TempoEvent::new(4.0, 90.0)));
        assert_eq!(model.tempo_map().tempo_at(5.0), 90.0);

        model.apply(&ModelEdit::SetTempo {
            bpm: 140.0,
            playhead: Some(5.0),
        });
        assert_eq!(model.tempo_map().len(), 1);
        assert_eq!(model.tempo_map().tempo_at(5.0), 140.0);
    }

    #[test]
    fn test_looping_toggle() {
        let mut model = SequenceModel::new(layout());
        model.apply(&ModelEdit::SetLooping(false));
        assert!(!model.is_looping());
        assert!(model.tracks().iter().all(|t| !t.is_looping()));
    }

    #[test]
    fn test_free_slots_after_removing() {
        let mut model = SequenceModel::new(layout());
        for pitch in [60, 64, 67] {
            model.apply(&ModelEdit::AddNote {
                track: TrackId::Chords,
                event: note(0.0, 1.0, pitch),
            });
        }
        let free = model.free_slots_after_removing(TrackId::Chords, EventKey::new(0.0, 1.0));
        assert_eq!(free, TRACK_CAPACITY);
        let free = model.free_slots_after_removing(TrackId::Chords, EventKey::new(1.0, 1.0));
        assert_eq!(free, TRACK_CAPACITY - 3);
    }
}
