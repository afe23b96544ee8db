// Note representation for the sequencer
// A note event has a position, a duration, a pitch and a velocity, all in beats

use serde::{Deserialize, Serialize};

/// Highest valid MIDI data value (note number, velocity)
pub const MIDI_MAX: u8 = 127;

/// A timed note stored on a track
///
/// Playback expands it into a note-on at `position` and a note-off at
/// `position + duration`, so the pair is always added and removed together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    /// Start position in beats
    pub position: f64,

    /// Duration in beats
    pub duration: f64,

    /// MIDI note number (0-127, where 60 = C4)
    pub note: u8,

    /// MIDI velocity (0-127)
    pub velocity: u8,

    /// MIDI channel (0-15)
    pub channel: u8,
}

impl NoteEvent {
    /// Creates a new note event, clamping MIDI data into range
    pub fn new(position: f64, duration: f64, note: u8, velocity: u8, channel: u8) -> Self {
        Self {
            position,
            duration: duration.max(0.0),
            note: note.min(MIDI_MAX),
            velocity: velocity.min(MIDI_MAX),
            channel: channel & 0x0F,
        }
    }

    /// End position in beats
    pub fn end(&self) -> f64 {
        self.position + self.duration
    }

    /// Get the note name (e.g., "C4", "A#5")
    pub fn note_name(&self) -> String {
        note_name(self.note)
    }
}

/// Name of a MIDI note number, e.g. 60 -> "C4"
pub fn note_name(note: u8) -> String {
    const NOTE_NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];

    let octave = (note / 12) as i32 - 1;
    let note_index = (note % 12) as usize;

    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Identity of a chord on the chord track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventKey {
    pub timestamp: f64,
    pub duration: f64,
}

impl EventKey {
    pub fn new(timestamp: f64, duration: f64) -> Self {
        Self {
            timestamp,
            duration,
        }
    }

    /// True when `event` starts at this key's timestamp with this key's duration
    pub fn matches(&self, event: &NoteEvent) -> bool {
        event.position == self.timestamp && event.duration == self.duration
    }
}

/// A chord: a root note plus semitone offsets, placed on the chord track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordEvent {
    pub root: i32,
    pub notes: Vec<i32>,
    pub velocity: i32,
    pub timestamp: f64,
    pub duration: f64,
}

impl ChordEvent {
    pub fn key(&self) -> EventKey {
        EventKey::new(self.timestamp, self.duration)
    }

    /// Note events for every chord tone that lands inside the MIDI range
    pub fn note_events(&self, channel: u8) -> impl Iterator<Item = NoteEvent> + '_ {
        let velocity = self.velocity.clamp(0, MIDI_MAX as i32) as u8;
        self.notes
            .iter()
            .map(move |offset| self.root + offset)
            .filter(|note| (0..=MIDI_MAX as i32).contains(note))
            .map(move |note| {
                NoteEvent::new(self.timestamp, self.duration, note as u8, velocity, channel)
            })
    }
}

/// A single rhythm hit on the rhythm track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RhythmEvent {
    pub note: u8,
    pub velocity: u8,
    pub timestamp: f64,
    pub duration: f64,
}

impl RhythmEvent {
    pub fn to_note_event(&self, channel: u8) -> NoteEvent {
        NoteEvent::new(
            self.timestamp,
            self.duration,
            self.note,
            self.velocity,
            channel,
        )
    }

    /// True when `event` is the stored form of this rhythm hit
    pub fn matches(&self, event: &NoteEvent) -> bool {
        event.note == self.note.min(MIDI_MAX)
            && EventKey::new(self.timestamp, self.duration).matches(event)
    }
}

impl From<NoteEvent> for RhythmEvent {
    fn from(event: NoteEvent) -> Self {
        Self {
            note: event.note,
            velocity: event.velocity,
            timestamp: event.position,
            duration: event.duration,
        }
    }
}
