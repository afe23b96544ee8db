// Synth boundary - where sequenced notes leave the engine
// The sequencer never renders audio itself: it drives a `Synthesizer` and
// hands instrument bank paths to an `InstrumentLoader`.

use std::path::{Path, PathBuf};

/// Receiver of timed note events
///
/// `sample_offset` is relative to the first frame of the block being
/// processed. Calls for one block arrive sorted by offset.
pub trait Synthesizer {
    fn note_on(&mut self, note: u8, velocity: u8, channel: u8, sample_offset: u32);
    fn note_off(&mut self, note: u8, channel: u8, sample_offset: u32);

    /// Called once the block's events are out; `frames` is the block size
    fn end_block(&mut self, _frames: usize) {}
}

impl<S: Synthesizer + ?Sized> Synthesizer for &mut S {
    fn note_on(&mut self, note: u8, velocity: u8, channel: u8, sample_offset: u32) {
        (**self).note_on(note, velocity, channel, sample_offset);
    }

    fn note_off(&mut self, note: u8, channel: u8, sample_offset: u32) {
        (**self).note_off(note, channel, sample_offset);
    }

    fn end_block(&mut self, frames: usize) {
        (**self).end_block(frames);
    }
}

/// Error reported by an instrument loader
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Instrument bank not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid instrument bank {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Loads instrument banks (soundfonts) for the keyboard and drum voices
pub trait InstrumentLoader: Send {
    fn load_font(&mut self, path: &Path) -> Result<(), LoadError>;
    fn load_drums(&mut self, path: &Path) -> Result<(), LoadError>;
}

/// Loader that only remembers which banks were selected
///
/// Useful when the synthesizer lives elsewhere (e.g. an external MIDI
/// device) and loading amounts to bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentBank {
    font: Option<PathBuf>,
    drums: Option<PathBuf>,
}

impl InstrumentBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn font(&self) -> Option<&Path> {
        self.font.as_deref()
    }

    pub fn drums(&self) -> Option<&Path> {
        self.drums.as_deref()
    }

    fn check(path: &Path) -> Result<PathBuf, LoadError> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(LoadError::Invalid {
                path: path.to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }
        Ok(path.to_path_buf())
    }
}

impl InstrumentLoader for InstrumentBank {
    fn load_font(&mut self, path: &Path) -> Result<(), LoadError> {
        self.font = Some(Self::check(path)?);
        Ok(())
    }

    fn load_drums(&mut self, path: &Path) -> Result<(), LoadError> {
        self.drums = Some(Self::check(path)?);
        Ok(())
    }
}

/// A note event as seen by a `Synthesizer`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthEvent {
    NoteOn {
        note: u8,
        velocity: u8,
        channel: u8,
        offset: u32,
    },
    NoteOff {
        note: u8,
        channel: u8,
        offset: u32,
    },
}

impl SynthEvent {
    pub fn note(&self) -> u8 {
        match *self {
            SynthEvent::NoteOn { note, .. } | SynthEvent::NoteOff { note, .. } => note,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            SynthEvent::NoteOn { channel, .. } | SynthEvent::NoteOff { channel, .. } => channel,
        }
    }

    pub fn offset(&self) -> u32 {
        match *self {
            SynthEvent::NoteOn { offset, .. } | SynthEvent::NoteOff { offset, .. } => offset,
        }
    }

    pub fn is_note_on(&self) -> bool {
        matches!(self, SynthEvent::NoteOn { .. })
    }
}

/// Synthesizer that records what it receives
#[derive(Debug, Clone, Default)]
pub struct RecordingSynth {
    pub events: Vec<SynthEvent>,
}

impl RecordingSynth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything recorded so far
    pub fn drain(&mut self) -> Vec<SynthEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn note_ons(&self) -> impl Iterator<Item = &SynthEvent> {
        self.events.iter().filter(|e| e.is_note_on())
    }

    pub fn note_offs(&self) -> impl Iterator<Item = &SynthEvent> {
        self.events.iter().filter(|e| !e.is_note_on())
    }
}

impl Synthesizer for RecordingSynth {
    fn note_on(&mut self, note: u8, velocity: u8, channel: u8, sample_offset: u32) {
        self.events.push(SynthEvent::NoteOn {
            note,
            velocity,
            channel,
            offset: sample_offset,
        });
    }

    fn note_off(&mut self, note: u8, channel: u8, sample_offset: u32) {
        self.events.push(SynthEvent::NoteOff {
            note,
            channel,
            offset: sample_offset,
        });
    }
}
