// Soundfont Sequencer - library exports for the runner, tests and benchmarks

pub mod audio;
pub mod config;
pub mod control;
pub mod logging;
pub mod messaging;
pub mod midi;
pub mod sequencer;
pub mod synth;

// Re-export commonly used types for convenience
pub use audio::{AudioClock, AudioError};
pub use config::{ConfigError, EngineConfig};
pub use control::{ControlError, ControlSurface};
pub use messaging::{Command, Notification, NotificationLevel};
pub use midi::{MidiEvent, MidiOutSynth, MidiPort, MidiSender};
pub use sequencer::{
    ChordEvent, ChordPattern, DrumTrackData, QuantizeMode, RhythmEvent, SequencerEngine,
    SequencerProcessor, TransportState,
};
pub use synth::{InstrumentBank, InstrumentLoader, RecordingSynth, Synthesizer};
