// Sequencer module
// Musical time, tracks, patterns, drum sequences and the engine that plays them

pub mod drum;
pub mod engine;
pub mod model;
pub mod note;
pub mod pattern;
pub mod processor;
pub mod quantize;
pub mod queue;
pub mod tempo;
pub mod timeline;
pub mod track;
pub mod transport;

pub use drum::{DRUM_TRACK_CAPACITY, DrumTrackData, DrumTrackSet, default_groove};
pub use engine::SequencerEngine;
pub use model::{ModelEdit, ModelLayout, SequenceModel, TrackId};
pub use note::{ChordEvent, EventKey, NoteEvent, RhythmEvent};
pub use pattern::{
    ChordPattern, ChordPatternStep, PATTERN_SLOTS, PATTERN_STEPS, PatternCell, PatternGrid,
    StepType,
};
pub use processor::SequencerProcessor;
pub use quantize::{QuantizeMode, Quantizer};
pub use queue::{SequenceQueue, SequenceQueueState};
pub use tempo::{TempoEvent, TempoMap};
pub use timeline::{Duration, Tempo};
pub use track::{LoopInfo, TRACK_CAPACITY, Track};
pub use transport::{SharedTransportState, TransportState};
