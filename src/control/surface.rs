// Control surface - JSON method calls mapped onto the sequencer engine
// Arguments are parsed into typed structs before they reach the engine.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::sequencer::{
    ChordEvent, ChordPattern, DrumTrackData, QuantizeMode, RhythmEvent, SequencerEngine,
};

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Invalid arguments for {method}: {reason}")]
    InvalidArguments { method: String, reason: String },
}

/// Name and version of this library plus the host OS
pub fn platform_version() -> String {
    format!(
        "{} {} ({} {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

#[derive(Deserialize)]
struct NoteArgs {
    note: u8,
    #[serde(default = "default_velocity")]
    velocity: u8,
}

fn default_velocity() -> u8 {
    100
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Deserialize)]
struct RangeArgs {
    start: f64,
    duration: f64,
}

#[derive(Deserialize)]
struct DrumTrackArgs {
    sequence: usize,
    track: usize,
}

#[derive(Deserialize)]
struct QuantizeArgs {
    grid: f64,
    #[serde(default = "default_mode")]
    mode: QuantizeMode,
}

fn default_mode() -> QuantizeMode {
    QuantizeMode::Nearest
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueArgs {
    index: i64,
    #[serde(default = "no_follow")]
    follow_index: i64,
}

fn no_follow() -> i64 {
    -1
}

/// Dispatches host method calls to a `SequencerEngine`
pub struct ControlSurface {
    engine: SequencerEngine,
}

impl ControlSurface {
    pub fn new(engine: SequencerEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &SequencerEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SequencerEngine {
        &mut self.engine
    }

    pub fn into_engine(self) -> SequencerEngine {
        self.engine
    }

    /// Run one method call. Commands without a result return `null`.
    pub fn call(&mut self, method: &str, args: Value) -> Result<Value, ControlError> {
        log::debug!("Control call {} {}", method, args);
        let engine = &mut self.engine;

        match method {
            "getPlatformVersion" => return Ok(json!(platform_version())),
            "playNote" => {
                let a: NoteArgs = parse(method, args)?;
                engine.play_note(a.note, a.velocity);
            }
            "stopNote" => {
                let a: NoteArgs = parse(method, args)?;
                engine.stop_note(a.note);
            }
            "loadFont" => {
                let a: PathArgs = parse(method, args)?;
                engine.load_font(&a.path);
            }
            "loadDrums" => {
                let a: PathArgs = parse(method, args)?;
                engine.load_drums(&a.path);
            }
            "startSequencer" => engine.start(),
            "stopSequencer" => engine.stop(),
            "rewind" => engine.rewind(),
            "getIsPlaying" => return Ok(json!(engine.is_playing())),
            "setRepeating" => engine.set_repeating(scalar(method, args, "repeating")?),
            "addChord" => {
                let chord: ChordEvent = parse(method, args)?;
                engine.add_chord(&chord);
            }
            "removeChord" => {
                let chord: ChordEvent = parse(method, args)?;
                engine.remove_chord(&chord);
            }
            "getChords" => return Ok(json!(engine.chords())),
            "addRhythmEvent" => {
                let event: RhythmEvent = parse(method, args)?;
                engine.add_rhythm_event(event);
            }
            "removeRhythmEvent" => {
                let event: RhythmEvent = parse(method, args)?;
                engine.remove_rhythm_event(event);
            }
            "clearRange" => {
                let a: RangeArgs = parse(method, args)?;
                engine.clear_range(a.start, a.duration);
            }
            "setChordPattern" => {
                let pattern: ChordPattern = parse(method, args)?;
                engine.set_chord_pattern(&pattern);
            }
            "setDrumTrack" => {
                let data: DrumTrackData = parse(method, args)?;
                engine.set_drum_track(&data);
            }
            "getDrumTrack" => {
                let a: DrumTrackArgs = parse(method, args)?;
                return Ok(json!(engine.drum_track(a.sequence, a.track)));
            }
            "setTempo" => engine.set_tempo(scalar(method, args, "bpm")?),
            "getTempo" => return Ok(json!(engine.tempo())),
            "setLength" => engine.set_length(scalar(method, args, "beats")?),
            "setLooping" => {
                if scalar(method, args, "looping")? {
                    engine.enable_looping();
                } else {
                    engine.disable_looping();
                }
            }
            "getPlayheadPosition" => return Ok(json!(engine.playhead_position())),
            "quantize" => {
                let a: QuantizeArgs = parse(method, args)?;
                return Ok(json!(engine.quantize(a.grid, a.mode)));
            }
            "queueSequence" => {
                let a: QueueArgs = parse(method, args)?;
                match usize::try_from(a.index) {
                    Ok(index) => engine.queue_sequence(index, usize::try_from(a.follow_index).ok()),
                    Err(_) => log::debug!("Ignoring queueSequence with index {}", a.index),
                }
            }
            "getCurrentSequence" => return Ok(json!(engine.current_sequence())),
            "getQueuedSequence" => {
                let queued = engine.queued_sequence().map_or(-1, |i| i as i64);
                return Ok(json!(queued));
            }
            _ => return Err(ControlError::UnknownMethod(method.to_string())),
        }
        Ok(Value::Null)
    }
}

fn parse<T: DeserializeOwned>(method: &str, args: Value) -> Result<T, ControlError> {
    serde_json::from_value(args).map_err(|e| ControlError::InvalidArguments {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

/// A single value passed bare (`true`) or wrapped (`{"looping": true}`)
fn scalar<T: DeserializeOwned>(method: &str, args: Value, key: &str) -> Result<T, ControlError> {
    let value = match args {
        Value::Object(mut map) => map.remove(key).unwrap_or(Value::Null),
        other => other,
    };
    parse(method, value)
}
