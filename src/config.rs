// Engine configuration - loaded from a RON file

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::sequencer::drum::DRUM_TRACK_CAPACITY;
use crate::sequencer::timeline::{DEFAULT_SAMPLE_RATE, DEFAULT_TEMPO_BPM, MIN_TEMPO_BPM};

const CONFIG_DIR: &str = "soundfont_sequencer";
const CONFIG_FILE: &str = "config.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),
}

/// Settings fixed for the lifetime of an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Audio sample rate in Hz
    pub sample_rate: u32,
    /// Frames per processing block when the engine drives itself
    pub block_size: usize,
    /// Initial tempo in BPM
    pub tempo: f64,
    /// Initial sequence length in beats
    pub length: f64,
    /// Number of drum sequences that can be queued
    pub drum_sequences: usize,
    /// Drum voices per sequence
    pub drum_tracks: usize,
    pub command_capacity: usize,
    pub notification_capacity: usize,
    pub midi_capacity: usize,
    /// MIDI channel of chord, rhythm, pattern and manual notes
    pub keyboard_channel: u8,
    /// MIDI channel of drum notes
    pub drum_channel: u8,
    /// How long a manual note sounds when nothing releases it, in seconds
    pub manual_note_seconds: f64,
    /// Substring of the MIDI input port to open, first port when unset
    pub midi_input_port: Option<String>,
    /// Substring of the MIDI output port to play through
    pub midi_output_port: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE as u32,
            block_size: 512,
            tempo: DEFAULT_TEMPO_BPM,
            length: 8.0,
            drum_sequences: 8,
            drum_tracks: 8,
            command_capacity: 1024,
            notification_capacity: 64,
            midi_capacity: 256,
            keyboard_channel: 0,
            drum_channel: 9,
            manual_note_seconds: 1.0,
            midi_input_port: None,
            midi_output_port: None,
        }
    }
}

impl EngineConfig {
    /// Default config location: `<config dir>/soundfont_sequencer/config.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    pub fn from_ron(data: &str) -> Result<Self, ConfigError> {
        ron::from_str::<Self>(data)
            .map(Self::validated)
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Self::from_ron(&data)
    }

    /// Load from the default location, falling back to defaults when the
    /// file is missing or unreadable
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Ignoring config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    /// Clamp values the engine cannot run with
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.sample_rate == 0 {
            self.sample_rate = defaults.sample_rate;
        }
        self.block_size = self.block_size.clamp(1, 8192);
        if !self.tempo.is_finite() {
            self.tempo = defaults.tempo;
        }
        self.tempo = self.tempo.max(MIN_TEMPO_BPM);
        if !self.length.is_finite() || self.length <= 0.0 {
            self.length = defaults.length;
        }
        self.drum_sequences = self.drum_sequences.max(1);
        self.drum_tracks = self.drum_tracks.max(1);
        // a whole drum track edit must fit in the command channel at once
        self.command_capacity = self.command_capacity.max(DRUM_TRACK_CAPACITY + 1);
        self.notification_capacity = self.notification_capacity.max(1);
        self.midi_capacity = self.midi_capacity.max(1);
        self.keyboard_channel &= 0x0F;
        self.drum_channel &= 0x0F;
        if !self.manual_note_seconds.is_finite() || self.manual_note_seconds <= 0.0 {
            self.manual_note_seconds = defaults.manual_note_seconds;
        }
        self
    }
}
