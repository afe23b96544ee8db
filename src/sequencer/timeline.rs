// Timeline - Musical time representation
// Handles conversion between beats, seconds and audio samples

use std::fmt;
use std::ops::{Add, AddAssign, Rem, Sub, SubAssign};

/// Default sample rate used when none is supplied
pub const DEFAULT_SAMPLE_RATE: f64 = 44_100.0;

/// Tempo assumed by a bare `Duration` (one beat per second)
pub const DEFAULT_DURATION_TEMPO: f64 = 60.0;

/// Tempo reported when no tempo event precedes a position
pub const DEFAULT_TEMPO_BPM: f64 = 120.0;

/// Lowest tempo accepted anywhere in the engine
pub const MIN_TEMPO_BPM: f64 = 1.0;

const SECONDS_PER_MINUTE: f64 = 60.0;

/// Convert beats to a sample count at the given tempo and sample rate.
///
/// Truncates toward zero and clamps to the `i64` range instead of overflowing,
/// so extreme beat counts saturate rather than wrap.
pub fn to_samples(beats: f64, tempo: f64, sample_rate: f64) -> i64 {
    let samples = beats / tempo * SECONDS_PER_MINUTE * sample_rate;
    if samples.is_nan() {
        0
    } else if samples >= i64::MAX as f64 {
        i64::MAX
    } else if samples <= i64::MIN as f64 {
        i64::MIN
    } else {
        samples as i64
    }
}

/// Convert a sample count to seconds
pub fn to_seconds(samples: i64, sample_rate: f64) -> f64 {
    samples as f64 / sample_rate
}

/// Convert seconds to beats at the given tempo
pub fn to_beats(seconds: f64, tempo: f64) -> f64 {
    seconds * tempo / SECONDS_PER_MINUTE
}

/// Number of beats covered by `samples` at the given tempo (no truncation)
pub fn samples_to_beats(samples: f64, tempo: f64, sample_rate: f64) -> f64 {
    samples / sample_rate * tempo / SECONDS_PER_MINUTE
}

/// Exact (fractional) number of samples covered by `beats`
pub fn beats_to_samples_f64(beats: f64, tempo: f64, sample_rate: f64) -> f64 {
    beats / tempo * SECONDS_PER_MINUTE * sample_rate
}

/// Tempo in BPM (Beats Per Minute)
///
/// Unlike a raw `f64`, a `Tempo` is always finite and at least 1 BPM.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Creates a new tempo, clamping to the minimum of 1 BPM
    pub fn new(bpm: f64) -> Self {
        let bpm = if bpm.is_finite() {
            bpm.max(MIN_TEMPO_BPM)
        } else {
            DEFAULT_TEMPO_BPM
        };
        Self { bpm }
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        SECONDS_PER_MINUTE / self.bpm
    }

    /// Duration of one beat in samples at given sample rate
    pub fn beat_duration_samples(&self, sample_rate: f64) -> f64 {
        self.beat_duration_seconds() * sample_rate
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPO_BPM)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Container for the notion of time in sequencing
///
/// Beats are the canonical unit; seconds and samples are derived through
/// `tempo` and `sample_rate`. Negative values mean "before the origin" and
/// keep their sign through every conversion.
#[derive(Debug, Clone, Copy)]
pub struct Duration {
    pub beats: f64,
    pub tempo: f64,
    pub sample_rate: f64,
}

impl Duration {
    /// Duration from beats at the default tempo (60 BPM) and sample rate
    pub fn from_beats(beats: f64) -> Self {
        Self {
            beats,
            tempo: DEFAULT_DURATION_TEMPO,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    /// Duration from beats at an explicit tempo
    pub fn with_tempo(beats: f64, tempo: f64) -> Self {
        Self {
            beats,
            tempo,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    /// Duration from a sample count
    pub fn from_samples(samples: i64, sample_rate: f64, tempo: f64) -> Self {
        Self {
            beats: to_beats(to_seconds(samples, sample_rate), tempo),
            tempo,
            sample_rate,
        }
    }

    /// Duration from seconds
    pub fn from_seconds(seconds: f64, sample_rate: f64, tempo: f64) -> Self {
        Self {
            beats: to_beats(seconds, tempo),
            tempo,
            sample_rate,
        }
    }

    /// Sample count, saturating at the `i64` bounds
    pub fn samples(&self) -> i64 {
        to_samples(self.beats, self.tempo, self.sample_rate)
    }

    /// Seconds derived from the (truncated) sample count
    pub fn seconds(&self) -> f64 {
        to_seconds(self.samples(), self.sample_rate)
    }
}

impl Default for Duration {
    fn default() -> Self {
        Self::from_beats(0.0)
    }
}

impl PartialEq for Duration {
    fn eq(&self, other: &Self) -> bool {
        self.beats == other.beats
    }
}

impl PartialOrd for Duration {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.beats.partial_cmp(&other.beats)
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(mut self, rhs: Duration) -> Duration {
        self.beats += rhs.beats;
        self
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(mut self, rhs: Duration) -> Duration {
        self.beats -= rhs.beats;
        self
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Duration) {
        self.beats += rhs.beats;
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Duration) {
        self.beats -= rhs.beats;
    }
}

impl Rem for Duration {
    type Output = Duration;

    /// Truncating remainder of the beat values
    fn rem(mut self, rhs: Duration) -> Duration {
        self.beats %= rhs.beats;
        self
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} samples at {} = {} beats at {} BPM = {}s",
            self.samples(),
            self.sample_rate,
            self.beats,
            self.tempo,
            self.seconds()
        )
    }
}
