// Transport - Playback state and playhead position
// Written by the control thread (play/stop requests) and by the audio thread
// (playhead, sample clock), read by both

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Transport state (play/stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped)
    }
}

/// Transport flags shared by the engine and its processor
#[derive(Debug, Default)]
pub struct SharedTransportState {
    playing: AtomicBool,
    // f64 bits of the loop-relative playhead in beats
    playhead_bits: AtomicU64,
    // Samples rendered since the last start
    sample_clock: AtomicU64,
}

impl SharedTransportState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> TransportState {
        if self.playing.load(Ordering::Acquire) {
            TransportState::Playing
        } else {
            TransportState::Stopped
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state().is_playing()
    }

    /// Request a state; the audio thread picks it up at its next block
    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    /// Playhead in beats, modulo the sequence length
    pub fn playhead(&self) -> f64 {
        f64::from_bits(self.playhead_bits.load(Ordering::Acquire))
    }

    pub fn set_playhead(&self, beats: f64) {
        self.playhead_bits.store(beats.to_bits(), Ordering::Release);
    }

    pub fn sample_clock(&self) -> u64 {
        self.sample_clock.load(Ordering::Acquire)
    }

    pub fn set_sample_clock(&self, samples: u64) {
        self.sample_clock.store(samples, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_starts_stopped() {
        assert!(TransportState::default().is_stopped());
        assert!(TransportState::Playing.is_playing());
        assert!(!TransportState::Playing.is_stopped());
    }

    #[test]
    fn test_shared_transport_state() {
        let state = SharedTransportState::new();
        assert_eq!(state.state(), TransportState::Stopped);
        assert_eq!(state.playhead(), 0.0);
        assert_eq!(state.sample_clock(), 0);

        state.set_playing(true);
        assert_eq!(state.state(), TransportState::Playing);
        state.set_playing(false);
        assert!(!state.is_playing());
    }

    #[test]
    fn test_playhead_round_trips_exactly() {
        let state = SharedTransportState::new();
        state.set_playhead(3.141_592_653_589_793);
        assert_eq!(state.playhead(), 3.141_592_653_589_793);

        state.set_sample_clock(44_100);
        assert_eq!(state.sample_clock(), 44_100);
    }
}
