// MIDI - message parsing, input port and output sink

pub mod event;
pub mod output;
pub mod port;

pub use event::{MidiEvent, split_messages};
pub use output::{MidiOutQueue, MidiOutSynth, MidiSender, TimedMidi};
pub use port::{MidiEventProducer, MidiPort};

#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("MIDI init error: {0}")]
    Init(String),

    #[error("No MIDI port available")]
    NoPorts,

    #[error("MIDI port not found: {0}")]
    PortNotFound(String),

    #[error("MIDI connection failed: {0}")]
    Connect(String),
}

/// Pick the first port whose name contains `wanted`, or the first port
fn pick_port<P: Clone>(ports: &[(P, String)], wanted: Option<&str>) -> Result<(P, String), MidiError> {
    let found = match wanted {
        Some(wanted) => ports
            .iter()
            .find(|(_, name)| name.contains(wanted))
            .ok_or_else(|| MidiError::PortNotFound(wanted.to_string()))?,
        None => ports.first().ok_or(MidiError::NoPorts)?,
    };
    Ok(found.clone())
}
