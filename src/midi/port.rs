// MIDI input port - driver callback → bounded channel → control thread

use super::event::{MidiEvent, split_messages};
use super::{MidiError, pick_port};
use midir::{MidiInput as MidirInput, MidiInputConnection};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;

pub type MidiEventProducer = ringbuf::HeapProd<MidiEvent>;
type MidiEventConsumer = ringbuf::HeapCons<MidiEvent>;

const CLIENT_NAME: &str = "Soundfont Sequencer MIDI Input";

/// Receiving end of a MIDI input
///
/// Messages from one driver callback keep their order. A full channel drops
/// new messages.
pub struct MidiPort {
    events: MidiEventConsumer,
    port_name: Option<String>,
    _connection: Option<MidiInputConnection<()>>,
}

impl MidiPort {
    /// Port fed by hand (tests, virtual sources) through the returned producer
    pub fn detached(capacity: usize) -> (Self, MidiEventProducer) {
        let (producer, consumer) = HeapRb::<MidiEvent>::new(capacity.max(1)).split();
        let port = Self {
            events: consumer,
            port_name: None,
            _connection: None,
        };
        (port, producer)
    }

    /// Connect to the first input whose name contains `wanted` (first input
    /// when `None`)
    pub fn connect(wanted: Option<&str>, capacity: usize) -> Result<Self, MidiError> {
        let midi_in = MidirInput::new(CLIENT_NAME).map_err(|e| MidiError::Init(e.to_string()))?;

        let ports: Vec<_> = midi_in
            .ports()
            .into_iter()
            .filter_map(|p| midi_in.port_name(&p).ok().map(|name| (p, name)))
            .collect();
        for (i, (_, name)) in ports.iter().enumerate() {
            log::debug!("MIDI input [{}] {}", i, name);
        }
        let (port, port_name) = pick_port(&ports, wanted)?;

        let (mut producer, consumer) = HeapRb::<MidiEvent>::new(capacity.max(1)).split();
        let connection = midi_in
            .connect(
                &port,
                "soundfont-sequencer-input",
                move |_timestamp, packet, _| {
                    // Runs on the driver thread
                    for message in split_messages(packet) {
                        if let Some(event) = MidiEvent::from_bytes(message) {
                            let _ = producer.try_push(event);
                        }
                    }
                },
                (),
            )
            .map_err(|e| MidiError::Connect(e.to_string()))?;

        log::info!("Connected to MIDI input: {}", port_name);
        Ok(Self {
            events: consumer,
            port_name: Some(port_name),
            _connection: Some(connection),
        })
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn try_recv(&mut self) -> Option<MidiEvent> {
        self.events.try_pop()
    }

    pub fn pending(&self) -> usize {
        self.events.occupied_len()
    }
}
