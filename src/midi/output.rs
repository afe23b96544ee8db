// MIDI output - plays sequenced notes on an external synthesizer
// The audio callback only queues stamped messages. A `MidiSender` on the
// control thread drains the queue and talks to the driver.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::event::MidiEvent;
use super::{MidiError, pick_port};
use crate::synth::Synthesizer;
use midir::{MidiOutput, MidiOutputConnection};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

const CLIENT_NAME: &str = "Soundfont Sequencer MIDI Output";

/// Note message stamped with the output sample it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedMidi {
    pub event: MidiEvent,
    pub channel: u8,
    /// Samples since the stream started
    pub sample_time: u64,
}

/// `Synthesizer` for the audio thread
///
/// Queues each note as a `TimedMidi` and never touches the driver. A full
/// queue drops the message and counts it.
pub struct MidiOutSynth {
    queue: HeapProd<TimedMidi>,
    block_start: u64,
    dropped: Arc<AtomicU64>,
}

impl MidiOutSynth {
    /// Synth and the queue it feeds, `sample_rate` being the stream's rate
    pub fn channel(capacity: usize, sample_rate: u32) -> (Self, MidiOutQueue) {
        let (producer, consumer) = HeapRb::<TimedMidi>::new(capacity.max(1)).split();
        let dropped = Arc::new(AtomicU64::new(0));
        let synth = Self {
            queue: producer,
            block_start: 0,
            dropped: Arc::clone(&dropped),
        };
        let queue = MidiOutQueue {
            messages: consumer,
            held: None,
            sample_rate: f64::from(sample_rate.max(1)),
            origin: None,
            dropped,
        };
        (synth, queue)
    }

    fn push(&mut self, event: MidiEvent, channel: u8, sample_offset: u32) {
        let message = TimedMidi {
            event,
            channel,
            sample_time: self.block_start + u64::from(sample_offset),
        };
        if self.queue.try_push(message).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Synthesizer for MidiOutSynth {
    fn note_on(&mut self, note: u8, velocity: u8, channel: u8, sample_offset: u32) {
        self.push(MidiEvent::NoteOn { note, velocity }, channel, sample_offset);
    }

    fn note_off(&mut self, note: u8, channel: u8, sample_offset: u32) {
        self.push(MidiEvent::NoteOff { note }, channel, sample_offset);
    }

    fn end_block(&mut self, frames: usize) {
        self.block_start += frames as u64;
    }
}

/// Control-side end of a `MidiOutSynth` queue
///
/// The first message seen pins its sample time to the wall clock; later
/// messages are released once their sample time has come.
pub struct MidiOutQueue {
    messages: HeapCons<TimedMidi>,
    held: Option<TimedMidi>,
    sample_rate: f64,
    origin: Option<(Instant, u64)>,
    dropped: Arc<AtomicU64>,
}

impl MidiOutQueue {
    /// Next message due at `now`, in queue order
    pub fn pop_due(&mut self, now: Instant) -> Option<TimedMidi> {
        let message = match self.held.take() {
            Some(message) => message,
            None => self.messages.try_pop()?,
        };
        let (origin_time, origin_sample) = *self.origin.get_or_insert((now, message.sample_time));
        let ahead = message.sample_time.saturating_sub(origin_sample) as f64 / self.sample_rate;
        if now >= origin_time + Duration::from_secs_f64(ahead) {
            Some(message)
        } else {
            self.held = Some(message);
            None
        }
    }

    /// Messages waiting, due or not
    pub fn pending(&self) -> usize {
        self.messages.occupied_len() + usize::from(self.held.is_some())
    }

    /// Messages the audio side could not queue
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Sends queued notes to a midir output port
pub struct MidiSender {
    queue: MidiOutQueue,
    connection: MidiOutputConnection,
    port_name: String,
    send_errors: u64,
}

impl MidiSender {
    /// Connect to the first output whose name contains `wanted` (first output
    /// when `None`). The returned synth goes to the audio thread.
    pub fn connect(
        wanted: Option<&str>,
        sample_rate: u32,
        capacity: usize,
    ) -> Result<(Self, MidiOutSynth), MidiError> {
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| MidiError::Init(e.to_string()))?;

        let ports: Vec<_> = midi_out
            .ports()
            .into_iter()
            .filter_map(|p| midi_out.port_name(&p).ok().map(|name| (p, name)))
            .collect();
        let (port, port_name) = pick_port(&ports, wanted)?;

        let connection = midi_out
            .connect(&port, "soundfont-sequencer-output")
            .map_err(|e| MidiError::Connect(e.to_string()))?;

        log::info!("Connected to MIDI output: {}", port_name);
        let (synth, queue) = MidiOutSynth::channel(capacity, sample_rate);
        let sender = Self {
            queue,
            connection,
            port_name,
            send_errors: 0,
        };
        Ok((sender, synth))
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Messages the driver refused so far
    pub fn send_errors(&self) -> u64 {
        self.send_errors
    }

    /// Messages lost to a full queue so far
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    /// Send every message that is due; returns how many went out
    pub fn flush(&mut self) -> usize {
        let now = Instant::now();
        let mut sent = 0;
        while let Some(message) = self.queue.pop_due(now) {
            let (bytes, len) = message.event.to_bytes(message.channel);
            if self.connection.send(&bytes[..len]).is_err() {
                self.send_errors += 1;
            }
            sent += 1;
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_block_sample_time() {
        let (mut synth, mut queue) = MidiOutSynth::channel(8, 48_000);
        synth.note_on(60, 100, 0, 10);
        synth.end_block(128);
        synth.note_off(60, 0, 5);

        assert_eq!(queue.pending(), 2);
        let now = Instant::now();
        assert_eq!(
            queue.pop_due(now),
            Some(TimedMidi {
                event: MidiEvent::NoteOn {
                    note: 60,
                    velocity: 100
                },
                channel: 0,
                sample_time: 10,
            })
        );

        // 123 samples later is about 2.6 ms at 48 kHz
        assert_eq!(queue.pop_due(now), None);
        assert_eq!(queue.pending(), 1);
        let later = now + Duration::from_millis(3);
        let off = queue.pop_due(later);
        assert_eq!(off.map(|m| m.sample_time), Some(133));
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_late_messages_go_out_in_order() {
        let (mut synth, mut queue) = MidiOutSynth::channel(8, 48_000);
        for offset in [0, 100, 200] {
            synth.note_on(60, 100, 0, offset);
        }
        let now = Instant::now();
        assert!(queue.pop_due(now).is_some());
        let later = now + Duration::from_millis(50);
        let times: Vec<u64> = std::iter::from_fn(|| queue.pop_due(later))
            .map(|m| m.sample_time)
            .collect();
        assert_eq!(times, vec![100, 200]);
    }

    #[test]
    fn test_full_queue_counts_dropped_messages() {
        let (mut synth, mut queue) = MidiOutSynth::channel(1, 48_000);
        synth.note_on(60, 100, 0, 0);
        synth.note_off(60, 0, 10);
        synth.note_off(64, 0, 20);

        assert_eq!(queue.dropped(), 2);
        assert!(queue.pop_due(Instant::now()).is_some());
        assert_eq!(queue.pending(), 0);
    }
}
