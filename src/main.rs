use soundfont_sequencer::logging::init_logger;
use soundfont_sequencer::sequencer::processor::MAX_BLOCK_EVENTS;
use soundfont_sequencer::sequencer::{
    ChordPattern, ChordPatternStep, PATTERN_SLOTS, PATTERN_STEPS, PatternCell, StepType,
    default_groove,
};
use soundfont_sequencer::{
    AudioClock, EngineConfig, MidiPort, MidiSender, NotificationLevel, SequencerEngine,
    SequencerProcessor, Synthesizer,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::time::Duration;

// Control loop period: MIDI in, MIDI out and notifications are serviced this often
const POLL_INTERVAL: Duration = Duration::from_millis(2);

// Room for a few callbacks' worth of outgoing MIDI
const MIDI_OUT_CAPACITY: usize = 4 * MAX_BLOCK_EVENTS;

/// Stand-in when no MIDI output is available: counts notes instead of sounding them
struct NoteCounter {
    note_ons: Arc<AtomicU64>,
}

impl Synthesizer for NoteCounter {
    fn note_on(&mut self, _note: u8, _velocity: u8, _channel: u8, _sample_offset: u32) {
        self.note_ons.fetch_add(1, Ordering::Relaxed);
    }

    fn note_off(&mut self, _note: u8, _channel: u8, _sample_offset: u32) {}
}

/// Arpeggio over the latched chord: root, third, fifth, third
fn demo_pattern() -> ChordPattern {
    let arpeggio = [0, 4, 7, 4];
    ChordPattern {
        steps: (0..PATTERN_STEPS)
            .map(|step| {
                let mut notes = vec![PatternCell::EMPTY; PATTERN_SLOTS];
                notes[0] = PatternCell::new(arpeggio[step % arpeggio.len()], StepType::NoteOn);
                ChordPatternStep { notes }
            })
            .collect(),
    }
}

/// Start the stream; the sender, when there is one, must be flushed from the
/// control loop
fn start_audio(
    config: &EngineConfig,
    processor: SequencerProcessor,
    note_ons: &Arc<AtomicU64>,
) -> Option<(AudioClock, Option<MidiSender>)> {
    let output = MidiSender::connect(
        config.midi_output_port.as_deref(),
        config.sample_rate,
        MIDI_OUT_CAPACITY,
    );
    let result = match output {
        Ok((sender, synth)) => {
            AudioClock::start(processor, synth).map(|clock| (clock, Some(sender)))
        }
        Err(e) => {
            log::warn!("No MIDI output ({}), notes will only be counted", e);
            let counter = NoteCounter {
                note_ons: Arc::clone(note_ons),
            };
            AudioClock::start(processor, counter).map(|clock| (clock, None))
        }
    };
    match result {
        Ok(started) => Some(started),
        Err(e) => {
            log::error!("Audio clock failed to start: {}", e);
            None
        }
    }
}

fn main() {
    init_logger();
    log::info!("=== Soundfont Sequencer ===");

    let mut config = EngineConfig::load_or_default();
    match AudioClock::default_format() {
        Ok(format) => config.sample_rate = format.sample_rate,
        Err(e) => {
            log::error!("{}", e);
            return;
        }
    }

    let (mut engine, processor) = SequencerEngine::new(config.clone());
    for data in default_groove() {
        engine.set_drum_track(&data);
    }
    engine.set_chord_pattern(&demo_pattern());

    match MidiPort::connect(config.midi_input_port.as_deref(), config.midi_capacity) {
        Ok(port) => engine.attach_midi(port),
        Err(e) => log::warn!("No MIDI input: {}", e),
    }

    let note_ons = Arc::new(AtomicU64::new(0));
    let Some((clock, mut output)) = start_audio(&config, processor, &note_ons) else {
        return;
    };
    log::info!(
        "Running at {} Hz, {} BPM, {} beat loop. Press Enter to quit.",
        clock.format().sample_rate,
        engine.tempo(),
        engine.length()
    );

    engine.set_repeating(true);
    engine.start();

    let (quit_tx, quit_rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        let _ = quit_tx.send(());
    });

    while quit_rx.recv_timeout(POLL_INTERVAL).is_err() {
        if let Some(sender) = output.as_mut() {
            sender.flush();
        }
        engine.poll_midi();
        for notification in engine.poll_notifications() {
            match notification.level() {
                NotificationLevel::Warning => log::warn!("{:?}", notification),
                NotificationLevel::Info => log::debug!("{:?}", notification),
            }
        }
    }

    engine.stop();
    // let the processor flush sounding notes before the stream goes away
    std::thread::sleep(POLL_INTERVAL * 25);
    match output.as_mut() {
        Some(sender) => {
            sender.flush();
            log::info!(
                "Stopped; MIDI output {}: {} send errors, {} dropped",
                sender.port_name(),
                sender.send_errors(),
                sender.dropped()
            );
        }
        None => log::info!(
            "Stopped after {} counted notes",
            note_ons.load(Ordering::Relaxed)
        ),
    }
}
