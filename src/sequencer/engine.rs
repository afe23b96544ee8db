// Sequencer engine - control-thread half of the sequencer
// Owns a mirror of the sequence model for reads and forwards every edit to
// the audio thread through the command channel.

use std::path::Path;
use std::sync::Arc;

use ringbuf::traits::{Consumer, Observer, Producer};

use super::drum::{DRUM_TRACK_CAPACITY, DrumTrackData};
use super::model::{ModelEdit, ModelLayout, SequenceModel, TrackId};
use super::note::{ChordEvent, EventKey, NoteEvent, RhythmEvent};
use super::pattern::{ChordPattern, PatternGrid};
use super::processor::{ProcessorSettings, SequencerProcessor};
use super::quantize::{QuantizeMode, Quantizer};
use super::queue::SequenceQueue;
use super::tempo::{TEMPO_EVENT_CAPACITY, TempoEvent};
use super::transport::{SharedTransportState, TransportState};
use crate::config::EngineConfig;
use crate::messaging::{
    Command, CommandProducer, Notification, NotificationConsumer, create_command_channel,
    create_notification_channel,
};
use crate::midi::{MidiEvent, MidiPort};
use crate::synth::{InstrumentBank, InstrumentLoader};

/// Control handle of the sequencer
///
/// Created together with its `SequencerProcessor`. Methods never block on
/// the audio thread: edits are queued and take effect at the start of the
/// next processed block, reads come from a local mirror and shared atomics.
pub struct SequencerEngine {
    config: EngineConfig,
    mirror: SequenceModel,
    chords: Vec<ChordEvent>,
    commands: CommandProducer,
    notifications: NotificationConsumer,
    grid: Arc<PatternGrid>,
    queue: Arc<SequenceQueue>,
    transport: Arc<SharedTransportState>,
    loader: Box<dyn InstrumentLoader>,
    midi: Option<MidiPort>,
    repeating: bool,
    rejected_edits: u64,
}

impl SequencerEngine {
    /// Engine whose instrument loader only records the selected banks
    pub fn new(config: EngineConfig) -> (Self, SequencerProcessor) {
        Self::with_loader(config, Box::new(InstrumentBank::new()))
    }

    pub fn with_loader(
        config: EngineConfig,
        loader: Box<dyn InstrumentLoader>,
    ) -> (Self, SequencerProcessor) {
        let config = config.validated();
        let layout = ModelLayout {
            tempo: config.tempo,
            length: config.length,
            drum_sequences: config.drum_sequences,
            drum_tracks: config.drum_tracks,
        };
        let sample_rate = f64::from(config.sample_rate);

        let (command_tx, command_rx) = create_command_channel(config.command_capacity);
        let (notification_tx, notification_rx) =
            create_notification_channel(config.notification_capacity);
        let grid = PatternGrid::new();
        let queue = SequenceQueue::new(config.drum_sequences);
        let transport = SharedTransportState::new();

        let settings = ProcessorSettings {
            sample_rate,
            keyboard_channel: config.keyboard_channel,
            drum_channel: config.drum_channel,
            manual_note_samples: (config.manual_note_seconds * sample_rate) as u64,
            layout,
        };
        let processor = SequencerProcessor::new(
            settings,
            command_rx,
            notification_tx,
            Arc::clone(&grid),
            Arc::clone(&queue),
            Arc::clone(&transport),
        );

        let engine = Self {
            config,
            mirror: SequenceModel::new(layout),
            chords: Vec::new(),
            commands: command_tx,
            notifications: notification_rx,
            grid,
            queue,
            transport,
            loader,
            midi: None,
            repeating: false,
            rejected_edits: 0,
        };
        (engine, processor)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Edits dropped because the command channel was full or a track had no room
    pub fn rejected_edits(&self) -> u64 {
        self.rejected_edits
    }

    fn send(&mut self, command: Command) -> bool {
        if self.commands.try_push(command).is_err() {
            log::warn!("Command channel full, dropping {:?}", command);
            self.rejected_edits += 1;
            return false;
        }
        true
    }

    /// Apply `edits` to the mirror and queue them as one slice, or not at all
    fn submit(&mut self, edits: &[ModelEdit]) -> bool {
        if self.commands.vacant_len() < edits.len() {
            log::warn!(
                "Command channel full, dropping {} edit(s); is the processor running?",
                edits.len()
            );
            self.rejected_edits += 1;
            return false;
        }
        for edit in edits {
            self.mirror.apply(edit);
        }
        let batch: Vec<Command> = edits.iter().copied().map(Command::Edit).collect();
        self.commands.push_slice(&batch);
        true
    }

    fn reject(&mut self, what: &str) -> bool {
        log::debug!("Rejected {}", what);
        self.rejected_edits += 1;
        false
    }

    // ---- Instruments ----

    /// Load the keyboard soundfont. A missing file is ignored.
    pub fn load_font<P: AsRef<Path>>(&mut self, path: P) {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("Soundfont {} does not exist, ignoring", path.display());
            return;
        }
        match self.loader.load_font(path) {
            Ok(()) => log::info!("Loaded soundfont {}", path.display()),
            Err(e) => log::warn!("Failed to load soundfont: {}", e),
        }
    }

    /// Load the drum soundfont. A missing file is ignored.
    pub fn load_drums<P: AsRef<Path>>(&mut self, path: P) {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("Drum bank {} does not exist, ignoring", path.display());
            return;
        }
        match self.loader.load_drums(path) {
            Ok(()) => log::info!("Loaded drum bank {}", path.display()),
            Err(e) => log::warn!("Failed to load drum bank: {}", e),
        }
    }

    // ---- Manual notes ----

    /// Press a key: latches it in repeating mode, sounds it otherwise
    pub fn play_note(&mut self, note: u8, velocity: u8) {
        self.send(Command::PlayNote {
            note: note.min(127),
            velocity: velocity.min(127),
        });
    }

    pub fn stop_note(&mut self, note: u8) {
        self.send(Command::StopNote { note: note.min(127) });
    }

    pub fn set_repeating(&mut self, repeating: bool) {
        if self.send(Command::SetRepeating(repeating)) {
            self.repeating = repeating;
        }
    }

    pub fn is_repeating(&self) -> bool {
        self.repeating
    }

    // ---- Transport ----

    pub fn start(&mut self) {
        self.transport.set_playing(true);
    }

    pub fn stop(&mut self) {
        self.transport.set_playing(false);
    }

    /// Playhead back to beat 0, in any transport state
    pub fn rewind(&mut self) {
        self.send(Command::Rewind);
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    /// Playhead in beats, modulo the sequence length
    pub fn playhead_position(&self) -> f64 {
        self.transport.playhead()
    }

    // ---- Keyboard tracks ----

    /// Place a chord, replacing any chord with the same timestamp and duration
    pub fn add_chord(&mut self, chord: &ChordEvent) -> bool {
        let key = chord.key();
        let notes: Vec<NoteEvent> = chord.note_events(self.config.keyboard_channel).collect();
        if self.mirror.free_slots_after_removing(TrackId::Chords, key) < notes.len() {
            return self.reject("chord: chord track is full");
        }

        let mut edits = Vec::with_capacity(notes.len() + 1);
        edits.push(ModelEdit::RemoveNotes {
            track: TrackId::Chords,
            key,
            note: None,
        });
        edits.extend(notes.into_iter().map(|event| ModelEdit::AddNote {
            track: TrackId::Chords,
            event,
        }));
        if !self.submit(&edits) {
            return false;
        }

        self.chords.retain(|c| c.key() != key);
        self.chords.push(chord.clone());
        true
    }

    /// Remove the chord with this chord's timestamp and duration
    pub fn remove_chord(&mut self, chord: &ChordEvent) -> bool {
        let key = chord.key();
        if !self.submit(&[ModelEdit::RemoveNotes {
            track: TrackId::Chords,
            key,
            note: None,
        }]) {
            return false;
        }
        self.chords.retain(|c| c.key() != key);
        true
    }

    pub fn chords(&self) -> &[ChordEvent] {
        &self.chords
    }

    pub fn add_rhythm_event(&mut self, event: RhythmEvent) -> bool {
        if self.mirror.track(TrackId::Rhythm).is_full() {
            return self.reject("rhythm event: rhythm track is full");
        }
        self.submit(&[ModelEdit::AddNote {
            track: TrackId::Rhythm,
            event: event.to_note_event(self.config.keyboard_channel),
        }])
    }

    /// Remove hits with this note, timestamp and duration
    pub fn remove_rhythm_event(&mut self, event: RhythmEvent) -> bool {
        self.submit(&[ModelEdit::RemoveNotes {
            track: TrackId::Rhythm,
            key: EventKey::new(event.timestamp, event.duration),
            note: Some(event.note.min(127)),
        }])
    }

    pub fn rhythm_events(&self) -> Vec<RhythmEvent> {
        self.mirror
            .track(TrackId::Rhythm)
            .events()
            .iter()
            .copied()
            .map(RhythmEvent::from)
            .collect()
    }

    /// Remove keyboard notes starting in `[start, start + duration)`
    pub fn clear_range(&mut self, start: f64, duration: f64) {
        if self.submit(&[ModelEdit::ClearRange { start, duration }]) {
            let end = start + duration;
            self.chords
                .retain(|c| !(c.timestamp >= start && c.timestamp < end));
        }
    }

    pub fn clear_track(&mut self, track: TrackId) {
        if self.submit(&[ModelEdit::ClearTrack(track)]) && track == TrackId::Chords {
            self.chords.clear();
        }
    }

    // ---- Pattern ----

    /// Replace the whole 16 x 8 chord pattern; missing cells become empty
    pub fn set_chord_pattern(&mut self, pattern: &ChordPattern) {
        self.grid.set_pattern(pattern);
    }

    pub fn chord_pattern(&self) -> ChordPattern {
        self.grid.snapshot()
    }

    // ---- Drums ----

    /// Replace the contents of one drum track
    pub fn set_drum_track(&mut self, data: &DrumTrackData) -> bool {
        let (sequence, track) = (data.sequence, data.track);
        if !self.mirror.drums().contains(sequence, track) {
            log::debug!("No drum track ({}, {})", sequence, track);
            return false;
        }
        if data.events.len() > DRUM_TRACK_CAPACITY {
            log::warn!(
                "Drum track ({}, {}) keeps the first {} of {} events",
                sequence,
                track,
                DRUM_TRACK_CAPACITY,
                data.events.len()
            );
        }

        let channel = self.config.drum_channel;
        let mut edits = Vec::with_capacity(data.events.len().min(DRUM_TRACK_CAPACITY) + 1);
        edits.push(ModelEdit::ClearDrumTrack { sequence, track });
        edits.extend(
            data.events
                .iter()
                .take(DRUM_TRACK_CAPACITY)
                .map(|event| ModelEdit::AddDrumNote {
                    sequence,
                    track,
                    event: event.to_note_event(channel),
                }),
        );
        self.submit(&edits)
    }

    /// Contents of one drum track, empty for a bad index
    pub fn drum_track(&self, sequence: usize, track: usize) -> DrumTrackData {
        self.mirror.drums().track_data(sequence, track)
    }

    // ---- Tempo, length, looping ----

    /// Replace the tempo map with a single tempo (at least 1 BPM)
    pub fn set_tempo(&mut self, bpm: f64) {
        let playhead = self.is_playing().then(|| self.playhead_position());
        self.submit(&[ModelEdit::SetTempo { bpm, playhead }]);
    }

    /// Add a tempo change at `position` beats
    pub fn add_tempo_event(&mut self, bpm: f64, position: f64) -> bool {
        if self.mirror.tempo_map().len() >= TEMPO_EVENT_CAPACITY {
            return self.reject("tempo event: tempo map is full");
        }
        self.submit(&[ModelEdit::AddTempoEvent(TempoEvent::new(position, bpm))])
    }

    /// Tempo at the playhead
    pub fn tempo(&self) -> f64 {
        self.mirror.tempo_map().tempo_at(self.playhead_position())
    }

    pub fn tempo_events(&self) -> &[TempoEvent] {
        self.mirror.tempo_map().events()
    }

    /// Resize every track, truncating notes that overrun the new length
    pub fn set_length(&mut self, beats: f64) {
        if !self.submit(&[ModelEdit::SetLength(beats)]) {
            return;
        }
        let length = self.mirror.length();
        self.chords.retain(|c| c.timestamp < length);
        for chord in self.chords.iter_mut() {
            if chord.timestamp + chord.duration > length {
                chord.duration = length - chord.timestamp;
            }
        }
    }

    pub fn length(&self) -> f64 {
        self.mirror.length()
    }

    pub fn enable_looping(&mut self) {
        self.submit(&[ModelEdit::SetLooping(true)]);
    }

    pub fn disable_looping(&mut self) {
        self.submit(&[ModelEdit::SetLooping(false)]);
    }

    pub fn toggle_loop(&mut self) {
        let looping = self.mirror.is_looping();
        self.submit(&[ModelEdit::SetLooping(!looping)]);
    }

    pub fn is_looping(&self) -> bool {
        self.mirror.is_looping()
    }

    // ---- Quantize ----

    /// Grid point around the playhead, `grid` in beats
    pub fn quantize(&self, grid: f64, mode: QuantizeMode) -> f64 {
        Quantizer::new(grid, self.length()).quantize(self.playhead_position(), mode)
    }

    pub fn nearest_quantized_position(&self, grid: f64) -> f64 {
        self.quantize(grid, QuantizeMode::Nearest)
    }

    pub fn previous_quantized_position(&self, grid: f64) -> f64 {
        self.quantize(grid, QuantizeMode::Previous)
    }

    pub fn next_quantized_position(&self, grid: f64) -> f64 {
        self.quantize(grid, QuantizeMode::Next)
    }

    // ---- Sequence queue ----

    /// Switch to `index` at the next loop end, then to `follow` after it
    pub fn queue_sequence(&mut self, index: usize, follow: Option<usize>) {
        if !self.queue.queue_sequence(index, follow) {
            log::debug!("No drum sequence {}", index);
        }
    }

    pub fn current_sequence(&self) -> usize {
        self.queue.current_sequence()
    }

    pub fn queued_sequence(&self) -> Option<usize> {
        self.queue.queued_sequence()
    }

    pub fn follow_sequence(&self) -> Option<usize> {
        self.queue.follow_sequence()
    }

    // ---- MIDI and notifications ----

    pub fn attach_midi(&mut self, port: MidiPort) {
        self.midi = Some(port);
    }

    pub fn detach_midi(&mut self) -> Option<MidiPort> {
        self.midi.take()
    }

    /// Handle every MIDI message received since the last call
    pub fn poll_midi(&mut self) -> usize {
        let Some(port) = self.midi.as_mut() else {
            return 0;
        };
        let mut events = Vec::with_capacity(port.pending());
        while let Some(event) = port.try_recv() {
            events.push(event);
        }
        for event in &events {
            self.handle_midi(*event);
        }
        events.len()
    }

    /// Keys drive manual notes; Start rewinds and plays, Continue plays,
    /// Stop stops
    pub fn handle_midi(&mut self, event: MidiEvent) {
        match event {
            MidiEvent::NoteOn { note, velocity } => self.play_note(note, velocity),
            MidiEvent::NoteOff { note } => self.stop_note(note),
            MidiEvent::Start => {
                self.rewind();
                self.start();
            }
            MidiEvent::Continue => self.start(),
            MidiEvent::Stop => self.stop(),
            _ => {}
        }
    }

    /// Notifications sent by the processor since the last call
    pub fn poll_notifications(&mut self) -> Vec<Notification> {
        self.notifications.pop_iter().collect()
    }
}
