// Sequencer processor - audio-rate half of the engine
// Applies queued edits at the top of each block, advances the playhead and
// sends due note events to the synthesizer, sorted by sample offset.
// Nothing here blocks, locks or allocates once constructed.

use std::sync::Arc;

use ringbuf::traits::{Consumer, Producer};

use super::model::{ModelLayout, SequenceModel, TrackId};
use super::pattern::{PATTERN_SLOTS, PATTERN_STEPS, PatternCell, PatternGrid, StepType};
use super::queue::SequenceQueue;
use super::timeline::{beats_to_samples_f64, samples_to_beats};
use super::track::Track;
use super::transport::SharedTransportState;
use crate::messaging::{Command, CommandConsumer, Notification, NotificationProducer};
use crate::synth::Synthesizer;

/// Most note events a single block can emit
pub const MAX_BLOCK_EVENTS: usize = 2048;

const ACTIVE_NOTE_CAPACITY: usize = 512;
const MIDI_NOTES: usize = 128;
// Sample positions this close below an integer count as that integer
const SAMPLE_EPSILON: f64 = 1e-6;

/// A note the engine turned on and still has to turn off
#[derive(Debug, Clone, Copy)]
struct ActiveNote {
    note: u8,
    channel: u8,
    /// Loop-relative beat the note ends at
    end: f64,
}

#[derive(Debug)]
struct ActiveNotes {
    notes: Vec<ActiveNote>,
}

impl ActiveNotes {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            notes: Vec::with_capacity(capacity),
        }
    }

    fn insert(&mut self, note: ActiveNote) -> bool {
        if self.notes.len() >= self.notes.capacity() {
            return false;
        }
        self.notes.push(note);
        true
    }

    /// Remove notes ending before `before` (all of them with `all`), in
    /// insertion order
    fn release<F: FnMut(ActiveNote)>(&mut self, before: f64, all: bool, mut f: F) {
        self.notes.retain(|n| {
            if all || n.end < before {
                f(*n);
                false
            } else {
                true
            }
        });
    }

    fn len(&self) -> usize {
        self.notes.len()
    }
}

#[derive(Debug, Clone, Copy)]
enum PendingKind {
    On { velocity: u8 },
    Off,
}

#[derive(Debug, Clone, Copy)]
struct PendingEvent {
    offset: u32,
    order: u32,
    note: u8,
    channel: u8,
    kind: PendingKind,
}

/// Events collected during one block, dispatched sorted by (offset, order)
#[derive(Debug)]
struct EventQueue {
    events: Vec<PendingEvent>,
    next_order: u32,
    dropped: u32,
}

impl EventQueue {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            next_order: 0,
            dropped: 0,
        }
    }

    fn push(&mut self, offset: u32, note: u8, channel: u8, kind: PendingKind) {
        if self.events.len() >= self.events.capacity() {
            self.dropped = self.dropped.saturating_add(1);
            return;
        }
        self.events.push(PendingEvent {
            offset,
            order: self.next_order,
            note,
            channel,
            kind,
        });
        self.next_order += 1;
    }

    fn note_on(&mut self, offset: u32, note: u8, velocity: u8, channel: u8) {
        self.push(offset, note, channel, PendingKind::On { velocity });
    }

    fn note_off(&mut self, offset: u32, note: u8, channel: u8) {
        self.push(offset, note, channel, PendingKind::Off);
    }

    /// Send everything to `synth`; returns how many events were dropped
    fn flush<S: Synthesizer + ?Sized>(&mut self, synth: &mut S) -> u32 {
        self.events
            .sort_unstable_by(|a, b| a.offset.cmp(&b.offset).then(a.order.cmp(&b.order)));
        for event in self.events.drain(..) {
            match event.kind {
                PendingKind::On { velocity } => {
                    synth.note_on(event.note, velocity, event.channel, event.offset)
                }
                PendingKind::Off => synth.note_off(event.note, event.channel, event.offset),
            }
        }
        self.next_order = 0;
        std::mem::take(&mut self.dropped)
    }
}

/// Playhead as a whole number of samples played since an anchor beat.
///
/// Beats are derived from the sample count instead of being summed block by
/// block, so a block boundary maps to the same beat however the stream is
/// cut into blocks. The anchor moves on a tempo change, a loop wrap or a jump.
#[derive(Debug, Clone, Copy)]
struct PlayClock {
    anchor: f64,
    samples: u64,
    tempo: f64,
    sample_rate: f64,
}

impl PlayClock {
    fn new(anchor: f64, tempo: f64, sample_rate: f64) -> Self {
        Self {
            anchor,
            samples: 0,
            tempo,
            sample_rate,
        }
    }

    fn beat(&self) -> f64 {
        self.anchor + samples_to_beats(self.samples as f64, self.tempo, self.sample_rate)
    }

    /// Beats below this are due before sample `samples`
    fn due_before(&self, samples: u64) -> f64 {
        self.anchor
            + samples_to_beats(samples as f64 - SAMPLE_EPSILON, self.tempo, self.sample_rate)
    }

    /// Sample, counted from the anchor, that `beat` falls on
    fn sample_of(&self, beat: f64) -> f64 {
        (beats_to_samples_f64(beat - self.anchor, self.tempo, self.sample_rate) + SAMPLE_EPSILON)
            .floor()
    }
}

/// Samples `[first, first + frames)` of one pass, covering the loop-relative
/// beats `[start, end)`
#[derive(Debug, Clone, Copy)]
struct Segment {
    clock: PlayClock,
    first: u64,
    frames: u64,
    /// Where `first` lies inside the block
    block_offset: u64,
    start: f64,
    end: f64,
    /// `end` is the loop end
    reaches_end: bool,
}

impl Segment {
    /// Block offset of `beat`, kept inside the segment
    fn offset(&self, beat: f64) -> u32 {
        let last = self.frames.saturating_sub(1) as f64;
        let sample = (self.clock.sample_of(beat) - self.first as f64).clamp(0.0, last);
        (self.block_offset + sample as u64) as u32
    }
}

/// Static settings of the processor
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProcessorSettings {
    pub sample_rate: f64,
    pub keyboard_channel: u8,
    pub drum_channel: u8,
    pub manual_note_samples: u64,
    pub layout: ModelLayout,
}

/// Audio-rate half of the sequencer
///
/// Created together with its `SequencerEngine`; call `process` once per
/// audio block from the audio thread.
pub struct SequencerProcessor {
    model: SequenceModel,
    commands: CommandConsumer,
    notifications: NotificationProducer,
    grid: Arc<PatternGrid>,
    queue: Arc<SequenceQueue>,
    transport: Arc<SharedTransportState>,

    sample_rate: f64,
    keyboard_channel: u8,
    drum_channel: u8,
    manual_note_samples: u64,

    clock: PlayClock,
    was_playing: bool,
    sample_clock: u64,
    repeating: bool,

    /// Velocity of each latched key
    latched: [Option<u8>; MIDI_NOTES],
    /// Samples left before each manual note is released
    manual: [Option<u64>; MIDI_NOTES],
    track_notes: ActiveNotes,
    drum_notes: ActiveNotes,
    pattern_slots: [Option<u8>; PATTERN_SLOTS],
    pending: EventQueue,
}

impl SequencerProcessor {
    pub(crate) fn new(
        settings: ProcessorSettings,
        commands: CommandConsumer,
        notifications: NotificationProducer,
        grid: Arc<PatternGrid>,
        queue: Arc<SequenceQueue>,
        transport: Arc<SharedTransportState>,
    ) -> Self {
        Self {
            model: SequenceModel::new(settings.layout),
            commands,
            notifications,
            grid,
            queue,
            transport,
            sample_rate: settings.sample_rate,
            keyboard_channel: settings.keyboard_channel & 0x0F,
            drum_channel: settings.drum_channel & 0x0F,
            manual_note_samples: settings.manual_note_samples.max(1),
            clock: PlayClock::new(0.0, settings.layout.tempo, settings.sample_rate),
            was_playing: false,
            sample_clock: 0,
            repeating: false,
            latched: [None; MIDI_NOTES],
            manual: [None; MIDI_NOTES],
            track_notes: ActiveNotes::with_capacity(ACTIVE_NOTE_CAPACITY),
            drum_notes: ActiveNotes::with_capacity(ACTIVE_NOTE_CAPACITY),
            pattern_slots: [None; PATTERN_SLOTS],
            pending: EventQueue::with_capacity(MAX_BLOCK_EVENTS),
        }
    }

    /// Render one block of `frames` samples into `synth`
    pub fn process<S: Synthesizer + ?Sized>(&mut self, frames: usize, synth: &mut S) {
        self.drain_commands();
        self.wrap_playhead();

        let playing = self.transport.is_playing();
        if playing && !self.was_playing {
            self.sample_clock = 0;
        } else if !playing && self.was_playing {
            self.release_sequenced(0);
        }
        self.was_playing = playing;

        let started_clock = self.sample_clock;
        if playing && frames > 0 {
            self.advance(frames);
        }
        self.update_manual_notes(frames);

        let dropped = self.pending.flush(synth);
        if dropped > 0 {
            self.notify(Notification::EventsDropped {
                count: dropped,
                sample_time: started_clock,
            });
        }

        if playing {
            self.sample_clock = self.sample_clock.saturating_add(frames as u64);
        }
        self.transport.set_playhead(self.position());
        self.transport.set_sample_clock(self.sample_clock);
        synth.end_block(frames);
    }

    /// Loop-relative playhead in beats, always below the sequence length
    pub fn position(&self) -> f64 {
        // a pass may start a fraction of a sample before beat 0
        let beat = self.clock.beat().max(0.0);
        let length = self.model.length();
        if length > 0.0 && beat >= length {
            beat % length
        } else {
            beat
        }
    }

    /// Sequenced notes currently sounding (keyboard tracks, drums, pattern)
    pub fn sounding_notes(&self) -> usize {
        self.track_notes.len()
            + self.drum_notes.len()
            + self.pattern_slots.iter().flatten().count()
    }

    fn drain_commands(&mut self) {
        while let Some(command) = self.commands.try_pop() {
            match command {
                Command::Edit(edit) => {
                    self.model.apply(&edit);
                }
                Command::Rewind => {
                    self.release_sequenced(0);
                    self.clock = PlayClock::new(0.0, self.clock.tempo, self.sample_rate);
                }
                Command::SetRepeating(repeating) => {
                    self.repeating = repeating;
                    if !repeating {
                        self.latched = [None; MIDI_NOTES];
                        self.release_pattern(0);
                    }
                }
                Command::PlayNote { note, velocity } => self.play_note(note, velocity),
                Command::StopNote { note } => self.stop_note(note),
            }
        }
    }

    /// Bring a playhead left past a shortened loop back inside it, playing
    /// or not
    fn wrap_playhead(&mut self) {
        let length = self.model.length();
        if !(length.is_finite() && length > 0.0) {
            return;
        }
        // a loop end falling exactly on the current sample is wrapped by `advance`
        if self.clock.sample_of(length) < self.clock.samples as f64 {
            let beat = self.clock.beat() % length;
            self.clock = PlayClock::new(beat, self.clock.tempo, self.sample_rate);
        }
    }

    fn play_note(&mut self, note: u8, velocity: u8) {
        let index = usize::from(note & 0x7F);
        if self.repeating {
            self.latched[index] = Some(velocity);
            return;
        }
        if self.manual[index].is_some() {
            self.pending.note_off(0, note, self.keyboard_channel);
        }
        self.pending.note_on(0, note, velocity, self.keyboard_channel);
        self.manual[index] = Some(self.manual_note_samples);
    }

    fn stop_note(&mut self, note: u8) {
        let index = usize::from(note & 0x7F);
        self.latched[index] = None;
        if self.manual[index].take().is_some() {
            self.pending.note_off(0, note, self.keyboard_channel);
        }
    }

    fn update_manual_notes(&mut self, frames: usize) {
        let frames = frames as u64;
        for (note, slot) in self.manual.iter_mut().enumerate() {
            if let Some(remaining) = *slot {
                if remaining < frames {
                    self.pending
                        .note_off(remaining as u32, note as u8, self.keyboard_channel);
                    *slot = None;
                } else {
                    *slot = Some(remaining - frames);
                }
            }
        }
    }

    /// Note-offs for everything the sequencer started
    fn release_sequenced(&mut self, offset: u32) {
        let pending = &mut self.pending;
        self.track_notes
            .release(0.0, true, |n| pending.note_off(offset, n.note, n.channel));
        self.drum_notes
            .release(0.0, true, |n| pending.note_off(offset, n.note, n.channel));
        self.release_pattern(offset);
    }

    fn release_pattern(&mut self, offset: u32) {
        for slot in self.pattern_slots.iter_mut() {
            if let Some(note) = slot.take() {
                self.pending.note_off(offset, note, self.keyboard_channel);
            }
        }
    }

    fn notify(&mut self, notification: Notification) {
        // best effort: a full channel drops the notification
        let _ = self.notifications.try_push(notification);
    }

    fn advance(&mut self, frames: usize) {
        let length = self.model.length();
        if !(length.is_finite() && length > 0.0) {
            return;
        }
        let tempo = self.model.tempo_map().tempo_at(self.position());
        if !(tempo.is_finite() && tempo > 0.0) {
            return;
        }
        if tempo != self.clock.tempo {
            self.clock = PlayClock::new(self.clock.beat(), tempo, self.sample_rate);
        }

        let frames = frames as u64;
        let mut done = 0;
        // a pass that starts inside this block lasts at least one sample
        let mut fresh_pass = false;
        while done < frames {
            let clock = self.clock;
            let first = clock.samples;
            let last = first + (frames - done);
            let mut segment = Segment {
                clock,
                first,
                frames: frames - done,
                block_offset: done,
                start: clock.due_before(first),
                end: clock.due_before(last),
                reaches_end: false,
            };

            let earliest = if fresh_pass { first + 1 } else { first };
            let wrap = (clock.sample_of(length).max(0.0) as u64).max(earliest);
            if length >= segment.end || wrap >= last {
                self.render_segment(segment);
                self.clock.samples = last;
                return;
            }

            segment.frames = wrap - first + 1;
            segment.end = length;
            segment.reaches_end = true;
            self.render_segment(segment);

            done += wrap - first;
            let wrap_offset = done as u32;
            let sample_time = self.sample_clock + done;
            if !self.model.is_looping() {
                self.clock = PlayClock::new(0.0, tempo, self.sample_rate);
                self.release_sequenced(wrap_offset);
                self.transport.set_playing(false);
                self.was_playing = false;
                self.notify(Notification::TransportStopped { sample_time });
                return;
            }

            // the next pass keeps the fraction of a sample the loop end fell short of
            let carried =
                clock.anchor + samples_to_beats(wrap as f64, tempo, self.sample_rate) - length;
            self.clock = PlayClock::new(carried.min(0.0), tempo, self.sample_rate);
            // the anchor moved: `clock.samples` restarts at the wrap sample
            fresh_pass = true;

            self.notify(Notification::LoopCompleted { sample_time });
            let (from, to) = self.queue.commit();
            if from != to {
                let pending = &mut self.pending;
                self.drum_notes
                    .release(0.0, true, |n| pending.note_off(wrap_offset, n.note, n.channel));
                self.notify(Notification::SequenceAdvanced {
                    from,
                    to,
                    sample_time,
                });
            }
        }
    }

    fn render_segment(&mut self, segment: Segment) {
        self.release_due(segment);
        self.render_pattern(segment);

        let channel = self.keyboard_channel;
        for id in TrackId::ALL {
            start_notes(
                self.model.track(id),
                channel,
                segment,
                &mut self.track_notes,
                &mut self.pending,
            );
        }
        let sequence = self.queue.current_sequence();
        for track in self.model.drums().sequence(sequence) {
            start_notes(
                track,
                self.drum_channel,
                segment,
                &mut self.drum_notes,
                &mut self.pending,
            );
        }

        // notes short enough to end inside the segment they started in
        self.release_due(segment);
    }

    fn release_due(&mut self, segment: Segment) {
        let pending = &mut self.pending;
        let mut off = |n: ActiveNote| {
            pending.note_off(segment.offset(n.end), n.note, n.channel);
        };
        self.track_notes
            .release(segment.end, segment.reaches_end, &mut off);
        self.drum_notes
            .release(segment.end, segment.reaches_end, &mut off);
    }

    /// Fire the steps whose beat lies in `[start, end)`. Consecutive segments
    /// share their boundary beat, so every step fires once per pass.
    fn render_pattern(&mut self, segment: Segment) {
        let step_length = self.model.length() / PATTERN_STEPS as f64;
        if !(step_length.is_finite() && step_length > 0.0) {
            return;
        }
        let mut step = (segment.start / step_length).floor().max(0.0) as usize;
        while step < PATTERN_STEPS {
            let beat = step as f64 * step_length;
            if beat >= segment.end {
                break;
            }
            if beat >= segment.start {
                self.apply_step(step, segment.offset(beat));
            }
            step += 1;
        }
    }

    fn apply_step(&mut self, step: usize, offset: u32) {
        let root = self
            .latched
            .iter()
            .enumerate()
            .find_map(|(note, velocity)| velocity.map(|v| (note as i32, v)));

        for slot in 0..PATTERN_SLOTS {
            let cell = self.grid.cell(step, slot).unwrap_or(PatternCell::EMPTY);
            match (root, cell.kind()) {
                (Some(_), StepType::Hold) => {}
                (Some((root, velocity)), StepType::NoteOn) => {
                    if let Some(note) = self.pattern_slots[slot].take() {
                        self.pending.note_off(offset, note, self.keyboard_channel);
                    }
                    let note = root + cell.note;
                    if (0..=127).contains(&note) {
                        let note = note as u8;
                        self.pending
                            .note_on(offset, note, velocity, self.keyboard_channel);
                        self.pattern_slots[slot] = Some(note);
                    }
                }
                _ => {
                    if let Some(note) = self.pattern_slots[slot].take() {
                        self.pending.note_off(offset, note, self.keyboard_channel);
                    }
                }
            }
        }
    }
}

/// Note-ons for events of `track` starting inside `segment`
fn start_notes(
    track: &Track,
    channel: u8,
    segment: Segment,
    active: &mut ActiveNotes,
    pending: &mut EventQueue,
) {
    for event in track.events_in_range(segment.start, segment.end) {
        if event.duration <= 0.0 || event.position < segment.start {
            continue;
        }
        let note = ActiveNote {
            note: event.note,
            channel,
            end: event.end(),
        };
        if active.insert(note) {
            pending.note_on(
                segment.offset(event.position),
                event.note,
                event.velocity,
                channel,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{create_command_channel, create_notification_channel};
    use crate::sequencer::model::ModelEdit;
    use crate::sequencer::note::NoteEvent;
    use crate::synth::{RecordingSynth, SynthEvent};
    use ringbuf::traits::{Consumer, Producer};

    const SR: f64 = 48_000.0;

    struct Rig {
        processor: SequencerProcessor,
        commands: crate::messaging::CommandProducer,
        notifications: crate::messaging::NotificationConsumer,
        transport: Arc<SharedTransportState>,
        queue: Arc<SequenceQueue>,
        synth: RecordingSynth,
    }

    impl Rig {
        // 120 BPM at 48 kHz: one beat is 24 000 samples
        fn new() -> Self {
            Self::with_rate(SR, 120.0)
        }

        fn with_rate(sample_rate: f64, tempo: f64) -> Self {
            let (commands, consumer) = create_command_channel(512);
            let (producer, notifications) = create_notification_channel(16);
            let transport = SharedTransportState::new();
            let queue = SequenceQueue::new(4);
            let settings = ProcessorSettings {
                sample_rate,
                keyboard_channel: 0,
                drum_channel: 9,
                manual_note_samples: 1000,
                layout: ModelLayout {
                    tempo,
                    length: 4.0,
                    drum_sequences: 4,
                    drum_tracks: 2,
                },
            };
            let processor = SequencerProcessor::new(
                settings,
                consumer,
                producer,
                PatternGrid::new(),
                Arc::clone(&queue),
                Arc::clone(&transport),
            );
            Self {
                processor,
                commands,
                notifications,
                transport,
                queue,
                synth: RecordingSynth::new(),
            }
        }

        fn send(&mut self, command: Command) {
            assert!(self.commands.try_push(command).is_ok());
        }

        fn add(&mut self, track: TrackId, position: f64, duration: f64, note: u8) {
            self.send(Command::Edit(ModelEdit::AddNote {
                track,
                event: NoteEvent::new(position, duration, note, 100, 0),
            }));
        }

        fn run(&mut self, frames: usize) -> Vec<SynthEvent> {
            self.processor.process(frames, &mut self.synth);
            self.synth.drain()
        }

        /// Every step plays slot 0 on the latched key 60
        fn latch_every_step(&mut self) {
            for step in 0..PATTERN_STEPS {
                self.processor
                    .grid
                    .set_cell(step, 0, PatternCell::new(0, StepType::NoteOn));
            }
            self.send(Command::SetRepeating(true));
            self.send(Command::PlayNote {
                note: 60,
                velocity: 100,
            });
        }

        /// Stream sample of each note-on over `total` samples cut into `block`s
        fn note_on_times(&mut self, block: usize, total: u64) -> Vec<u64> {
            let mut times = Vec::new();
            let mut clock = 0;
            while clock < total {
                for event in self.run(block) {
                    if event.is_note_on() {
                        times.push(clock + u64::from(event.offset()));
                    }
                }
                clock += block as u64;
            }
            times
        }
    }

    #[test]
    fn test_note_on_and_off_are_sample_accurate() {
        let mut rig = Rig::new();
        rig.add(TrackId::Chords, 0.5, 0.25, 60);
        rig.transport.set_playing(true);

        // beat 0.5 = sample 12 000, beat 0.75 = sample 18 000
        let events = rig.run(24_000);
        assert_eq!(
            events,
            vec![
                SynthEvent::NoteOn {
                    note: 60,
                    velocity: 100,
                    channel: 0,
                    offset: 12_000
                },
                SynthEvent::NoteOff {
                    note: 60,
                    channel: 0,
                    offset: 18_000
                },
            ]
        );
        assert_eq!(rig.processor.position(), 1.0);
    }

    #[test]
    fn test_nothing_happens_while_stopped() {
        let mut rig = Rig::new();
        rig.add(TrackId::Chords, 0.0, 1.0, 60);
        assert!(rig.run(24_000).is_empty());
        assert_eq!(rig.processor.position(), 0.0);
    }

    #[test]
    fn test_note_off_at_loop_end_fires_at_wrap() {
        let mut rig = Rig::new();
        rig.add(TrackId::Rhythm, 3.0, 1.0, 36);
        rig.transport.set_playing(true);

        rig.run(72_000); // beats 0..3
        let events = rig.run(48_000); // beats 3..5, wraps at 4
        assert_eq!(events.len(), 2);
        assert!(events[0].is_note_on());
        assert_eq!(events[1].offset(), 24_000);
        assert!(!events[1].is_note_on());
        assert!((rig.processor.position() - 1.0).abs() < 1e-9);

        assert_eq!(
            rig.notifications.try_pop(),
            Some(Notification::LoopCompleted {
                sample_time: 96_000
            })
        );
    }

    #[test]
    fn test_emission_sorted_with_insertion_ties() {
        let mut rig = Rig::new();
        rig.add(TrackId::Chords, 0.5, 1.0, 67);
        rig.add(TrackId::Chords, 0.0, 1.0, 64);
        rig.add(TrackId::Chords, 0.0, 1.0, 60);
        rig.transport.set_playing(true);

        let events = rig.run(24_000);
        let order: Vec<(u8, u32)> = events.iter().map(|e| (e.note(), e.offset())).collect();
        assert_eq!(order, vec![(64, 0), (60, 0), (67, 12_000)]);
    }

    #[test]
    fn test_stop_releases_sequenced_but_not_manual_notes() {
        let mut rig = Rig::new();
        rig.add(TrackId::Chords, 0.0, 2.0, 60);
        rig.send(Command::PlayNote {
            note: 72,
            velocity: 90,
        });
        rig.transport.set_playing(true);
        rig.run(100);

        rig.transport.set_playing(false);
        let events = rig.run(100);
        let offs: Vec<u8> = events.iter().filter(|e| !e.is_note_on()).map(|e| e.note()).collect();
        assert_eq!(offs, vec![60]);
        assert_eq!(rig.processor.sounding_notes(), 0);
    }

    #[test]
    fn test_manual_note_auto_release() {
        let mut rig = Rig::new();
        rig.send(Command::PlayNote {
            note: 72,
            velocity: 90,
        });
        let events = rig.run(600);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_note_on());

        let events = rig.run(600);
        assert_eq!(
            events,
            vec![SynthEvent::NoteOff {
                note: 72,
                channel: 0,
                offset: 400
            }]
        );
    }

    #[test]
    fn test_stop_note_releases_manual_note() {
        let mut rig = Rig::new();
        rig.send(Command::PlayNote {
            note: 72,
            velocity: 90,
        });
        rig.run(10);
        rig.send(Command::StopNote { note: 72 });
        let events = rig.run(10);
        assert_eq!(events.len(), 1);
        assert!(!events[0].is_note_on());
        assert!(rig.run(5000).is_empty());
    }

    #[test]
    fn test_queue_commit_switches_drums_at_wrap() {
        let mut rig = Rig::new();
        rig.send(Command::Edit(ModelEdit::AddDrumNote {
            sequence: 1,
            track: 0,
            event: NoteEvent::new(0.0, 0.25, 38, 100, 9),
        }));
        rig.queue.queue_sequence(1, None);
        rig.transport.set_playing(true);

        rig.run(96_000 - 100);
        let events = rig.run(200);
        assert_eq!(
            events,
            vec![SynthEvent::NoteOn {
                note: 38,
                velocity: 100,
                channel: 9,
                offset: 100
            }]
        );
        assert_eq!(rig.queue.current_sequence(), 1);

        let first = rig.notifications.try_pop();
        assert!(matches!(first, Some(Notification::LoopCompleted { .. })));
        assert!(matches!(
            rig.notifications.try_pop(),
            Some(Notification::SequenceAdvanced { from: 0, to: 1, .. })
        ));
    }

    #[test]
    fn test_non_looping_pass_stops_transport() {
        let mut rig = Rig::new();
        rig.send(Command::Edit(ModelEdit::SetLooping(false)));
        rig.add(TrackId::Chords, 3.5, 0.5, 60);
        rig.transport.set_playing(true);

        rig.run(96_000 - 1000);
        let events = rig.run(2000);
        assert!(events.last().is_some_and(|e| !e.is_note_on()));
        assert!(!rig.transport.is_playing());
        assert_eq!(rig.processor.position(), 0.0);
        assert!(matches!(
            rig.notifications.try_pop(),
            Some(Notification::TransportStopped { .. })
        ));
        assert!(rig.run(48_000).is_empty());
    }

    #[test]
    fn test_rewind_releases_and_resets() {
        let mut rig = Rig::new();
        rig.add(TrackId::Chords, 0.0, 3.0, 60);
        rig.transport.set_playing(true);
        rig.run(24_000);

        rig.send(Command::Rewind);
        let events = rig.run(10);
        assert!(!events[0].is_note_on());
        // the note starts again from beat 0
        assert!(events[1].is_note_on());
        assert_eq!(events[1].offset(), 0);
    }

    #[test]
    fn test_pattern_follows_lowest_latched_key() {
        let mut rig = Rig::new();
        let grid = Arc::clone(&rig.processor.grid);
        grid.set_cell(0, 0, PatternCell::new(0, StepType::NoteOn));
        grid.set_cell(0, 1, PatternCell::new(7, StepType::NoteOn));
        grid.set_cell(1, 0, PatternCell::new(0, StepType::Hold));

        rig.send(Command::SetRepeating(true));
        rig.send(Command::PlayNote {
            note: 64,
            velocity: 80,
        });
        rig.send(Command::PlayNote {
            note: 60,
            velocity: 100,
        });
        rig.transport.set_playing(true);

        // steps are 0.25 beats (6 000 samples) long
        let events = rig.run(6_000);
        let notes: Vec<u8> = events.iter().map(|e| e.note()).collect();
        assert_eq!(notes, vec![60, 67]);

        // step 1 holds slot 0 and releases slot 1
        let events = rig.run(6_000);
        assert_eq!(
            events,
            vec![SynthEvent::NoteOff {
                note: 67,
                channel: 0,
                offset: 0
            }]
        );
        assert_eq!(rig.processor.sounding_notes(), 1);
    }

    #[test]
    fn test_pattern_silent_without_latched_key() {
        let mut rig = Rig::new();
        rig.processor
            .grid
            .set_cell(0, 0, PatternCell::new(0, StepType::NoteOn));
        rig.transport.set_playing(true);
        assert!(rig.run(24_000).is_empty());
    }

    #[test]
    fn test_tempo_change_applies_from_next_block() {
        let mut rig = Rig::new();
        rig.transport.set_playing(true);
        rig.run(24_000);
        assert_eq!(rig.processor.position(), 1.0);

        rig.send(Command::Edit(ModelEdit::SetTempo {
            bpm: 60.0,
            playhead: Some(1.0),
        }));
        rig.run(24_000);
        assert!((rig.processor.position() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_zero_length_renders_nothing() {
        let mut rig = Rig::new();
        rig.add(TrackId::Chords, 0.0, 1.0, 60);
        rig.send(Command::Edit(ModelEdit::SetLength(0.0)));
        rig.transport.set_playing(true);
        assert!(rig.run(4_800).is_empty());
    }

    #[test]
    fn test_pattern_steps_fire_once_per_pass_with_small_blocks() {
        let mut rig = Rig::new();
        rig.send(Command::Edit(ModelEdit::SetLength(8.0)));
        rig.latch_every_step();
        rig.transport.set_playing(true);

        // 8 beats = 192 000 samples per loop, one step every 12 000
        let times = rig.note_on_times(128, 20 * 192_000);
        assert_eq!(times.len(), 20 * PATTERN_STEPS);
        assert_eq!(times[0], 0);
        assert!(times.iter().all(|t| t % 12_000 == 0));
        assert!(times.windows(2).all(|w| w[1] - w[0] == 12_000));
    }

    #[test]
    fn test_pattern_steps_stay_on_grid_at_fractional_beat_lengths() {
        // 133 BPM at 44.1 kHz: a step is 9 947.37 samples
        let mut rig = Rig::with_rate(44_100.0, 133.0);
        rig.send(Command::Edit(ModelEdit::SetLength(8.0)));
        rig.latch_every_step();
        rig.transport.set_playing(true);

        // past step 15 of the 20th loop, short of the 21st loop start
        let times = rig.note_on_times(441, 7_200 * 441);
        assert_eq!(times.len(), 20 * PATTERN_STEPS);
        assert!(
            times
                .windows(2)
                .all(|w| (9_947..=9_948).contains(&(w[1] - w[0])))
        );
    }

    #[test]
    fn test_loop_end_on_block_boundary_wraps_at_offset_zero() {
        let mut rig = Rig::new();
        rig.add(TrackId::Chords, 0.0, 4.0, 60);
        rig.transport.set_playing(true);

        // 96 000 samples per loop = 750 blocks of 128
        for _ in 0..750 {
            rig.run(128);
        }
        let events = rig.run(128);
        let order: Vec<(bool, u32)> = events.iter().map(|e| (e.is_note_on(), e.offset())).collect();
        assert_eq!(order, vec![(false, 0), (true, 0)]);
        assert_eq!(
            rig.notifications.try_pop(),
            Some(Notification::LoopCompleted {
                sample_time: 96_000
            })
        );
    }

    #[test]
    fn test_shortened_loop_wraps_stopped_playhead() {
        let mut rig = Rig::new();
        rig.send(Command::Edit(ModelEdit::SetLength(8.0)));
        rig.transport.set_playing(true);
        rig.run(6 * 24_000);
        rig.transport.set_playing(false);
        rig.run(512);
        assert_eq!(rig.transport.playhead(), 6.0);

        rig.send(Command::Edit(ModelEdit::SetLength(4.0)));
        rig.run(512);
        assert_eq!(rig.processor.position(), 2.0);
        assert_eq!(rig.transport.playhead(), 2.0);
    }

    #[test]
    fn test_one_block_spanning_many_loops() {
        let mut rig = Rig::new();
        // a quarter beat loop is 6 000 samples
        rig.send(Command::Edit(ModelEdit::SetLength(0.25)));
        rig.add(TrackId::Chords, 0.0, 0.1, 60);
        rig.transport.set_playing(true);

        let events = rig.run(100 * 6_000 + 3_000);
        let ons: Vec<u32> = events
            .iter()
            .filter(|e| e.is_note_on())
            .map(|e| e.offset())
            .collect();
        assert_eq!(ons.len(), 101);
        assert!(ons.iter().enumerate().all(|(i, &o)| o == i as u32 * 6_000));
        assert!((rig.processor.position() - 0.125).abs() < 1e-9);
    }
}
