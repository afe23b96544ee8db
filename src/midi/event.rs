// MIDI event types - parsing and encoding of 1-3 byte messages

/// A parsed MIDI message. Channel bits are not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    ControlChange { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    PitchBend { value: i16 },
    Clock,
    Start,
    Continue,
    Stop,
}

impl MidiEvent {
    /// Parse a raw MIDI message
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;

        match status {
            0xF8 => return Some(MidiEvent::Clock),
            0xFA => return Some(MidiEvent::Start),
            0xFB => return Some(MidiEvent::Continue),
            0xFC => return Some(MidiEvent::Stop),
            _ => {}
        }

        match (status & 0xF0, data) {
            // Velocity 0 = Note Off
            (0x90, &[note, 0, ..]) => Some(MidiEvent::NoteOff { note }),
            (0x90, &[note, velocity, ..]) => Some(MidiEvent::NoteOn { note, velocity }),
            (0x80, &[note, _, ..]) => Some(MidiEvent::NoteOff { note }),
            (0xB0, &[controller, value, ..]) => {
                Some(MidiEvent::ControlChange { controller, value })
            }
            (0xC0, &[program, ..]) => Some(MidiEvent::ProgramChange { program }),
            (0xE0, &[lsb, msb, ..]) => Some(MidiEvent::PitchBend {
                value: ((msb as i16) << 7) | lsb as i16,
            }),
            _ => None,
        }
    }

    /// Encode on `channel`; returns the buffer and how many bytes are used
    pub fn to_bytes(&self, channel: u8) -> ([u8; 3], usize) {
        let channel = channel & 0x0F;
        match *self {
            MidiEvent::NoteOn { note, velocity } => {
                ([0x90 | channel, note & 0x7F, velocity & 0x7F], 3)
            }
            MidiEvent::NoteOff { note } => ([0x80 | channel, note & 0x7F, 0], 3),
            MidiEvent::ControlChange { controller, value } => {
                ([0xB0 | channel, controller & 0x7F, value & 0x7F], 3)
            }
            MidiEvent::ProgramChange { program } => ([0xC0 | channel, program & 0x7F, 0], 2),
            MidiEvent::PitchBend { value } => {
                let value = value.clamp(0, 0x3FFF) as u16;
                ([0xE0 | channel, (value & 0x7F) as u8, (value >> 7) as u8], 3)
            }
            MidiEvent::Clock => ([0xF8, 0, 0], 1),
            MidiEvent::Start => ([0xFA, 0, 0], 1),
            MidiEvent::Continue => ([0xFB, 0, 0], 1),
            MidiEvent::Stop => ([0xFC, 0, 0], 1),
        }
    }
}

/// Split a packet holding several messages at each status byte
pub fn split_messages(packet: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = packet;
    std::iter::from_fn(move || {
        // skip stray data bytes
        let start = rest.iter().position(|b| b & 0x80 != 0)?;
        let tail = &rest[start..];
        let len = tail[1..]
            .iter()
            .position(|b| b & 0x80 != 0)
            .map_or(tail.len(), |p| p + 1);
        let (message, remaining) = tail.split_at(len);
        rest = remaining;
        Some(message)
    })
}
