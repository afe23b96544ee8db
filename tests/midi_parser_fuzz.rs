//! Fuzzing tests for the MIDI parser
//!
//! Random and malformed input must never panic, and well-formed packets
//! must survive splitting and parsing intact.

use rand::Rng;
use soundfont_sequencer::midi::{MidiEvent, split_messages};

/// Random byte soup through the splitter and the parser
#[test]
fn fuzz_random_packets() {
    let mut rng = rand::thread_rng();

    for _ in 0..1000 {
        let length = rng.gen_range(0..=64);
        let packet: Vec<u8> = (0..length).map(|_| rng.gen_range(0..=255)).collect();

        for message in split_messages(&packet) {
            // every message starts at a status byte
            assert!(message[0] & 0x80 != 0);
            let _ = MidiEvent::from_bytes(message);
        }
    }
}

/// Encoded events concatenated into one packet come back in order
#[test]
fn fuzz_encoded_packets() {
    let mut rng = rand::thread_rng();

    for _ in 0..500 {
        let mut packet = Vec::new();
        let mut expected = Vec::new();
        for _ in 0..rng.gen_range(1..=8) {
            let event = match rng.gen_range(0..=6) {
                0 => MidiEvent::NoteOn {
                    note: rng.gen_range(0..=127),
                    velocity: rng.gen_range(1..=127),
                },
                1 => MidiEvent::NoteOff {
                    note: rng.gen_range(0..=127),
                },
                2 => MidiEvent::ControlChange {
                    controller: rng.gen_range(0..=127),
                    value: rng.gen_range(0..=127),
                },
                3 => MidiEvent::ProgramChange {
                    program: rng.gen_range(0..=127),
                },
                4 => MidiEvent::PitchBend {
                    value: rng.gen_range(0..=0x3FFF),
                },
                5 => MidiEvent::Clock,
                _ => MidiEvent::Start,
            };
            let (bytes, len) = event.to_bytes(rng.gen_range(0..=15));
            packet.extend_from_slice(&bytes[..len]);
            expected.push(event);
        }

        let parsed: Vec<MidiEvent> = split_messages(&packet)
            .filter_map(MidiEvent::from_bytes)
            .collect();
        assert_eq!(parsed, expected);
    }
}

/// Incomplete channel messages are rejected
#[test]
fn test_truncated_messages() {
    assert_eq!(MidiEvent::from_bytes(&[0x90, 0x40]), None);
    assert_eq!(MidiEvent::from_bytes(&[0xB0, 0x07]), None);
    assert_eq!(MidiEvent::from_bytes(&[0xE0, 0x00]), None);
    assert_eq!(MidiEvent::from_bytes(&[0xC0]), None);
}

/// Data bytes alone are never a message
#[test]
fn test_data_bytes_rejected() {
    for byte in 0x00..=0x7F {
        assert_eq!(MidiEvent::from_bytes(&[byte]), None);
    }
}

/// Many note messages across every channel
#[test]
fn test_note_messages_on_all_channels() {
    for i in 0..1000u32 {
        let channel = (i % 16) as u8;
        let note = (i % 128) as u8;
        let velocity = (i % 128) as u8;

        let result = MidiEvent::from_bytes(&[0x90 | channel, note, velocity]);
        if velocity == 0 {
            assert_eq!(result, Some(MidiEvent::NoteOff { note }));
        } else {
            assert_eq!(result, Some(MidiEvent::NoteOn { note, velocity }));
        }
    }
}
