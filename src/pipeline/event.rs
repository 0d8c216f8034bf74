//! Event model accepted by the synthesizer
//!
//! Events are a tagged union that serializes to the same JSON shape hosts
//! send: `{"type": "midi", "midi": {...}, "delayTime": 0, "sequenceNumber": 3}`.

use serde::{Deserialize, Serialize};

use crate::sample_table::{SampleId, SampleParameter, SampleRange};

/// Control change numbers understood by the event handler
pub mod controller {
    pub const BANK_SELECT_MSB: u8 = 0;
    pub const MODULATION: u8 = 1;
    pub const DATA_ENTRY_MSB: u8 = 6;
    pub const MAIN_VOLUME: u8 = 7;
    pub const PAN: u8 = 10;
    pub const EXPRESSION: u8 = 11;
    pub const BANK_SELECT_LSB: u8 = 32;
    pub const DATA_ENTRY_LSB: u8 = 38;
    pub const SUSTAIN: u8 = 64;
    pub const NRPN_LSB: u8 = 98;
    pub const NRPN_MSB: u8 = 99;
    pub const RPN_LSB: u8 = 100;
    pub const RPN_MSB: u8 = 101;
    pub const ALL_SOUNDS_OFF: u8 = 120;
    pub const RESET_CONTROLLERS: u8 = 121;
    pub const ALL_NOTES_OFF: u8 = 123;
}

/// Anything a host can submit to the synthesizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SynthEvent {
    /// Store a decoded sample buffer. Always immediate.
    #[serde(rename_all = "camelCase")]
    LoadSample { data: Vec<f32>, sample_id: SampleId },
    /// Register sample parameters for a key/velocity range. Always immediate.
    SampleParameter {
        parameter: SampleParameter,
        range: SampleRange,
    },
    /// Change the reverb amount, immediate when `delay_time` is zero
    #[serde(rename_all = "camelCase")]
    ReverbControl { amount: f64, delay_time: u64 },
    /// A channel or meta event, delayed by `delay_time` frames when present
    #[serde(rename_all = "camelCase")]
    Midi {
        midi: MidiEvent,
        #[serde(default)]
        delay_time: Option<u64>,
        #[serde(default)]
        sequence_number: u64,
    },
}

impl SynthEvent {
    /// Convenience constructor for a delayed MIDI event
    pub fn midi(midi: MidiEvent, delay_time: u64, sequence_number: u64) -> Self {
        SynthEvent::Midi {
            midi,
            delay_time: Some(delay_time),
            sequence_number,
        }
    }
}

/// MIDI channel and meta events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subtype", rename_all = "camelCase")]
pub enum MidiEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    /// 14-bit value, 0x2000 is centered
    PitchBend { channel: u8, value: u16 },
    ProgramChange { channel: u8, program: u8 },
    Controller { channel: u8, controller: u8, value: u8 },
    ChannelAftertouch { channel: u8, amount: u8 },
    Meta { meta: MetaEvent },
}

impl MidiEvent {
    /// Channel the event addresses; `None` for meta events
    pub fn channel(&self) -> Option<u8> {
        match self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::PitchBend { channel, .. }
            | MidiEvent::ProgramChange { channel, .. }
            | MidiEvent::Controller { channel, .. }
            | MidiEvent::ChannelAftertouch { channel, .. } => Some(*channel),
            MidiEvent::Meta { .. } => None,
        }
    }
}

/// Meta events carried through from MIDI files; the engine ignores them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metaType", rename_all = "camelCase")]
pub enum MetaEvent {
    #[serde(rename_all = "camelCase")]
    SetTempo { microseconds_per_beat: u32 },
    EndOfTrack,
    Text { text: String },
    Unknown { kind: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_event_json_shape() {
        let json = r#"{
            "type": "midi",
            "midi": { "subtype": "noteOn", "channel": 0, "key": 60, "velocity": 100 },
            "delayTime": 441,
            "sequenceNumber": 7
        }"#;
        let event: SynthEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            SynthEvent::midi(
                MidiEvent::NoteOn {
                    channel: 0,
                    key: 60,
                    velocity: 100
                },
                441,
                7
            )
        );
    }

    #[test]
    fn test_missing_delay_is_none() {
        let json = r#"{ "type": "midi", "midi": { "subtype": "programChange", "channel": 2, "program": 5 } }"#;
        match serde_json::from_str::<SynthEvent>(json).unwrap() {
            SynthEvent::Midi { delay_time, .. } => assert_eq!(delay_time, None),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_reverb_and_sample_events() {
        let json = r#"[
            { "type": "reverbControl", "amount": 0.4, "delayTime": 0 },
            { "type": "loadSample", "data": [0.0, 0.5], "sampleId": 3 }
        ]"#;
        let events: Vec<SynthEvent> = serde_json::from_str(json).unwrap();
        assert_eq!(
            events[0],
            SynthEvent::ReverbControl {
                amount: 0.4,
                delay_time: 0
            }
        );
        assert_eq!(
            events[1],
            SynthEvent::LoadSample {
                data: vec![0.0, 0.5],
                sample_id: SampleId(3)
            }
        );
    }

    #[test]
    fn test_channel_of_meta_is_none() {
        let meta = MidiEvent::Meta {
            meta: MetaEvent::EndOfTrack,
        };
        assert_eq!(meta.channel(), None);
        let cc = MidiEvent::Controller {
            channel: 9,
            controller: controller::PAN,
            value: 0,
        };
        assert_eq!(cc.channel(), Some(9));
    }
}
