//! Event dispatch into the synth core
//!
//! Translates events into core operations. Multi-message controller
//! sequences (bank select MSB/LSB, RPN/NRPN with data entry) are tracked here
//! per channel until they are complete.

use std::collections::BTreeMap;

use tracing::debug;

use crate::pipeline::event::{controller, MidiEvent, SynthEvent};
use crate::pipeline::processor::{SynthCore, RHYTHM_CHANNEL};

/// RPN selector value that deselects the current parameter
const RPN_NULL: u8 = 127;

/// Partially received controller sequences for one channel
#[derive(Debug, Clone, Default, PartialEq)]
struct ControllerState {
    bank_msb: Option<u8>,
    bank_lsb: Option<u8>,
    rpn_msb: Option<u8>,
    rpn_lsb: Option<u8>,
    /// An NRPN is selected, data entry is not ours to interpret
    nrpn: bool,
    /// Last data entry MSB, refined by a following LSB
    data_msb: Option<u8>,
}

impl ControllerState {
    fn clear_rpn(&mut self) {
        self.rpn_msb = None;
        self.rpn_lsb = None;
        self.data_msb = None;
    }

    /// RPN 0/0 selected
    fn is_pitch_bend_sensitivity(&self) -> bool {
        !self.nrpn && self.rpn_lsb == Some(0) && self.rpn_msb.unwrap_or(0) == 0
    }
}

#[derive(Debug, Default)]
pub struct EventHandler {
    channels: BTreeMap<u8, ControllerState>,
    transpose: i32,
}

impl EventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift melodic note numbers by `semitones`; the rhythm channel is not
    /// transposed
    pub fn set_transpose(&mut self, semitones: i32) {
        self.transpose = semitones;
    }

    pub fn transpose(&self) -> i32 {
        self.transpose
    }

    /// Handle an event that bypassed the scheduler
    pub fn handle_immediate(&mut self, event: SynthEvent, core: &mut SynthCore) {
        match event {
            SynthEvent::LoadSample { data, sample_id } => core.add_sample(data, sample_id),
            SynthEvent::SampleParameter { parameter, range } => core.add_sample_parameter(parameter, range),
            SynthEvent::ReverbControl { amount, .. } => core.set_reverb(amount),
            SynthEvent::Midi { midi, .. } => self.handle_midi(midi, core),
        }
    }

    /// Apply one MIDI event to the core
    pub fn handle_midi(&mut self, event: MidiEvent, core: &mut SynthCore) {
        match event {
            MidiEvent::NoteOn {
                channel,
                key,
                velocity: 0,
            } => core.note_off(channel, self.transposed(channel, key)),
            MidiEvent::NoteOn {
                channel,
                key,
                velocity,
            } => core.note_on(channel, self.transposed(channel, key), velocity),
            MidiEvent::NoteOff { channel, key, .. } => core.note_off(channel, self.transposed(channel, key)),
            MidiEvent::PitchBend { channel, value } => core.pitch_bend(channel, value),
            MidiEvent::ProgramChange { channel, program } => core.program_change(channel, program),
            MidiEvent::Controller {
                channel,
                controller,
                value,
            } => self.handle_controller(channel, controller, value, core),
            MidiEvent::ChannelAftertouch { channel, amount } => {
                debug!(channel, amount, "Ignoring channel aftertouch");
            }
            MidiEvent::Meta { meta } => {
                debug!(?meta, "Ignoring meta event");
            }
        }
    }

    fn transposed(&self, channel: u8, key: u8) -> u8 {
        if channel == RHYTHM_CHANNEL || self.transpose == 0 {
            return key;
        }
        (key as i32 + self.transpose).clamp(0, 127) as u8
    }

    fn handle_controller(&mut self, channel: u8, number: u8, value: u8, core: &mut SynthCore) {
        match number {
            controller::BANK_SELECT_MSB => {
                let state = self.channels.entry(channel).or_default();
                state.bank_msb = Some(value);
                Self::apply_bank(channel, state, core);
            }
            controller::BANK_SELECT_LSB => {
                let state = self.channels.entry(channel).or_default();
                state.bank_lsb = Some(value);
                Self::apply_bank(channel, state, core);
            }
            controller::MODULATION => core.modulation(channel, value),
            controller::MAIN_VOLUME => core.set_main_volume(channel, value),
            controller::PAN => core.set_pan(channel, value),
            controller::EXPRESSION => core.expression(channel, value),
            controller::SUSTAIN => core.hold(channel, value),
            controller::RPN_MSB | controller::RPN_LSB => {
                let state = self.channels.entry(channel).or_default();
                if value == RPN_NULL {
                    state.clear_rpn();
                    state.nrpn = false;
                } else {
                    state.nrpn = false;
                    state.data_msb = None;
                    if number == controller::RPN_MSB {
                        state.rpn_msb = Some(value);
                    } else {
                        state.rpn_lsb = Some(value);
                    }
                }
            }
            controller::NRPN_MSB | controller::NRPN_LSB => {
                let state = self.channels.entry(channel).or_default();
                state.clear_rpn();
                state.nrpn = true;
            }
            controller::DATA_ENTRY_MSB => {
                let state = self.channels.entry(channel).or_default();
                if state.is_pitch_bend_sensitivity() {
                    state.data_msb = Some(value);
                    core.set_pitch_bend_sensitivity(channel, value as f64);
                } else {
                    debug!(
                        channel,
                        value,
                        rpn_msb = ?state.rpn_msb,
                        rpn_lsb = ?state.rpn_lsb,
                        nrpn = state.nrpn,
                        "Ignoring data entry"
                    );
                }
            }
            controller::DATA_ENTRY_LSB => {
                let state = self.channels.entry(channel).or_default();
                match state.data_msb {
                    Some(semitones) if state.is_pitch_bend_sensitivity() => {
                        core.set_pitch_bend_sensitivity(channel, semitones as f64 + value as f64 / 100.0);
                    }
                    _ => debug!(channel, value, "Ignoring data entry LSB"),
                }
            }
            controller::ALL_SOUNDS_OFF => core.all_sounds_off(channel),
            controller::RESET_CONTROLLERS => {
                self.channels.remove(&channel);
                core.reset_channel(channel);
            }
            controller::ALL_NOTES_OFF => core.all_notes_off(channel),
            _ => debug!(channel, controller = number, value, "Ignoring controller"),
        }
    }

    /// Select the combined bank once both halves have arrived
    fn apply_bank(channel: u8, state: &mut ControllerState, core: &mut SynthCore) {
        if let (Some(msb), Some(lsb)) = (state.bank_msb, state.bank_lsb) {
            core.bank_select(channel, ((msb as u16) << 7) + lsb as u16);
            state.bank_msb = None;
            state.bank_lsb = None;
        }
    }
}
