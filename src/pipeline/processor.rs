//! Synth core: channel state, voice allocation and the per-buffer render loop
//!
//! Every MIDI control operation addresses one channel, creating its state on
//! first use. Rendering mixes all voices into dry buffers and passes them
//! through the reverb into the caller's output.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{trace, warn};

use crate::generator::WavetableOscillator;
use crate::pipeline::channel::ChannelState;
use crate::pipeline::scheduler::EventScheduler;
use crate::reverb::Reverb;
use crate::sample_table::{SampleId, SampleParameter, SampleRange, SampleTable};

/// Channel reserved for percussion
pub const RHYTHM_CHANNEL: u8 = 9;

/// Bank the percussion channel always plays from
pub const RHYTHM_BANK: u16 = 128;

/// Controller value at or above which a switch pedal is down
const PEDAL_THRESHOLD: u8 = 64;

pub struct SynthCore {
    sample_rate: u32,
    sample_table: SampleTable,
    channels: BTreeMap<u8, ChannelState>,
    scheduler: EventScheduler,
    reverb: Reverb,
    dry_left: Vec<f32>,
    dry_right: Vec<f32>,
}

impl SynthCore {
    /// Create an engine with no samples and no channels
    ///
    /// # Arguments
    /// * `sample_rate` - Output sample rate in Hz
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            sample_table: SampleTable::new(),
            channels: BTreeMap::new(),
            scheduler: EventScheduler::new(),
            reverb: Reverb::new(sample_rate),
            dry_left: Vec::new(),
            dry_right: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sample_table(&self) -> &SampleTable {
        &self.sample_table
    }

    pub fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut EventScheduler {
        &mut self.scheduler
    }

    pub fn reverb(&self) -> &Reverb {
        &self.reverb
    }

    /// State of a channel that has been addressed at least once
    pub fn channel(&self, channel: u8) -> Option<&ChannelState> {
        self.channels.get(&channel)
    }

    /// Channels that currently have state
    pub fn active_channels(&self) -> impl Iterator<Item = u8> + '_ {
        self.channels.keys().copied()
    }

    /// Sounding voices across all channels
    pub fn voice_count(&self) -> usize {
        self.channels.values().map(ChannelState::voice_count).sum()
    }

    fn channel_mut(&mut self, channel: u8) -> &mut ChannelState {
        self.channels.entry(channel).or_default()
    }

    pub fn add_sample(&mut self, data: Vec<f32>, id: SampleId) {
        self.sample_table.add_sample(data, id);
    }

    pub fn add_sample_bytes(&mut self, bytes: &[u8], id: SampleId) {
        self.sample_table.add_sample_bytes(bytes, id);
    }

    pub fn add_sample_parameter(&mut self, parameter: SampleParameter, range: SampleRange) {
        self.sample_table.add_sample_parameter(parameter, range);
    }

    /// Set the reverb amount (0.0 to 1.0)
    pub fn set_reverb(&mut self, amount: f64) {
        self.reverb.set_reverb(amount);
    }

    /// Start one voice per sample mapped to the key and velocity
    ///
    /// New voices with an exclusive class force-stop the channel's other
    /// voices in the same class.
    pub fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) {
        let sample_rate = self.sample_rate;
        let state = self.channels.entry(channel).or_default();
        let bank = if channel == RHYTHM_CHANNEL {
            RHYTHM_BANK
        } else {
            state.bank
        };

        let samples = self.sample_table.get_samples(bank, state.instrument, pitch, velocity);
        if samples.is_empty() {
            warn!(
                channel,
                bank,
                instrument = state.instrument,
                pitch,
                velocity,
                "No samples for note"
            );
            return;
        }

        let normalized_velocity = velocity as f64 / 127.0;
        let new_voices: Vec<WavetableOscillator> = samples
            .iter()
            .map(|sample| {
                let mut voice = WavetableOscillator::new(sample, sample_rate);
                voice.note_on(pitch, normalized_velocity);
                voice
            })
            .collect();

        let classes: BTreeSet<u32> = new_voices.iter().filter_map(WavetableOscillator::exclusive_class).collect();
        if !classes.is_empty() {
            for voice in state.voices_mut() {
                if voice.is_playing() && voice.exclusive_class().is_some_and(|class| classes.contains(&class)) {
                    trace!(channel, pitch, class = ?voice.exclusive_class(), "Stealing exclusive voice");
                    voice.force_stop();
                }
            }
        }

        state.voices.entry(pitch).or_default().extend(new_voices);
    }

    /// Release the key's voices, or mark them held while the pedal is down
    pub fn note_off(&mut self, channel: u8, pitch: u8) {
        let state = self.channel_mut(channel);
        let hold = state.hold;
        if let Some(voices) = state.voices.get_mut(&pitch) {
            release_voices(voices.iter_mut(), hold);
        }
    }

    /// Raw 14-bit pitch bend, 0x2000 is centered
    pub fn pitch_bend(&mut self, channel: u8, value: u16) {
        self.channel_mut(channel).set_pitch_bend(value);
    }

    pub fn program_change(&mut self, channel: u8, program: u8) {
        self.channel_mut(channel).instrument = program;
    }

    /// Bend range in semitones, applies from the next bend message
    pub fn set_pitch_bend_sensitivity(&mut self, channel: u8, semitones: f64) {
        self.channel_mut(channel).pitch_bend_sensitivity = semitones;
    }

    pub fn set_main_volume(&mut self, channel: u8, value: u8) {
        self.channel_mut(channel).volume = value as f64 / 127.0;
    }

    pub fn expression(&mut self, channel: u8, value: u8) {
        self.channel_mut(channel).expression = value as f64 / 127.0;
    }

    /// Center 64 maps to 0.0
    pub fn set_pan(&mut self, channel: u8, value: u8) {
        self.channel_mut(channel).pan = (value as f64 / 64.0 - 1.0).clamp(-1.0, 1.0);
    }

    pub fn modulation(&mut self, channel: u8, value: u8) {
        self.channel_mut(channel).modulation = value as f64 / 127.0;
    }

    pub fn bank_select(&mut self, channel: u8, bank: u16) {
        self.channel_mut(channel).bank = bank;
    }

    /// Sustain pedal; lifting it releases every held voice
    pub fn hold(&mut self, channel: u8, value: u8) {
        let state = self.channel_mut(channel);
        let engaged = value >= PEDAL_THRESHOLD;
        let released = state.hold && !engaged;
        state.hold = engaged;

        if released {
            for voice in state.voices_mut().filter(|voice| voice.is_hold()) {
                voice.note_off();
            }
        }
    }

    /// Cancel the channel's scheduled events and cut every voice
    pub fn all_sounds_off(&mut self, channel: u8) {
        self.scheduler.remove_scheduled_events(channel);
        for voice in self.channel_mut(channel).voices_mut() {
            voice.force_stop();
        }
    }

    /// Ordinary note-off for every voice on the channel
    pub fn all_notes_off(&mut self, channel: u8) {
        let state = self.channel_mut(channel);
        let hold = state.hold;
        release_voices(state.voices.values_mut().flatten(), hold);
    }

    /// Drop the channel's state; it is recreated with defaults on next use
    pub fn reset_channel(&mut self, channel: u8) {
        self.channels.remove(&channel);
    }

    /// Render one buffer of every channel through the reverb into the outputs
    ///
    /// Does not dispatch scheduled events; the synthesizer does that first.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        self.dry_left.clear();
        self.dry_left.resize(frames, 0.0);
        self.dry_right.clear();
        self.dry_right.resize(frames, 0.0);

        for state in self.channels.values_mut() {
            state.render(&mut self.dry_left, &mut self.dry_right);
        }

        self.reverb
            .process(&self.dry_left, &self.dry_right, &mut left[..frames], &mut right[..frames]);
    }
}

/// Note-off for every voice not yet released, or mark held under the pedal
fn release_voices<'a>(voices: impl Iterator<Item = &'a mut WavetableOscillator>, hold: bool) {
    for voice in voices.filter(|voice| !voice.is_note_off()) {
        if hold {
            voice.set_hold(true);
        } else {
            voice.note_off();
        }
    }
}
