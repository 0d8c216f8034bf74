//! Per-MIDI-channel mixer state
//!
//! A channel owns the voices it started, keyed by MIDI note number, plus the
//! controller values pushed onto those voices before every buffer.

use std::collections::BTreeMap;

use crate::generator::{GeneratorState, SignalGenerator, WavetableOscillator};

/// Pitch bend value at rest (14-bit center)
pub const PITCH_BEND_CENTER: u16 = 0x2000;

/// Default pitch bend range in semitones
pub const DEFAULT_PITCH_BEND_SENSITIVITY: f64 = 2.0;

/// Default main volume (CC 7 value 100)
pub const DEFAULT_VOLUME: f64 = 100.0 / 127.0;

#[derive(Debug, Clone)]
pub struct ChannelState {
    /// Main volume, 0.0 to 1.0
    pub volume: f64,
    /// Expression, 0.0 to 1.0, multiplies volume
    pub expression: f64,
    /// -1.0 (left) to 1.0 (right)
    pub pan: f64,
    /// Current bend in semitones
    pub pitch_bend: f64,
    /// Bend range in semitones
    pub pitch_bend_sensitivity: f64,
    pub bank: u16,
    pub instrument: u8,
    /// Modulation wheel, 0.0 to 1.0
    pub modulation: f64,
    /// Sustain pedal down
    pub hold: bool,
    /// Sounding voices per key
    pub voices: BTreeMap<u8, Vec<WavetableOscillator>>,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            expression: 1.0,
            pan: 0.0,
            pitch_bend: 0.0,
            pitch_bend_sensitivity: DEFAULT_PITCH_BEND_SENSITIVITY,
            bank: 0,
            instrument: 0,
            modulation: 0.0,
            hold: false,
            voices: BTreeMap::new(),
        }
    }
}

impl ChannelState {
    /// Store a raw 14-bit bend value scaled by the current sensitivity
    pub fn set_pitch_bend(&mut self, value: u16) {
        self.pitch_bend = (value as f64 / PITCH_BEND_CENTER as f64 - 1.0) * self.pitch_bend_sensitivity;
    }

    /// Playback speed multiplier for the current bend
    pub fn pitch_bend_speed(&self) -> f64 {
        2f64.powf(self.pitch_bend / 12.0)
    }

    /// Volume as seen by the voices (main volume times expression)
    pub fn effective_volume(&self) -> f64 {
        self.volume * self.expression
    }

    /// Every voice on the channel regardless of key
    pub fn voices_mut(&mut self) -> impl Iterator<Item = &mut WavetableOscillator> {
        self.voices.values_mut().flatten()
    }

    pub fn voice_count(&self) -> usize {
        self.voices.values().map(Vec::len).sum()
    }

    /// Render every voice into the dry buffers and drop finished ones
    ///
    /// The channel's controller values are pushed onto each voice first, so
    /// controller changes take effect on the next buffer.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        let speed = self.pitch_bend_speed();
        let volume = self.effective_volume();
        let pan = self.pan;
        let modulation = self.modulation;

        for voices in self.voices.values_mut() {
            voices.retain_mut(|voice| {
                voice.set_speed(speed);
                voice.set_volume(volume);
                voice.set_pan(pan);
                voice.set_modulation(modulation);
                voice.process(left, right) == GeneratorState::Running
            });
        }
        self.voices.retain(|_, voices| !voices.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_defaults() {
        let channel = ChannelState::default();
        assert_abs_diff_eq!(channel.volume, 100.0 / 127.0);
        assert_eq!(channel.expression, 1.0);
        assert_eq!(channel.pitch_bend_sensitivity, 2.0);
        assert_eq!(channel.pitch_bend_speed(), 1.0);
        assert_eq!(channel.voice_count(), 0);
    }

    #[test]
    fn test_pitch_bend_scaling() {
        let mut channel = ChannelState::default();

        // Center is no bend
        channel.set_pitch_bend(PITCH_BEND_CENTER);
        assert_eq!(channel.pitch_bend, 0.0);

        // Full down is -sensitivity semitones
        channel.set_pitch_bend(0);
        assert_abs_diff_eq!(channel.pitch_bend, -2.0);
        assert_abs_diff_eq!(channel.pitch_bend_speed(), 2f64.powf(-2.0 / 12.0), epsilon = 1e-12);

        // Half up with a 12 semitone range
        channel.pitch_bend_sensitivity = 12.0;
        channel.set_pitch_bend(0x3000);
        assert_abs_diff_eq!(channel.pitch_bend, 6.0);
    }

    #[test]
    fn test_effective_volume() {
        let mut channel = ChannelState::default();
        channel.volume = 0.5;
        channel.expression = 0.5;
        assert_eq!(channel.effective_volume(), 0.25);
    }
}
