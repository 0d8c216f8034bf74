use std::f64::consts::PI;
use std::sync::Arc;

use super::envelope::Envelope;
use super::lfo::Lfo;
use super::{GeneratorState, SignalGenerator};
use crate::sample_table::{LoopKind, ResolvedSample, SampleParameter};

/// Vibrato depth at full modulation wheel, in cents
pub const MODULATION_DEPTH_CENTS: f64 = 50.0;

/// Stereo gains for a pan position in [-1, 1] (equal-power law)
pub fn pan_gains(pan: f64) -> (f64, f64) {
    let theta = (pan.clamp(-1.0, 1.0) + 1.0) * PI / 4.0;
    (theta.cos(), theta.sin())
}

/// One sounding instance of one sample
///
/// Reads the sample buffer at a pitch-dependent speed with linear
/// interpolation, follows the sample's loop rules and accumulates the
/// enveloped, panned result into stereo output buffers.
///
/// Channel state (pitch bend, volume, pan, modulation) is pushed onto the
/// voice before each buffer through the setters.
#[derive(Debug, Clone)]
pub struct WavetableOscillator {
    parameter: Arc<SampleParameter>,
    data: Arc<[f32]>,
    sample_rate: u32,

    // Bounds clamped to the buffer so reads never go out of range
    sample_start: usize,
    sample_end: usize,
    loop_region: Option<(usize, usize)>,

    envelope: Envelope,
    lfo: Lfo,

    position: f64,
    base_speed: f64,
    velocity: f64,

    // Pushed from the channel
    speed: f64,
    volume: f64,
    pan: f64,
    modulation: f64,

    playing: bool,
    note_off: bool,
    hold: bool,
}

impl WavetableOscillator {
    /// Create an idle voice for a resolved sample
    ///
    /// # Arguments
    /// * `sample` - Parameter and buffer returned by the sample table
    /// * `sample_rate` - Engine output rate in Hz
    pub fn new(sample: &ResolvedSample, sample_rate: u32) -> Self {
        let parameter = Arc::clone(&sample.parameter);
        let data = Arc::clone(&sample.data);

        let sample_end = parameter.sample_end.min(data.len());
        let sample_start = parameter.sample_start.min(sample_end);
        let looping = parameter.looping;
        let loop_region = (looping.kind != LoopKind::None
            && looping.start < looping.end
            && looping.end <= sample_end)
            .then_some((looping.start, looping.end));

        Self {
            envelope: Envelope::new(parameter.envelope, sample_rate),
            lfo: Lfo::new(sample_rate),
            parameter,
            data,
            sample_rate: sample_rate.max(1),
            sample_start,
            sample_end,
            loop_region,
            position: sample_start as f64,
            base_speed: 1.0,
            velocity: 0.0,
            speed: 1.0,
            volume: 1.0,
            pan: 0.0,
            modulation: 0.0,
            playing: false,
            note_off: false,
            hold: false,
        }
    }

    /// Start playing the sample at `pitch`
    ///
    /// # Arguments
    /// * `pitch` - MIDI note number
    /// * `velocity` - Normalized velocity (0.0 to 1.0)
    pub fn note_on(&mut self, pitch: u8, velocity: f64) {
        self.velocity = velocity;
        self.playing = true;
        self.note_off = false;
        self.hold = false;
        self.position = self.sample_start as f64;
        let interval = (pitch as f64 - self.parameter.pitch) / 12.0 * self.parameter.scale_tuning;
        self.base_speed = 2f64.powf(interval);
        self.lfo.reset();
        self.envelope.note_on();
    }

    pub fn note_off(&mut self) {
        self.note_off = true;
        self.hold = false;
        self.envelope.note_off();
    }

    /// Fade out immediately, ignoring the release time
    pub fn force_stop(&mut self) {
        self.envelope.force_stop();
    }

    /// Pitch multiplier from the channel's pitch bend
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    /// Channel volume (0.0 to 1.0), squared together with velocity
    pub fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
    }

    /// Channel pan in [-1, 1]; combined with the sample's own pan
    pub fn set_pan(&mut self, pan: f64) {
        self.pan = pan;
    }

    /// Modulation wheel amount (0.0 to 1.0)
    pub fn set_modulation(&mut self, modulation: f64) {
        self.modulation = modulation;
    }

    pub fn set_hold(&mut self, hold: bool) {
        self.hold = hold;
    }

    pub fn is_hold(&self) -> bool {
        self.hold
    }

    pub fn is_note_off(&self) -> bool {
        self.note_off
    }

    /// True while the sample has data left and the envelope has not stopped
    pub fn is_playing(&self) -> bool {
        self.playing && self.envelope.is_playing()
    }

    pub fn exclusive_class(&self) -> Option<u32> {
        self.parameter.exclusive_class
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Current read position in sample frames
    pub fn position(&self) -> f64 {
        self.position
    }

    fn is_looping(&self) -> bool {
        match self.parameter.looping.kind {
            LoopKind::None => false,
            LoopKind::Continuous => self.loop_region.is_some(),
            LoopKind::Sustain => self.loop_region.is_some() && !self.note_off,
        }
    }

    /// Index read after `index` for interpolation
    fn next_index(&self, index: usize, looping: bool) -> usize {
        if let (true, Some((loop_start, loop_end))) = (looping, self.loop_region) {
            if index + 1 >= loop_end {
                return loop_start;
            }
        }
        (index + 1).min(self.sample_end - 1)
    }

    /// Wrap an advanced position back into the loop when it crosses the loop end
    fn wrap_position(&self, position: f64, looping: bool) -> f64 {
        match (looping, self.loop_region) {
            (true, Some((loop_start, loop_end))) if position >= loop_end as f64 => {
                let length = (loop_end - loop_start) as f64;
                loop_start as f64 + (position - loop_end as f64) % length
            }
            _ => position,
        }
    }
}

impl SignalGenerator for WavetableOscillator {
    fn process(&mut self, left: &mut [f32], right: &mut [f32]) -> GeneratorState {
        if !self.is_playing() {
            return GeneratorState::Complete;
        }

        let frames = left.len().min(right.len());
        let amplitude = self.envelope.calculate_amplitude(frames);
        let lfo = self.lfo.calculate_value(frames);

        let vibrato = 1.0 + lfo * self.modulation * (MODULATION_DEPTH_CENTS / 1200.0);
        let rate_ratio = self.parameter.sample_rate as f64 / self.sample_rate as f64;
        let speed = self.base_speed * self.speed * rate_ratio * vibrato;

        let velocity_volume = self.velocity * self.volume;
        let gain = amplitude * velocity_volume * velocity_volume * self.parameter.volume;
        let (pan_left, pan_right) = pan_gains(self.pan + self.parameter.pan);
        let gain_left = (gain * pan_left) as f32;
        let gain_right = (gain * pan_right) as f32;

        let looping = self.is_looping();
        for (out_left, out_right) in left.iter_mut().zip(right.iter_mut()) {
            if self.position >= self.sample_end as f64 {
                self.playing = false;
                break;
            }

            let index = self.position as usize;
            let fraction = (self.position - index as f64) as f32;
            let current = self.data[index];
            let next = self.data[self.next_index(index, looping)];
            let value = current + (next - current) * fraction;

            *out_left += value * gain_left;
            *out_right += value * gain_right;

            self.position = self.wrap_position(self.position + speed, looping);
        }

        if self.position >= self.sample_end as f64 {
            self.playing = false;
        }

        if self.is_playing() {
            GeneratorState::Running
        } else {
            GeneratorState::Complete
        }
    }

    fn is_complete(&self) -> bool {
        !self.is_playing()
    }
}
