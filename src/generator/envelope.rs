use serde::{Deserialize, Serialize};

/// Length of the forced-stop fade, in seconds
pub const FORCE_STOP_TIME: f64 = 0.1;

/// Attenuation treated as silence by release and decay-to-zero, in decibels
pub const SILENCE_DECIBEL: f64 = -100.0;

/// Envelope timing of a sample, times in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvelopeParams {
    pub attack_time: f64,
    pub hold_time: f64,
    pub decay_time: f64,
    /// Level held during sustain (0.0 to 1.0)
    pub sustain_level: f64,
    pub release_time: f64,
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self {
            attack_time: 0.0,
            hold_time: 0.0,
            decay_time: 0.0,
            sustain_level: 1.0,
            release_time: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopePhase {
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
    ForcedStop,
    Stopped,
}

/// Attack-hold-decay-sustain-release amplitude envelope
///
/// Produces one amplitude per rendered buffer:
/// 1. Attack: linear ramp from 0.0 to 1.0
/// 2. Hold: stays at 1.0
/// 3. Decay: decibel-linear fall from 1.0 to the sustain level
/// 4. Sustain: holds the sustain level until note-off
/// 5. Release: decibel-linear fall from the note-off level to silence
///
/// A forced stop fades linearly to zero over `FORCE_STOP_TIME` from any phase.
/// Time advances by buffer length, so the curve depends only on how many
/// frames have been rendered.
#[derive(Debug, Clone)]
pub struct Envelope {
    params: EnvelopeParams,
    sample_rate: f64,

    phase: EnvelopePhase,
    /// Frames rendered since the current phase started
    phase_frames: u64,
    last_amplitude: f64,
    /// Amplitude snapshot that release and forced stop fall from
    release_from: f64,
    /// Note-off received before the envelope reached decay
    pending_release: bool,
}

impl Envelope {
    /// Create a stopped envelope
    ///
    /// # Arguments
    /// * `params` - Phase timing and sustain level
    /// * `sample_rate` - Engine sample rate in Hz, converts frames to seconds
    pub fn new(params: EnvelopeParams, sample_rate: u32) -> Self {
        Self {
            params,
            sample_rate: sample_rate.max(1) as f64,
            phase: EnvelopePhase::Stopped,
            phase_frames: 0,
            last_amplitude: 0.0,
            release_from: 0.0,
            pending_release: false,
        }
    }

    /// Restart from the beginning of the attack phase
    pub fn note_on(&mut self) {
        self.last_amplitude = 0.0;
        self.release_from = 0.0;
        self.pending_release = false;
        self.change_phase(EnvelopePhase::Attack);
    }

    /// Start the release phase from the current amplitude
    ///
    /// Takes effect in decay or sustain. During attack or hold the release is
    /// latched and begins as soon as the envelope leaves hold.
    pub fn note_off(&mut self) {
        match self.phase {
            EnvelopePhase::Decay | EnvelopePhase::Sustain => self.begin_release(),
            EnvelopePhase::Attack | EnvelopePhase::Hold => self.pending_release = true,
            _ => {}
        }
    }

    /// Fade out quickly regardless of phase or release time
    pub fn force_stop(&mut self) {
        if self.phase == EnvelopePhase::Stopped {
            return;
        }
        self.release_from = self.last_amplitude;
        self.pending_release = false;
        self.change_phase(EnvelopePhase::ForcedStop);
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    /// Amplitude computed by the last `calculate_amplitude` call
    pub fn amplitude(&self) -> f64 {
        self.last_amplitude
    }

    /// False only once the envelope has stopped
    pub fn is_playing(&self) -> bool {
        self.phase != EnvelopePhase::Stopped
    }

    /// Advance by `buffer_size` frames and return the amplitude for that buffer
    pub fn calculate_amplitude(&mut self, buffer_size: usize) -> f64 {
        self.phase_frames += buffer_size as u64;
        let time = self.phase_frames as f64 / self.sample_rate;
        let params = self.params;

        let amplitude = match self.phase {
            EnvelopePhase::Attack => {
                let level = if params.attack_time > 0.0 {
                    time / params.attack_time
                } else {
                    1.0
                };
                if level >= 1.0 {
                    self.change_phase(EnvelopePhase::Hold);
                    1.0
                } else {
                    level
                }
            }
            EnvelopePhase::Hold => {
                if time >= params.hold_time {
                    self.change_phase(EnvelopePhase::Decay);
                }
                1.0
            }
            EnvelopePhase::Decay => {
                if time >= params.decay_time {
                    if params.sustain_level <= 0.0 {
                        self.change_phase(EnvelopePhase::Stopped);
                        0.0
                    } else {
                        self.change_phase(EnvelopePhase::Sustain);
                        params.sustain_level
                    }
                } else {
                    decibel_decay(1.0, self.decay_attenuation(), params.decay_time, time)
                }
            }
            EnvelopePhase::Sustain => params.sustain_level,
            EnvelopePhase::Release => {
                let level = if time >= params.release_time {
                    0.0
                } else {
                    decibel_decay(self.release_from, SILENCE_DECIBEL, params.release_time, time)
                };
                if level <= 0.0 {
                    self.change_phase(EnvelopePhase::Stopped);
                    0.0
                } else {
                    level
                }
            }
            EnvelopePhase::ForcedStop => {
                let level = self.release_from * (1.0 - time / FORCE_STOP_TIME);
                if level <= 0.0 {
                    self.change_phase(EnvelopePhase::Stopped);
                    0.0
                } else {
                    level
                }
            }
            EnvelopePhase::Stopped => 0.0,
        };

        self.last_amplitude = amplitude;

        if self.pending_release
            && matches!(self.phase, EnvelopePhase::Decay | EnvelopePhase::Sustain)
        {
            self.pending_release = false;
            self.begin_release();
        }

        amplitude
    }

    fn begin_release(&mut self) {
        self.release_from = self.last_amplitude;
        self.change_phase(EnvelopePhase::Release);
    }

    fn change_phase(&mut self, phase: EnvelopePhase) {
        self.phase = phase;
        self.phase_frames = 0;
    }

    /// Decibels between full scale and the sustain level
    fn decay_attenuation(&self) -> f64 {
        if self.params.sustain_level <= 0.0 {
            SILENCE_DECIBEL
        } else {
            20.0 * self.params.sustain_level.min(1.0).log10()
        }
    }
}

/// `from * 10^((decibel / duration * elapsed) / 20)`
fn decibel_decay(from: f64, decibel: f64, duration: f64, elapsed: f64) -> f64 {
    from * 10f64.powf(decibel / duration * elapsed / 20.0)
}
