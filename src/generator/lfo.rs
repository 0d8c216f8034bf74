use std::f64::consts::PI;

/// Frequency a voice's vibrato LFO is reset to on every note-on, in Hz
pub const DEFAULT_LFO_FREQUENCY: f64 = 5.0;

/// Sinusoidal low-frequency oscillator
///
/// Advances once per rendered buffer. The value returned for a buffer is the
/// sine of the phase at the start of that buffer.
#[derive(Debug, Clone)]
pub struct Lfo {
    frequency: f64,
    sample_rate: f64,
    phase: f64,
}

impl Lfo {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frequency: DEFAULT_LFO_FREQUENCY,
            sample_rate: sample_rate.max(1) as f64,
            phase: 0.0,
        }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
    }

    /// Back to phase zero at the default frequency
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.frequency = DEFAULT_LFO_FREQUENCY;
    }

    /// Return `sin(phase)` and advance by `buffer_size` frames
    pub fn calculate_value(&mut self, buffer_size: usize) -> f64 {
        let value = self.phase.sin();
        self.phase += 2.0 * PI * self.frequency / self.sample_rate * buffer_size as f64;
        self.phase %= 2.0 * PI;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_starts_at_zero() {
        let mut lfo = Lfo::new(1000);
        assert_eq!(lfo.calculate_value(10), 0.0);
    }

    #[test]
    fn test_quarter_cycle_steps() {
        // 5Hz at 1kHz: 50 frames is a quarter cycle
        let mut lfo = Lfo::new(1000);
        assert_abs_diff_eq!(lfo.calculate_value(50), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(lfo.calculate_value(50), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(lfo.calculate_value(50), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(lfo.calculate_value(50), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reset_restores_default() {
        let mut lfo = Lfo::new(1000);
        lfo.set_frequency(12.0);
        lfo.calculate_value(33);
        lfo.reset();
        assert_eq!(lfo.frequency(), DEFAULT_LFO_FREQUENCY);
        assert_eq!(lfo.calculate_value(10), 0.0);
    }
}
