//! Multi-tap feedback delay reverb
//!
//! Eight parallel comb filters fed by a mono sum of the dry mix. The wet
//! signal is identical on both output channels.

/// Comb delay times in milliseconds
pub const DELAY_TIMES_MS: [f64; 8] = [19.0, 29.0, 41.0, 53.0, 67.0, 79.0, 97.0, 113.0];

/// Feedback per line
pub const FEEDBACK: [f32; 8] = [0.70, 0.65, 0.60, 0.55, 0.50, 0.45, 0.40, 0.35];

/// Output gain per line
pub const GAINS: [f32; 8] = [0.80, 0.75, 0.70, 0.65, 0.60, 0.55, 0.50, 0.45];

/// Scale applied to the summed comb outputs
pub const MAKEUP_GAIN: f32 = 0.3;

/// How much of the dry signal the wet level takes away
const DRY_REDUCTION: f64 = 0.7;

/// One circular comb-filter buffer
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    index: usize,
    feedback: f32,
    gain: f32,
}

impl DelayLine {
    /// # Arguments
    /// * `length` - Delay in samples (at least one)
    /// * `feedback` - Amount of the tap written back into the line
    /// * `gain` - Amount of the tap sent to the wet output
    pub fn new(length: usize, feedback: f32, gain: f32) -> Self {
        Self {
            buffer: vec![0.0; length.max(1)],
            index: 0,
            feedback,
            gain,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Feed one input sample, returning the gained tap
    pub fn process(&mut self, input: f32) -> f32 {
        let tap = self.buffer[self.index];
        self.buffer[self.index] = input + self.feedback * tap;
        self.index = (self.index + 1) % self.buffer.len();
        tap * self.gain
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
    }
}

#[derive(Debug, Clone)]
pub struct Reverb {
    lines: Vec<DelayLine>,
    wet_level: f32,
    dry_level: f32,
}

impl Reverb {
    /// Build the delay lines for `sample_rate`, starting fully dry
    pub fn new(sample_rate: u32) -> Self {
        let lines = DELAY_TIMES_MS
            .iter()
            .zip(FEEDBACK.iter().zip(GAINS.iter()))
            .map(|(&ms, (&feedback, &gain))| {
                let length = (ms / 1000.0 * sample_rate as f64).round() as usize;
                DelayLine::new(length, feedback, gain)
            })
            .collect();

        Self {
            lines,
            wet_level: 0.0,
            dry_level: 1.0,
        }
    }

    /// Set the reverb amount, clamped to [0, 1]
    ///
    /// The dry level never drops below 0.3.
    pub fn set_reverb(&mut self, amount: f64) {
        let wet = amount.clamp(0.0, 1.0);
        self.wet_level = wet as f32;
        self.dry_level = (1.0 - wet * DRY_REDUCTION) as f32;
    }

    pub fn wet_level(&self) -> f32 {
        self.wet_level
    }

    pub fn dry_level(&self) -> f32 {
        self.dry_level
    }

    pub fn lines(&self) -> &[DelayLine] {
        &self.lines
    }

    /// Mix the dry buffers with the reverb into the outputs
    ///
    /// Outputs are overwritten. Processes the shortest of the four buffers.
    pub fn process(&mut self, dry_left: &[f32], dry_right: &[f32], out_left: &mut [f32], out_right: &mut [f32]) {
        let frames = dry_left
            .len()
            .min(dry_right.len())
            .min(out_left.len())
            .min(out_right.len());

        for i in 0..frames {
            let input = dry_left[i] + dry_right[i];
            let wet: f32 = self.lines.iter_mut().map(|line| line.process(input)).sum::<f32>() * MAKEUP_GAIN;

            out_left[i] = dry_left[i] * self.dry_level + wet * self.wet_level;
            out_right[i] = dry_right[i] * self.dry_level + wet * self.wet_level;
        }
    }

    /// Silence every delay line
    pub fn clear(&mut self) {
        self.lines.iter_mut().for_each(DelayLine::clear);
    }
}
