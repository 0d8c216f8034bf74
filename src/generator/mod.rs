pub mod envelope;
pub mod lfo;
pub mod oscillator;

pub use envelope::{Envelope, EnvelopeParams, EnvelopePhase};
pub use lfo::Lfo;
pub use oscillator::WavetableOscillator;

/// Represents the current state of a signal generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Generator is still producing samples
    Running,
    /// Generator has completed and will produce no more samples
    Complete,
}

/// Core trait for stereo signal generators
///
/// Generators render one buffer at a time into a pair of output buffers.
pub trait SignalGenerator {
    /// Render the next buffer of samples
    ///
    /// # Arguments
    /// * `left` - Left output buffer. The length determines the buffer size.
    /// * `right` - Right output buffer, same length as `left`
    ///
    /// # Returns
    /// * `GeneratorState::Running` if the generator is still active
    /// * `GeneratorState::Complete` if the generator has finished
    ///
    /// # Note
    /// Output is accumulated: generators add into the buffers and leave
    /// frames they do not produce untouched.
    fn process(&mut self, left: &mut [f32], right: &mut [f32]) -> GeneratorState;

    /// Check if this generator has completed
    fn is_complete(&self) -> bool;
}
