//! Real-time polyphonic wavetable synthesizer engine
//!
//! Consumes timestamped MIDI-like events plus sample data and renders
//! interleaved-ready stereo `f32` audio one buffer at a time:
//! - `sample_table`: decoded sample buffers and per-key synthesis parameters
//! - `generator`: envelope, LFO and the wavetable oscillator (one voice)
//! - `pipeline`: channel state, synth core, event scheduling and dispatch
//! - `reverb`: multi-tap feedback delay network applied to the dry mix
//! - `render`: offline driver that renders a whole event list to a buffer

pub mod error;
pub mod generator;
pub mod pipeline;
pub mod render;
pub mod reverb;
pub mod sample_table;
pub mod wav;

pub use error::{Result, SynthError};
pub use pipeline::{EventSender, MidiEvent, SynthEvent, Synthesizer};
pub use render::{OfflineRenderer, RenderConfig, RenderInput, RenderedAudio, TimedEvent};
