//! Event-driven synthesis pipeline
//!
//! - Event: serde event model submitted by hosts
//! - Scheduler: frame-accurate queues for delayed events
//! - Handler: translates events and controller sequences into core operations
//! - Channel / Processor: per-channel state, voices and the render loop
//! - Synth: the `process` entry point tying the pieces together

pub mod channel;
pub mod event;
pub mod handler;
pub mod processor;
pub mod scheduler;
pub mod synth;

pub use channel::ChannelState;
pub use event::{MetaEvent, MidiEvent, SynthEvent};
pub use handler::EventHandler;
pub use processor::SynthCore;
pub use scheduler::{Dispatch, EventScheduler, ScheduledEvent};
pub use synth::{EventSender, Synthesizer};
