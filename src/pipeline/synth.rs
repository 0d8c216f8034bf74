//! Synthesizer facade
//!
//! Ties the scheduler, event handler and synth core into the single
//! `process` entry point called once per audio buffer. Events from other
//! threads go through an `EventSender` and are drained at the top of
//! `process`, so the scheduler queues are only ever touched by the render
//! thread.

use crossbeam_channel::{Receiver, Sender};

use crate::error::{Result, SynthError};
use crate::pipeline::event::SynthEvent;
use crate::pipeline::handler::EventHandler;
use crate::pipeline::processor::SynthCore;
use crate::pipeline::scheduler::Dispatch;

/// Cloneable handle for submitting events from another thread
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: Sender<SynthEvent>,
}

impl EventSender {
    /// Queue an event; it is scheduled at the start of the next `process`
    pub fn send(&self, event: SynthEvent) -> Result<()> {
        self.sender.send(event).map_err(|_| SynthError::Disconnected)
    }
}

pub struct Synthesizer {
    core: SynthCore,
    handler: EventHandler,
    sender: Sender<SynthEvent>,
    receiver: Receiver<SynthEvent>,
}

impl Synthesizer {
    /// # Arguments
    /// * `sample_rate` - Output sample rate in Hz
    pub fn new(sample_rate: u32) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            core: SynthCore::new(sample_rate),
            handler: EventHandler::new(),
            sender,
            receiver,
        }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    pub fn core(&self) -> &SynthCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut SynthCore {
        &mut self.core
    }

    pub fn handler_mut(&mut self) -> &mut EventHandler {
        &mut self.handler
    }

    pub fn sample_rate(&self) -> u32 {
        self.core.sample_rate()
    }

    pub fn current_frame(&self) -> u64 {
        self.core.scheduler().current_frame()
    }

    pub fn voice_count(&self) -> usize {
        self.core.voice_count()
    }

    /// Handle an event now or schedule it by its delay
    pub fn add_event(&mut self, event: SynthEvent) {
        if let Dispatch::Immediate(event) = self.core.scheduler_mut().add_event(event) {
            self.handler.handle_immediate(event, &mut self.core);
        }
    }

    /// Dispatch every event due at the current frame
    ///
    /// Reverb changes go first, then channel events in (frame, sequence)
    /// order. An all-sounds-off dispatched here also drops the rest of the
    /// batch for its channel.
    pub fn process_scheduled_events(&mut self) {
        self.core.scheduler_mut().process_scheduled_events();
        while let Some(amount) = self.core.scheduler_mut().next_reverb_event() {
            self.core.set_reverb(amount);
        }
        while let Some(event) = self.core.scheduler_mut().next_event() {
            self.handler.handle_midi(event, &mut self.core);
        }
    }

    /// Render one buffer into `left` and `right`, overwriting them
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        while let Ok(event) = self.receiver.try_recv() {
            self.add_event(event);
        }

        self.process_scheduled_events();
        self.core.render(left, right);

        let frames = left.len().min(right.len());
        self.core.scheduler_mut().advance(frames);
    }
}
