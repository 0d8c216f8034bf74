//! Frame-accurate event scheduler
//!
//! Holds delayed events until the render frame counter reaches their
//! scheduled frame. Channel events and reverb changes live in separate queues
//! so cancelling a channel never touches reverb automation.

use std::collections::VecDeque;

use crate::pipeline::event::{MidiEvent, SynthEvent};

/// An event waiting for its frame
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent<T> {
    pub event: T,
    /// Absolute frame at which the event becomes due
    pub scheduled_frame: u64,
    /// Submission order, breaks ties between events due on the same frame
    pub sequence_number: u64,
}

/// What `add_event` did with an event
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The event has no delay and must be handled now
    Immediate(SynthEvent),
    /// The event was queued
    Scheduled,
}

/// Time-ordered queues of delayed events
#[derive(Debug, Default)]
pub struct EventScheduler {
    current_frame: u64,
    /// Sorted by scheduled frame, submission order within a frame
    events: Vec<ScheduledEvent<MidiEvent>>,
    reverb_events: Vec<ScheduledEvent<f64>>,
    /// Due events popped from the queues but not yet dispatched
    due_events: VecDeque<ScheduledEvent<MidiEvent>>,
    due_reverb: VecDeque<ScheduledEvent<f64>>,
    reverb_sequence: u64,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame counter the scheduler compares deadlines against
    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// Advance the frame counter after a buffer has been rendered
    pub fn advance(&mut self, frames: usize) {
        self.current_frame += frames as u64;
    }

    /// Number of events still waiting, dispatch batches included
    pub fn pending_count(&self) -> usize {
        self.events.len() + self.reverb_events.len() + self.due_events.len() + self.due_reverb.len()
    }

    /// Queue a delayed event or hand it back for immediate dispatch
    ///
    /// Sample loading, sample parameters, zero-delay reverb changes and MIDI
    /// events without a delay are immediate. Everything else is scheduled at
    /// `current_frame + delay`, saturating at `u64::MAX`.
    pub fn add_event(&mut self, event: SynthEvent) -> Dispatch {
        match event {
            SynthEvent::ReverbControl { amount, delay_time } if delay_time > 0 => {
                let scheduled = ScheduledEvent {
                    event: amount,
                    scheduled_frame: self.current_frame.saturating_add(delay_time),
                    sequence_number: self.reverb_sequence,
                };
                self.reverb_sequence += 1;
                insert_sorted(&mut self.reverb_events, scheduled);
                Dispatch::Scheduled
            }
            SynthEvent::Midi {
                midi,
                delay_time: Some(delay),
                sequence_number,
            } => {
                let scheduled = ScheduledEvent {
                    event: midi,
                    scheduled_frame: self.current_frame.saturating_add(delay),
                    sequence_number,
                };
                insert_sorted(&mut self.events, scheduled);
                Dispatch::Scheduled
            }
            other => Dispatch::Immediate(other),
        }
    }

    /// Move every event due at the current frame into the dispatch batches
    ///
    /// Reverb changes come out of `next_reverb_event` in frame order. Channel
    /// events are re-sorted by (frame, sequence number) so events from
    /// different delayed sources landing on the same frame keep their
    /// submission order, then come out of `next_event`.
    pub fn process_scheduled_events(&mut self) {
        let frame = self.current_frame;

        let due = self.reverb_events.partition_point(|e| e.scheduled_frame <= frame);
        self.due_reverb.extend(self.reverb_events.drain(..due));

        let due = self.events.partition_point(|e| e.scheduled_frame <= frame);
        if due > 0 {
            self.due_events.extend(self.events.drain(..due));
            self.due_events
                .make_contiguous()
                .sort_by_key(|e| (e.scheduled_frame, e.sequence_number));
        }
    }

    /// Next due reverb amount
    pub fn next_reverb_event(&mut self) -> Option<f64> {
        self.due_reverb.pop_front().map(|e| e.event)
    }

    /// Next due channel event
    pub fn next_event(&mut self) -> Option<MidiEvent> {
        self.due_events.pop_front().map(|e| e.event)
    }

    /// Drop every pending or due-but-undispatched event for `channel`
    ///
    /// Reverb changes are never affected.
    pub fn remove_scheduled_events(&mut self, channel: u8) {
        self.events.retain(|e| e.event.channel() != Some(channel));
        self.due_events.retain(|e| e.event.channel() != Some(channel));
    }
}

/// Binary-search insertion after every event with the same or earlier frame
fn insert_sorted<T>(queue: &mut Vec<ScheduledEvent<T>>, event: ScheduledEvent<T>) {
    let index = queue.partition_point(|e| e.scheduled_frame <= event.scheduled_frame);
    queue.insert(index, event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::event::MetaEvent;

    fn note_on(channel: u8, key: u8) -> MidiEvent {
        MidiEvent::NoteOn {
            channel,
            key,
            velocity: 100,
        }
    }

    fn drain(scheduler: &mut EventScheduler) -> Vec<MidiEvent> {
        scheduler.process_scheduled_events();
        std::iter::from_fn(|| scheduler.next_event()).collect()
    }

    #[test]
    fn test_immediate_events() {
        let mut scheduler = EventScheduler::new();

        let load = SynthEvent::LoadSample {
            data: vec![0.0],
            sample_id: crate::sample_table::SampleId(0),
        };
        assert_eq!(scheduler.add_event(load.clone()), Dispatch::Immediate(load));

        let reverb = SynthEvent::ReverbControl {
            amount: 0.5,
            delay_time: 0,
        };
        assert_eq!(scheduler.add_event(reverb.clone()), Dispatch::Immediate(reverb));

        let undelayed = SynthEvent::Midi {
            midi: note_on(0, 60),
            delay_time: None,
            sequence_number: 0,
        };
        assert_eq!(scheduler.add_event(undelayed.clone()), Dispatch::Immediate(undelayed));

        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_zero_delay_midi_is_scheduled_for_current_frame() {
        let mut scheduler = EventScheduler::new();
        scheduler.advance(128);
        let dispatch = scheduler.add_event(SynthEvent::midi(note_on(0, 60), 0, 0));
        assert_eq!(dispatch, Dispatch::Scheduled);
        assert_eq!(drain(&mut scheduler), vec![note_on(0, 60)]);
    }

    #[test]
    fn test_events_wait_for_their_frame() {
        let mut scheduler = EventScheduler::new();
        scheduler.add_event(SynthEvent::midi(note_on(0, 60), 100, 0));

        assert!(drain(&mut scheduler).is_empty());
        scheduler.advance(64);
        assert!(drain(&mut scheduler).is_empty());
        scheduler.advance(64);
        // frame 128 >= 100
        assert_eq!(drain(&mut scheduler), vec![note_on(0, 60)]);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_huge_delay_saturates() {
        let mut scheduler = EventScheduler::new();
        scheduler.advance(10);
        scheduler.add_event(SynthEvent::midi(note_on(0, 60), u64::MAX, 0));
        scheduler.add_event(SynthEvent::ReverbControl {
            amount: 0.5,
            delay_time: u64::MAX,
        });
        assert_eq!(scheduler.pending_count(), 2);

        scheduler.advance(1000);
        assert!(drain(&mut scheduler).is_empty());
        assert_eq!(scheduler.next_reverb_event(), None);
    }

    #[test]
    fn test_delay_order_beats_submission_order() {
        let mut scheduler = EventScheduler::new();
        scheduler.add_event(SynthEvent::midi(note_on(0, 62), 50, 0));
        scheduler.add_event(SynthEvent::midi(note_on(0, 61), 20, 1));
        scheduler.add_event(SynthEvent::midi(note_on(0, 60), 10, 2));

        scheduler.advance(100);
        assert_eq!(
            drain(&mut scheduler),
            vec![note_on(0, 60), note_on(0, 61), note_on(0, 62)]
        );
    }

    #[test]
    fn test_same_frame_uses_sequence_number() {
        let mut scheduler = EventScheduler::new();
        // Same target frame from two different base frames, submitted out of sequence
        scheduler.add_event(SynthEvent::midi(note_on(0, 61), 20, 5));
        scheduler.advance(10);
        scheduler.add_event(SynthEvent::midi(note_on(0, 60), 10, 2));
        scheduler.add_event(SynthEvent::midi(note_on(0, 62), 10, 9));

        scheduler.advance(10);
        assert_eq!(
            drain(&mut scheduler),
            vec![note_on(0, 60), note_on(0, 61), note_on(0, 62)]
        );
    }

    #[test]
    fn test_remove_scheduled_events_by_channel() {
        let mut scheduler = EventScheduler::new();
        scheduler.add_event(SynthEvent::midi(note_on(0, 60), 10, 0));
        scheduler.add_event(SynthEvent::midi(note_on(1, 60), 10, 1));
        scheduler.add_event(SynthEvent::midi(note_on(0, 62), 500, 2));
        scheduler.add_event(SynthEvent::midi(
            MidiEvent::Meta {
                meta: MetaEvent::EndOfTrack,
            },
            10,
            3,
        ));
        scheduler.add_event(SynthEvent::ReverbControl {
            amount: 0.3,
            delay_time: 10,
        });

        scheduler.remove_scheduled_events(0);
        // channel 1, meta and reverb survive
        assert_eq!(scheduler.pending_count(), 3);

        scheduler.advance(1000);
        scheduler.process_scheduled_events();
        assert_eq!(scheduler.next_reverb_event(), Some(0.3));
        assert_eq!(scheduler.next_event(), Some(note_on(1, 60)));
        assert!(matches!(scheduler.next_event(), Some(MidiEvent::Meta { .. })));
        assert_eq!(scheduler.next_event(), None);
    }

    #[test]
    fn test_remove_purges_due_batch() {
        let mut scheduler = EventScheduler::new();
        scheduler.add_event(SynthEvent::midi(note_on(3, 60), 0, 0));
        scheduler.add_event(SynthEvent::midi(note_on(3, 61), 0, 1));
        scheduler.add_event(SynthEvent::midi(note_on(4, 61), 0, 2));
        scheduler.process_scheduled_events();

        // First event dispatched, then the channel is cancelled mid-batch
        assert_eq!(scheduler.next_event(), Some(note_on(3, 60)));
        scheduler.remove_scheduled_events(3);
        assert_eq!(scheduler.next_event(), Some(note_on(4, 61)));
        assert_eq!(scheduler.next_event(), None);
    }

    #[test]
    fn test_reverb_queue_ordering() {
        let mut scheduler = EventScheduler::new();
        scheduler.add_event(SynthEvent::ReverbControl {
            amount: 0.9,
            delay_time: 30,
        });
        scheduler.add_event(SynthEvent::ReverbControl {
            amount: 0.1,
            delay_time: 10,
        });

        scheduler.advance(20);
        scheduler.process_scheduled_events();
        assert_eq!(scheduler.next_reverb_event(), Some(0.1));
        assert_eq!(scheduler.next_reverb_event(), None);

        scheduler.advance(20);
        scheduler.process_scheduled_events();
        assert_eq!(scheduler.next_reverb_event(), Some(0.9));
    }
}
