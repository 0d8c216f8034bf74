//! Offline renderer
//!
//! Drives a `Synthesizer` buffer by buffer outside of a real-time callback
//! and collects the whole piece into memory. Rendering continues past the
//! last event until a buffer of exact silence or the silence timeout, then
//! trailing silence is trimmed.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SynthError};
use crate::pipeline::event::SynthEvent;
use crate::pipeline::synth::Synthesizer;

/// Bytes per rendered frame as reported to progress callbacks (stereo f32)
pub const BYTES_PER_FRAME: u64 = 2 * 4;

/// Configuration for offline rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Frames rendered per `process` call
    pub buffer_size: usize,
    /// Seconds to keep rendering after the last event
    pub silence_timeout: f64,
    /// Buffers between progress reports and yields
    pub progress_interval: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            buffer_size: 500,
            silence_timeout: 5.0,
            progress_interval: 100,
        }
    }
}

/// An event with its delay from the start of the render, in frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub delay: u64,
    pub event: SynthEvent,
}

impl TimedEvent {
    pub fn new(delay: u64, event: SynthEvent) -> Self {
        Self { delay, event }
    }
}

/// Everything needed for one render
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderInput {
    /// Sample buffers and parameters, submitted before anything else
    pub sample_events: Vec<TimedEvent>,
    /// Musical events in any order
    pub events: Vec<TimedEvent>,
}

/// Rendered stereo audio
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedAudio {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
}

impl RenderedAudio {
    /// Length in frames
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Length in seconds
    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sample_rate.max(1) as f64
    }

    /// Drop trailing frames that are exactly zero on both channels
    fn trim_silence(&mut self) {
        let end = self
            .left
            .iter()
            .zip(&self.right)
            .rposition(|(&l, &r)| l != 0.0 || r != 0.0)
            .map_or(0, |i| i + 1);
        self.left.truncate(end);
        self.right.truncate(end);
    }
}

type CancelFn = Box<dyn Fn() -> bool>;
type YieldFn = Box<dyn FnMut()>;
type ProgressFn = Box<dyn FnMut(u64, u64)>;

/// Renders a complete event list to memory
///
/// The optional hooks never change the rendered samples, only whether the
/// render stops early.
pub struct OfflineRenderer {
    config: RenderConfig,
    cancel: Option<CancelFn>,
    yield_now: Option<YieldFn>,
    progress: Option<ProgressFn>,
}

impl OfflineRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            cancel: None,
            yield_now: None,
            progress: None,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Predicate polled before every buffer; returning true aborts the render
    pub fn with_cancel(mut self, cancel: impl Fn() -> bool + 'static) -> Self {
        self.cancel = Some(Box::new(cancel));
        self
    }

    /// Hook called every `progress_interval` buffers so a host loop can run
    pub fn with_yield(mut self, yield_now: impl FnMut() + 'static) -> Self {
        self.yield_now = Some(Box::new(yield_now));
        self
    }

    /// Callback receiving `(bytes_rendered, total_bytes)` every
    /// `progress_interval` buffers
    pub fn with_progress(mut self, progress: impl FnMut(u64, u64) + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Render `input` to a trimmed stereo buffer
    ///
    /// # Errors
    /// `SynthError::Cancelled` when the cancel predicate fires. No audio is
    /// returned in that case.
    pub fn render(&mut self, input: RenderInput) -> Result<RenderedAudio> {
        let sample_rate = self.config.sample_rate;
        let buffer_size = self.config.buffer_size.max(1);
        info!(
            sample_rate,
            buffer_size,
            events = input.events.len(),
            samples = input.sample_events.len(),
            "Starting offline render"
        );

        let mut synth = Synthesizer::new(sample_rate);
        for timed in input.sample_events {
            synth.add_event(timed.event);
        }

        let mut events = input.events;
        events.sort_by_key(|timed| timed.delay);
        let last_frame = events.last().map_or(0, |timed| timed.delay);
        for (sequence_number, timed) in events.into_iter().enumerate() {
            synth.add_event(with_delay(timed.event, timed.delay, sequence_number as u64));
        }

        let timeout_frames = (self.config.silence_timeout.max(0.0) * sample_rate as f64) as u64;
        let total_frames = last_frame.saturating_add(timeout_frames);
        let total_bytes = total_frames.saturating_mul(BYTES_PER_FRAME);

        let mut audio = RenderedAudio {
            left: Vec::new(),
            right: Vec::new(),
            sample_rate,
        };
        let mut left = vec![0.0f32; buffer_size];
        let mut right = vec![0.0f32; buffer_size];
        let mut buffers: u64 = 0;

        loop {
            if self.cancel.as_ref().is_some_and(|cancel| cancel()) {
                info!(frames = synth.current_frame(), "Offline render cancelled");
                return Err(SynthError::Cancelled);
            }

            let start = synth.current_frame();
            synth.process(&mut left, &mut right);
            audio.left.extend_from_slice(&left);
            audio.right.extend_from_slice(&right);
            buffers += 1;

            let rendered = synth.current_frame();
            if self.config.progress_interval > 0 && buffers % self.config.progress_interval == 0 {
                if let Some(progress) = self.progress.as_mut() {
                    progress(rendered.saturating_mul(BYTES_PER_FRAME), total_bytes);
                }
                if let Some(yield_now) = self.yield_now.as_mut() {
                    yield_now();
                }
            }

            // Every event has been dispatched once a buffer starts at or after the last one
            if start >= last_frame {
                let silent = left.iter().chain(&right).all(|&s| s == 0.0);
                if silent || rendered >= total_frames {
                    break;
                }
            }
        }

        audio.trim_silence();
        info!(
            frames = audio.len(),
            seconds = audio.duration(),
            buffers,
            "Finished offline render"
        );
        Ok(audio)
    }
}

/// Attach the render-relative delay and sequence number to a musical event
fn with_delay(event: SynthEvent, delay: u64, sequence_number: u64) -> SynthEvent {
    match event {
        SynthEvent::Midi { midi, .. } => SynthEvent::midi(midi, delay, sequence_number),
        SynthEvent::ReverbControl { amount, .. } => SynthEvent::ReverbControl {
            amount,
            delay_time: delay,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::EnvelopeParams;
    use crate::pipeline::event::MidiEvent;
    use crate::sample_table::tests::test_parameter;
    use crate::sample_table::{LoopKind, LoopParams, NoteRange, SampleId, SampleRange};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    const RATE: u32 = 1000;

    fn config(silence_timeout: f64) -> RenderConfig {
        RenderConfig {
            sample_rate: RATE,
            buffer_size: 10,
            silence_timeout,
            progress_interval: 2,
        }
    }

    /// Looping constant sample with a 50ms release
    fn sample_events() -> Vec<TimedEvent> {
        let mut parameter = test_parameter(1);
        parameter.sample_end = 100;
        parameter.sample_rate = RATE;
        parameter.looping = LoopParams {
            kind: LoopKind::Continuous,
            start: 0,
            end: 100,
        };
        parameter.envelope = EnvelopeParams {
            release_time: 0.05,
            ..EnvelopeParams::default()
        };

        vec![
            TimedEvent::new(
                0,
                SynthEvent::LoadSample {
                    data: vec![0.5; 100],
                    sample_id: SampleId(1),
                },
            ),
            TimedEvent::new(
                0,
                SynthEvent::SampleParameter {
                    parameter,
                    range: SampleRange {
                        bank: 0,
                        instrument: 0,
                        key_range: NoteRange::full(),
                        vel_range: NoteRange::full(),
                    },
                },
            ),
        ]
    }

    fn midi(delay: u64, midi: MidiEvent) -> TimedEvent {
        TimedEvent::new(
            delay,
            SynthEvent::Midi {
                midi,
                delay_time: None,
                sequence_number: 0,
            },
        )
    }

    fn note_on(delay: u64) -> TimedEvent {
        midi(
            delay,
            MidiEvent::NoteOn {
                channel: 0,
                key: 60,
                velocity: 100,
            },
        )
    }

    fn note_off(delay: u64) -> TimedEvent {
        midi(
            delay,
            MidiEvent::NoteOff {
                channel: 0,
                key: 60,
                velocity: 0,
            },
        )
    }

    #[test]
    fn test_default_config() {
        let config = RenderConfig::default();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.buffer_size, 500);
        assert_eq!(config.silence_timeout, 5.0);

        // Partial JSON falls back to defaults
        let config: RenderConfig = serde_json::from_str(r#"{ "bufferSize": 128 }"#).unwrap();
        assert_eq!(config.buffer_size, 128);
        assert_eq!(config.sample_rate, 44100);
    }

    #[test]
    fn test_render_stops_on_silence() {
        let _ = tracing_subscriber::fmt::try_init();
        let input = RenderInput {
            sample_events: sample_events(),
            // Out of order on purpose
            events: vec![note_off(100), note_on(0)],
        };

        let audio = OfflineRenderer::new(config(5.0)).render(input).unwrap();

        // Release starts at frame 100 and reaches zero in the buffer at 140
        assert_eq!(audio.len(), 140);
        assert_eq!(audio.right.len(), 140);
        assert_eq!(audio.sample_rate, RATE);
        assert!(audio.left.iter().all(|&s| s > 0.0));
    }

    #[test]
    fn test_render_stops_at_timeout() {
        let input = RenderInput {
            sample_events: sample_events(),
            // Never released
            events: vec![note_on(0)],
        };

        let audio = OfflineRenderer::new(config(0.1)).render(input).unwrap();
        assert_eq!(audio.len(), 100);
        assert!(audio.left.iter().all(|&s| s > 0.0));
    }

    #[test]
    fn test_render_waits_for_last_event() {
        let input = RenderInput {
            sample_events: sample_events(),
            events: vec![note_on(300), note_off(310)],
        };

        let audio = OfflineRenderer::new(config(5.0)).render(input).unwrap();
        // Leading silence is kept, the note starts at frame 300
        assert!(audio.len() > 300);
        assert!(audio.left[..300].iter().all(|&s| s == 0.0));
        assert!(audio.left[300] > 0.0);
    }

    #[test]
    fn test_empty_render() {
        let audio = OfflineRenderer::new(config(5.0))
            .render(RenderInput::default())
            .unwrap();
        assert!(audio.is_empty());
        assert_eq!(audio.duration(), 0.0);
    }

    #[test]
    fn test_huge_timeout_stops_on_silence() {
        let input = RenderInput {
            sample_events: sample_events(),
            events: vec![note_on(0), note_off(100)],
        };

        let audio = OfflineRenderer::new(config(1e30)).render(input).unwrap();
        assert_eq!(audio.len(), 140);
    }

    #[test]
    fn test_cancel() {
        let polls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&polls);
        let mut renderer = OfflineRenderer::new(config(5.0)).with_cancel(move || {
            counter.set(counter.get() + 1);
            counter.get() > 3
        });

        let input = RenderInput {
            sample_events: sample_events(),
            events: vec![note_on(0)],
        };
        let result = renderer.render(input);
        assert!(matches!(result, Err(SynthError::Cancelled)));
        assert_eq!(polls.get(), 4);
    }

    #[test]
    fn test_progress_and_yield() {
        let reports = Rc::new(RefCell::new(Vec::new()));
        let yields = Rc::new(Cell::new(0));
        let report_sink = Rc::clone(&reports);
        let yield_count = Rc::clone(&yields);

        let mut renderer = OfflineRenderer::new(config(0.1))
            .with_progress(move |bytes, total| report_sink.borrow_mut().push((bytes, total)))
            .with_yield(move || yield_count.set(yield_count.get() + 1));

        let input = RenderInput {
            sample_events: sample_events(),
            events: vec![note_on(0)],
        };
        renderer.render(input).unwrap();

        // 10 buffers of 10 frames, reported every second buffer
        let expected: Vec<(u64, u64)> = (1..=5).map(|i| (i * 20 * BYTES_PER_FRAME, 800)).collect();
        assert_eq!(*reports.borrow(), expected);
        assert_eq!(yields.get(), 5);
    }

    #[test]
    fn test_hooks_do_not_change_output() {
        let input = RenderInput {
            sample_events: sample_events(),
            events: vec![note_on(0), note_off(50)],
        };
        let plain = OfflineRenderer::new(config(5.0)).render(input.clone()).unwrap();
        let hooked = OfflineRenderer::new(config(5.0))
            .with_cancel(|| false)
            .with_progress(|_, _| {})
            .with_yield(|| {})
            .render(input)
            .unwrap();
        assert_eq!(plain, hooked);
    }
}
