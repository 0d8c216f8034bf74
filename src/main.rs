use std::f32::consts::PI;

use tablesynth::generator::{Envelope, EnvelopeParams};
use tablesynth::pipeline::event::controller;
use tablesynth::sample_table::{LoopKind, LoopParams, NoteRange, SampleId, SampleParameter, SampleRange};
use tablesynth::{MidiEvent, SynthEvent, Synthesizer};

const SAMPLE_RATE: u32 = 44100;
const BUFFER_SIZE: usize = 441; // 10ms

/// One second of a 441Hz sine: exactly 100 samples per cycle, loops cleanly
fn sine_sample() -> Vec<f32> {
    (0..SAMPLE_RATE as usize)
        .map(|i| (2.0 * PI * i as f32 / 100.0).sin() * 0.5)
        .collect()
}

fn demo_envelope() {
    println!("\n=== Envelope Demo ===\n");

    let params = EnvelopeParams {
        attack_time: 0.05,
        hold_time: 0.02,
        decay_time: 0.2,
        sustain_level: 0.5,
        release_time: 0.3,
    };
    println!("Configuration: {:?}", params);
    println!();

    let mut envelope = Envelope::new(params, SAMPLE_RATE);
    envelope.note_on();

    println!("{:<8} {:<12} {:<10}", "Buffer", "Phase", "Amplitude");
    println!("{}", "-".repeat(32));

    let mut last_phase = None;
    let mut buffer = 0;
    while envelope.is_playing() {
        if buffer == 50 {
            println!("\n  [note_off at buffer {}]\n", buffer);
            envelope.note_off();
        }
        let amplitude = envelope.calculate_amplitude(BUFFER_SIZE);
        if last_phase != Some(envelope.phase()) || buffer % 10 == 0 {
            println!("{:<8} {:<12} {:<10.4}", buffer, format!("{:?}", envelope.phase()), amplitude);
            last_phase = Some(envelope.phase());
        }
        buffer += 1;
    }

    println!("\nStopped after {} buffers", buffer);
}

fn demo_synth() {
    println!("\n=== Synthesizer Demo ===\n");

    let mut synth = Synthesizer::new(SAMPLE_RATE);
    let parameter = SampleParameter {
        sample_id: SampleId(0),
        pitch: 69.0,
        scale_tuning: 1.0,
        sample_start: 0,
        sample_end: SAMPLE_RATE as usize,
        sample_rate: SAMPLE_RATE,
        looping: LoopParams {
            kind: LoopKind::Continuous,
            start: 0,
            end: SAMPLE_RATE as usize,
        },
        pan: 0.0,
        volume: 1.0,
        exclusive_class: None,
        envelope: EnvelopeParams {
            attack_time: 0.02,
            hold_time: 0.0,
            decay_time: 0.3,
            sustain_level: 0.6,
            release_time: 0.4,
        },
    };

    synth.add_event(SynthEvent::LoadSample {
        data: sine_sample(),
        sample_id: SampleId(0),
    });
    synth.add_event(SynthEvent::SampleParameter {
        parameter,
        range: SampleRange {
            bank: 0,
            instrument: 0,
            key_range: NoteRange::full(),
            vel_range: NoteRange::full(),
        },
    });
    synth.add_event(SynthEvent::ReverbControl {
        amount: 0.3,
        delay_time: 0,
    });

    // C major chord for one second, with a vibrato swell halfway through
    let second = SAMPLE_RATE as u64;
    let mut sequence = 0;
    let mut schedule = |synth: &mut Synthesizer, midi: MidiEvent, delay: u64| {
        synth.add_event(SynthEvent::midi(midi, delay, sequence));
        sequence += 1;
    };
    for key in [60, 64, 67] {
        schedule(
            &mut synth,
            MidiEvent::NoteOn {
                channel: 0,
                key,
                velocity: 100,
            },
            0,
        );
        schedule(
            &mut synth,
            MidiEvent::NoteOff {
                channel: 0,
                key,
                velocity: 0,
            },
            second,
        );
    }
    schedule(
        &mut synth,
        MidiEvent::Controller {
            channel: 0,
            controller: controller::MODULATION,
            value: 127,
        },
        second / 2,
    );

    println!("{:<8} {:<8} {:<10}", "Time", "Voices", "RMS");
    println!("{}", "-".repeat(28));

    let mut left = vec![0.0f32; BUFFER_SIZE];
    let mut right = vec![0.0f32; BUFFER_SIZE];
    let mut block_energy = 0.0f64;
    let mut block_frames = 0usize;

    for buffer in 0..300 {
        synth.process(&mut left, &mut right);
        block_energy += left.iter().chain(&right).map(|&s| (s as f64).powi(2)).sum::<f64>();
        block_frames += left.len() * 2;

        // Report every 100ms
        if (buffer + 1) % 10 == 0 {
            let rms = (block_energy / block_frames as f64).sqrt();
            println!(
                "{:<8} {:<8} {:<10.5}",
                format!("{:.1}s", synth.current_frame() as f64 / SAMPLE_RATE as f64),
                synth.voice_count(),
                rms
            );
            block_energy = 0.0;
            block_frames = 0;
        }
    }
}

fn main() {
    println!("Tablesynth Wavetable Engine");
    println!("===========================");

    demo_envelope();
    demo_synth();

    println!("\n===========================");
    println!("All demos complete!");
}
