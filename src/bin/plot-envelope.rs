use clap::Parser;
use plotters::prelude::*;
use tablesynth::generator::{Envelope, EnvelopeParams, EnvelopePhase};

const SAMPLE_RATE: u32 = 1000; // 1ms = 1 sample
const MAX_DURATION_MS: usize = 100_000;

/// Plot a voice amplitude envelope to SVG
#[derive(Parser)]
#[command(name = "plot-envelope")]
struct Args {
    /// Attack time in milliseconds
    attack_ms: f64,
    /// Hold time in milliseconds
    hold_ms: f64,
    /// Decay time in milliseconds
    decay_ms: f64,
    /// Sustain level (0.0 to 1.0)
    sustain_level: f64,
    /// Release time in milliseconds
    release_ms: f64,
    /// Time of the note-off in milliseconds
    note_off_ms: f64,
    /// Output SVG path
    output_path: String,
}

impl Args {
    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        let times = [self.attack_ms, self.hold_ms, self.decay_ms, self.release_ms, self.note_off_ms];
        if times.iter().any(|&t| t < 0.0) {
            return Err("Time values must be non-negative".into());
        }
        if !(0.0..=1.0).contains(&self.sustain_level) {
            return Err("Sustain level must be between 0.0 and 1.0".into());
        }
        Ok(())
    }

    fn params(&self) -> EnvelopeParams {
        EnvelopeParams {
            attack_time: self.attack_ms / 1000.0,
            hold_time: self.hold_ms / 1000.0,
            decay_time: self.decay_ms / 1000.0,
            sustain_level: self.sustain_level,
            release_time: self.release_ms / 1000.0,
        }
    }
}

/// Run the envelope one millisecond at a time until it stops
fn trace_envelope(args: &Args) -> Result<(Vec<f64>, Vec<EnvelopePhase>), Box<dyn std::error::Error>> {
    let mut envelope = Envelope::new(args.params(), SAMPLE_RATE);
    envelope.note_on();

    let note_off_at = args.note_off_ms as usize;
    let mut amplitudes = Vec::new();
    let mut phases = Vec::new();

    for ms in 0.. {
        if ms == note_off_at {
            envelope.note_off();
        }
        amplitudes.push(envelope.calculate_amplitude(1));
        phases.push(envelope.phase());

        if !envelope.is_playing() {
            break;
        }
        if ms > MAX_DURATION_MS {
            return Err("Envelope exceeded maximum duration".into());
        }
    }

    Ok((amplitudes, phases))
}

fn create_plot(args: &Args, amplitudes: &[f64], phases: &[EnvelopePhase]) -> Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::new(&args.output_path, (800, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_time = amplitudes.len().saturating_sub(1).max(1) as f64;
    let title = format!(
        "Envelope: A={}ms, H={}ms, D={}ms, S={:.2}, R={}ms, note_off={}ms",
        args.attack_ms, args.hold_ms, args.decay_ms, args.sustain_level, args.release_ms, args.note_off_ms
    );

    let mut chart = ChartBuilder::on(&root)
        .caption(&title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..max_time, 0f64..1.1f64)?;

    chart
        .configure_mesh()
        .x_desc("Time (ms)")
        .y_desc("Amplitude")
        .x_labels(10)
        .y_labels(10)
        .draw()?;

    chart.draw_series(LineSeries::new(
        amplitudes.iter().enumerate().map(|(ms, &a)| (ms as f64, a)),
        BLUE.stroke_width(2),
    ))?;

    // Phase transitions
    for (ms, pair) in phases.windows(2).enumerate() {
        if pair[0] != pair[1] {
            chart.draw_series(std::iter::once(plotters::element::Cross::new(
                ((ms + 1) as f64, amplitudes[ms + 1]),
                8,
                BLACK.filled(),
            )))?;
        }
    }

    // Note-off marker
    let note_off = (args.note_off_ms as usize).min(amplitudes.len().saturating_sub(1));
    chart.draw_series(std::iter::once(plotters::element::Circle::new(
        (note_off as f64, amplitudes.get(note_off).copied().unwrap_or(0.0)),
        5,
        RED.filled(),
    )))?;

    root.present()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    args.validate()?;

    println!("Envelope Plot Generator");
    println!("=======================");
    println!("  Attack: {}ms", args.attack_ms);
    println!("  Hold: {}ms", args.hold_ms);
    println!("  Decay: {}ms", args.decay_ms);
    println!("  Sustain: {:.2}", args.sustain_level);
    println!("  Release: {}ms", args.release_ms);
    println!("  Note Off: {}ms", args.note_off_ms);
    println!();

    print!("  Tracing envelope... ");
    let (amplitudes, phases) = trace_envelope(&args)?;
    println!("done ({}ms)", amplitudes.len());

    let mut last = None;
    for (ms, phase) in phases.iter().enumerate() {
        if last != Some(*phase) {
            println!("  {:>6}ms {:?}", ms, phase);
            last = Some(*phase);
        }
    }

    print!("  Creating plot... ");
    create_plot(&args, &amplitudes, &phases)?;
    println!("done");

    println!();
    println!("Output: {}", args.output_path);

    Ok(())
}
