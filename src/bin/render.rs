//! Render a JSON event list to a stereo WAV file
//!
//! Usage: render <events.json> <output.wav> [--sample ID=path.wav]...
//!
//! The event file is either a `RenderInput` object
//! (`{"sampleEvents": [...], "events": [...]}`) or a bare array of timed
//! events. WAV files given with `--sample` are loaded as mono sample buffers
//! under the given id before anything else.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use tablesynth::sample_table::SampleId;
use tablesynth::wav::{read_wav_mono, write_wav_stereo};
use tablesynth::{OfflineRenderer, RenderConfig, RenderInput, SynthEvent, TimedEvent};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "render", version, about = "Render a JSON event list to a WAV file")]
struct Cli {
    /// JSON event file
    events: PathBuf,

    /// Output WAV path
    output: PathBuf,

    /// Sample buffer to load, as ID=path.wav (repeatable)
    #[arg(short, long = "sample", value_parser = parse_sample)]
    samples: Vec<(u32, PathBuf)>,

    /// Output sample rate in Hz
    #[arg(long, default_value_t = RenderConfig::default().sample_rate)]
    sample_rate: u32,

    /// Frames per render call
    #[arg(long, default_value_t = RenderConfig::default().buffer_size)]
    buffer_size: usize,

    /// Seconds to keep rendering after the last event
    #[arg(long, default_value_t = RenderConfig::default().silence_timeout)]
    silence_timeout: f64,

    /// Reverb amount (0.0 to 1.0)
    #[arg(long)]
    reverb: Option<f64>,
}

fn parse_sample(value: &str) -> Result<(u32, PathBuf), String> {
    let (id, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected ID=path.wav, got {}", value))?;
    let id = id.parse().map_err(|e| format!("invalid sample id {}: {}", id, e))?;
    Ok((id, PathBuf::from(path)))
}

/// Accept either a full render input or a bare array of events
fn load_input(path: &PathBuf) -> Result<RenderInput, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    match serde_json::from_str::<RenderInput>(&text) {
        Ok(input) => Ok(input),
        Err(_) => {
            let events: Vec<TimedEvent> = serde_json::from_str(&text)?;
            Ok(RenderInput {
                sample_events: Vec::new(),
                events,
            })
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut input = load_input(&cli.events)?;

    let mut loaded = Vec::new();
    for (id, path) in &cli.samples {
        let (data, rate) = read_wav_mono(path)?;
        if rate != cli.sample_rate {
            warn!(id, rate, path = %path.display(), "Sample rate differs from output; set sampleRate in its parameters");
        }
        info!(id, frames = data.len(), path = %path.display(), "Loaded sample");
        loaded.push(TimedEvent::new(
            0,
            SynthEvent::LoadSample {
                data,
                sample_id: SampleId(*id),
            },
        ));
    }
    // Buffers first so the parameters in the event file can resolve them
    loaded.append(&mut input.sample_events);
    input.sample_events = loaded;

    if let Some(amount) = cli.reverb {
        input.sample_events.push(TimedEvent::new(
            0,
            SynthEvent::ReverbControl {
                amount,
                delay_time: 0,
            },
        ));
    }

    let config = RenderConfig {
        sample_rate: cli.sample_rate,
        buffer_size: cli.buffer_size,
        silence_timeout: cli.silence_timeout,
        ..RenderConfig::default()
    };

    let mut renderer = OfflineRenderer::new(config).with_progress(|bytes, total| {
        let percent = if total > 0 { bytes * 100 / total } else { 100 };
        info!(percent = percent.min(100), "Rendering");
    });
    let audio = renderer.render(input)?;

    write_wav_stereo(&cli.output, &audio.left, &audio.right, audio.sample_rate)?;
    println!(
        "Wrote {} ({:.2}s, {} frames)",
        cli.output.display(),
        audio.duration(),
        audio.len()
    );

    Ok(())
}
