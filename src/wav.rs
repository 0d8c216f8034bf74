//! WAV file helpers
//!
//! Writes rendered stereo audio as 16-bit PCM and loads sample buffers as
//! mono `f32` for the sample table.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{Result, SynthError};

/// Convert a float sample to 16-bit, clamping to [-1.0, 1.0]
///
/// -1.0 maps to `i16::MIN` and 1.0 to `i16::MAX`.
pub fn to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped >= 0.0 {
        (clamped * i16::MAX as f32) as i16
    } else {
        (clamped * -(i16::MIN as f32)) as i16
    }
}

/// Write a 16-bit PCM stereo WAV file
///
/// # Arguments
/// * `path` - Output file path
/// * `left` - Left channel samples (f32, range [-1.0, 1.0])
/// * `right` - Right channel samples; the shorter channel sets the length
/// * `sample_rate` - Sample rate in Hz (only for header)
pub fn write_wav_stereo(path: impl AsRef<Path>, left: &[f32], right: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for (&l, &r) in left.iter().zip(right) {
        writer.write_sample(to_i16(l))?;
        writer.write_sample(to_i16(r))?;
    }
    writer.finalize()?;
    Ok(())
}

/// Read a WAV file as mono `f32`, averaging channels
///
/// Integer formats are scaled to [-1.0, 1.0). Returns the samples and the
/// file's sample rate.
pub fn read_wav_mono(path: impl AsRef<Path>) -> Result<(Vec<f32>, u32)> {
    let path = path.as_ref();
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    if interleaved.is_empty() {
        return Err(SynthError::EmptySample(path.display().to_string()));
    }

    let mono = interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_to_i16_full_scale() {
        assert_eq!(to_i16(1.0), i16::MAX);
        assert_eq!(to_i16(-1.0), i16::MIN);
        assert_eq!(to_i16(0.0), 0);
        // Values outside [-1.0, 1.0] are clamped
        assert_eq!(to_i16(2.0), i16::MAX);
        assert_eq!(to_i16(-1.5), i16::MIN);
    }

    #[test]
    fn test_write_stereo_header_and_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        write_wav_stereo(&path, &[1.0, 0.0, 0.5], &[-1.0, 0.25, 0.0, 9.0], 16000).unwrap();

        let mut reader = WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.bits_per_sample, 16);

        // The extra right sample is dropped
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 6);
        assert_eq!(samples[0], i16::MAX);
        assert_eq!(samples[1], i16::MIN);
        assert_eq!(samples[3], to_i16(0.25));
    }

    #[test]
    fn test_read_mono_averages_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav_stereo(&path, &[0.5, -0.5], &[0.0, -0.5], 22050).unwrap();

        let (samples, rate) = read_wav_mono(&path).unwrap();
        assert_eq!(rate, 22050);
        assert_eq!(samples.len(), 2);
        assert_abs_diff_eq!(samples[0], 0.25, epsilon = 1e-4);
        assert_abs_diff_eq!(samples[1], -0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_read_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for s in [0.1f32, -0.2, 0.3] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let (samples, rate) = read_wav_mono(&path).unwrap();
        assert_eq!(rate, 44100);
        assert_eq!(samples, vec![0.1, -0.2, 0.3]);
    }

    #[test]
    fn test_read_empty_wav_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav_stereo(&path, &[], &[], 8000).unwrap();
        assert!(matches!(read_wav_mono(&path), Err(SynthError::EmptySample(_))));
    }

    #[test]
    fn test_read_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_wav_mono(dir.path().join("missing.wav")).is_err());
    }
}
