//! Sample storage and instrument parameter index
//!
//! Holds every decoded sample buffer by id, and maps
//! (bank, instrument, key) to the ordered list of synthesis parameters that
//! sound for that key. Buffers are immutable once stored and shared with the
//! voices that play them.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::generator::envelope::EnvelopeParams;

/// Bank used when the requested bank has no registered instruments
pub const FALLBACK_BANK: u16 = 0;

/// Opaque identifier of a stored sample buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(pub u32);

/// How a sample loops while it plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoopKind {
    /// Play once from start to end
    #[default]
    None,
    /// Loop between loop start and loop end forever
    Continuous,
    /// Loop until note-off, then play through to the sample end
    Sustain,
}

/// Loop region of a sample, in sample indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopParams {
    #[serde(rename = "type")]
    pub kind: LoopKind,
    pub start: usize,
    pub end: usize,
}

/// Synthesis parameters for one sample as used by one instrument zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleParameter {
    pub sample_id: SampleId,
    /// Root pitch of the recording (MIDI note number, may be fractional)
    pub pitch: f64,
    /// Semitone scaling, 1.0 for normal keyboard tracking
    #[serde(default = "default_scale_tuning")]
    pub scale_tuning: f64,
    pub sample_start: usize,
    pub sample_end: usize,
    /// Native sample rate of the recording
    pub sample_rate: u32,
    #[serde(rename = "loop", default)]
    pub looping: LoopParams,
    /// Stereo position in [-1, 1]
    #[serde(default)]
    pub pan: f64,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default)]
    pub exclusive_class: Option<u32>,
    #[serde(default)]
    pub envelope: EnvelopeParams,
}

fn default_scale_tuning() -> f64 {
    1.0
}

fn default_volume() -> f64 {
    1.0
}

/// Inclusive range of MIDI key or velocity values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRange {
    pub start: u8,
    pub end: u8,
}

impl NoteRange {
    pub fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    /// Whole MIDI range 0..=127
    pub fn full() -> Self {
        Self { start: 0, end: 127 }
    }

    pub fn contains(&self, value: u8) -> bool {
        self.start <= value && value <= self.end
    }
}

/// Where a sample parameter is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRange {
    pub bank: u16,
    pub instrument: u8,
    pub key_range: NoteRange,
    pub vel_range: NoteRange,
}

/// A parameter resolved together with the buffer it plays
#[derive(Debug, Clone)]
pub struct ResolvedSample {
    pub parameter: Arc<SampleParameter>,
    pub data: Arc<[f32]>,
}

#[derive(Debug, Clone)]
struct ZoneEntry {
    parameter: Arc<SampleParameter>,
    vel_range: NoteRange,
}

type KeyMap = HashMap<u8, Vec<ZoneEntry>>;

/// Sample buffers plus the bank → instrument → key parameter index
#[derive(Debug, Default)]
pub struct SampleTable {
    samples: HashMap<SampleId, Arc<[f32]>>,
    banks: HashMap<u16, HashMap<u8, KeyMap>>,
}

impl SampleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a decoded buffer, replacing any buffer with the same id
    pub fn add_sample(&mut self, data: Vec<f32>, id: SampleId) {
        debug!(sample = id.0, frames = data.len(), "Storing sample");
        self.samples.insert(id, Arc::from(data));
    }

    /// Store a buffer given as little-endian `f32` bytes
    ///
    /// Trailing bytes that do not form a whole sample are dropped.
    pub fn add_sample_bytes(&mut self, bytes: &[u8], id: SampleId) {
        let data = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        self.add_sample(data, id);
    }

    /// Register a parameter for every key in the range
    ///
    /// Appends to each key's list; earlier registrations stay in place so
    /// layered instruments play every matching sample.
    pub fn add_sample_parameter(&mut self, parameter: SampleParameter, range: SampleRange) {
        if range.key_range.start > range.key_range.end {
            debug!(?range, "Ignoring sample parameter with empty key range");
            return;
        }

        let parameter = Arc::new(parameter);
        let keys = self
            .banks
            .entry(range.bank)
            .or_default()
            .entry(range.instrument)
            .or_default();

        for key in range.key_range.start..=range.key_range.end {
            keys.entry(key).or_default().push(ZoneEntry {
                parameter: Arc::clone(&parameter),
                vel_range: range.vel_range,
            });
        }
    }

    /// Every parameter at (bank, instrument, key) whose velocity range holds `velocity`
    ///
    /// An instrument the bank does not define is looked up in bank 0 instead.
    /// Unknown keys give an empty list. Parameters whose sample id was never loaded are skipped
    /// with a warning.
    pub fn get_samples(&self, bank: u16, instrument: u8, key: u8, velocity: u8) -> Vec<ResolvedSample> {
        let keys = self
            .banks
            .get(&bank)
            .and_then(|instruments| instruments.get(&instrument))
            .or_else(|| {
                self.banks
                    .get(&FALLBACK_BANK)
                    .and_then(|instruments| instruments.get(&instrument))
            });

        let Some(entries) = keys.and_then(|keys| keys.get(&key)) else {
            return Vec::new();
        };

        entries
            .iter()
            .filter(|entry| entry.vel_range.contains(velocity))
            .filter_map(|entry| match self.samples.get(&entry.parameter.sample_id) {
                Some(data) => Some(ResolvedSample {
                    parameter: Arc::clone(&entry.parameter),
                    data: Arc::clone(data),
                }),
                None => {
                    warn!(
                        sample = entry.parameter.sample_id.0,
                        bank, instrument, key, "Sample parameter references an unloaded sample"
                    );
                    None
                }
            })
            .collect()
    }

    /// Number of stored sample buffers
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}
