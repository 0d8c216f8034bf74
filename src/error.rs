//! Error types for the fallible outer surfaces of the engine
//!
//! The render path itself never fails; only the offline driver, WAV I/O,
//! event-file loading and cross-thread submission return these.

/// Errors surfaced by the offline renderer and file helpers
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("rendering was cancelled")]
    Cancelled,

    #[error("synthesizer is no longer receiving events")]
    Disconnected,

    #[error("sample file {0} contains no audio")]
    EmptySample(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid event data: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SynthError>;
