//! Speech engine error types.

use std::path::PathBuf;

/// Errors that can occur in the narration pipeline.
///
/// Only initialization failures and total synthesis failure ever reach the
/// caller. Per-sentence failures and shutdown timeouts are logged and
/// absorbed by the producer/consumer loops.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    /// The synthesis capability could not be loaded.
    #[error("Speech synthesizer unavailable: {0}")]
    SynthesizerUnavailable(String),

    /// Voice model not found at expected path.
    #[error("Voice model not found at {0}")]
    ModelNotFound(PathBuf),

    /// Failed to synthesize a piece of text.
    #[error("Speech synthesis failed: {0}")]
    SynthesisError(String),

    /// The synthesizer has no incremental delivery mode.
    #[error("Streaming synthesis is not supported by this synthesizer")]
    StreamingUnsupported,

    /// Synthesizer and output device disagree on sample rate.
    #[error(
        "Sample rate mismatch: synthesizer produces {synthesizer} Hz, output plays {output} Hz"
    )]
    SampleRateMismatch { synthesizer: u32, output: u32 },

    /// Failed to open or drive the audio output stream.
    #[error("Audio output error: {0}")]
    OutputStreamError(String),

    /// The dedicated audio thread exited unexpectedly.
    #[error("Audio thread died unexpectedly")]
    AudioThreadDied,

    /// An operation that needs a loaded synthesizer was called too early.
    #[error("Speech engine not initialized")]
    NotInitialized,

    /// Engine configuration failed validation.
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// A producer or consumer thread could not be started.
    #[error("Failed to spawn {task} thread: {source}")]
    Spawn {
        task: &'static str,
        source: std::io::Error,
    },

    /// WAV encoding error (file output).
    #[error("WAV output error: {0}")]
    Wav(#[from] hound::Error),

    /// IO error (model files, output files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
