//! Synthesis capability: the engine-facing interface to a text-to-speech
//! model.
//!
//! The engine never knows which model it drives. It receives a
//! [`SynthesizerLoader`] at construction and consults it exactly once, in
//! `initialize()`; a model that cannot be loaded is an ordinary `Err`.
//!
//! ## Implementations
//!
//! | Feature  | Module     | Delivery  |
//! |----------|------------|-----------|
//! | (always) | [`tone`]   | streaming |
//! | `sherpa` | [`sherpa`] | blocking  |

#[cfg(feature = "sherpa")]
pub mod sherpa;
pub mod tone;

use std::sync::Arc;

use crate::error::SpeechError;
use crate::voice::VoiceId;

/// Returned by a streaming callback to continue or abandon synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkControl {
    /// Keep producing sub-chunks.
    Continue,

    /// Stop as soon as practical; the caller no longer wants this sentence.
    Stop,
}

/// A loaded text-to-speech model.
///
/// Implementations must be `Send + Sync`: the producer thread calls them
/// while the control thread holds another reference. Calls may be slow
/// (tens to hundreds of milliseconds per sentence).
pub trait Synthesizer: Send + Sync {
    /// Output sample rate (Hz). Mono f32 PCM.
    fn sample_rate(&self) -> u32;

    /// Synthesize one sentence, blocking until all samples are ready.
    fn synthesize(&self, text: &str, voice: VoiceId, speed: f32)
    -> Result<Vec<f32>, SpeechError>;

    /// Whether [`synthesize_streaming`](Self::synthesize_streaming) is
    /// implemented.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Synthesize one sentence, delivering sub-chunks through `on_chunk` as
    /// soon as they are available.
    ///
    /// When `on_chunk` returns [`ChunkControl::Stop`] the implementation
    /// must stop producing further sub-chunks for this call and return.
    /// Stopping early is not an error.
    fn synthesize_streaming(
        &self,
        text: &str,
        voice: VoiceId,
        speed: f32,
        on_chunk: &mut dyn FnMut(&[f32]) -> ChunkControl,
    ) -> Result<(), SpeechError> {
        let _ = (text, voice, speed, on_chunk);
        Err(SpeechError::StreamingUnsupported)
    }
}

/// Produces the synthesizer on demand.
///
/// Keeping loading behind a capability lets the engine be constructed
/// cheaply (and report "not available" later) even when the model is large
/// or missing.
pub trait SynthesizerLoader: Send {
    fn load(&self) -> Result<Arc<dyn Synthesizer>, SpeechError>;
}

impl<F> SynthesizerLoader for F
where
    F: Fn() -> Result<Arc<dyn Synthesizer>, SpeechError> + Send,
{
    fn load(&self) -> Result<Arc<dyn Synthesizer>, SpeechError> {
        self()
    }
}
