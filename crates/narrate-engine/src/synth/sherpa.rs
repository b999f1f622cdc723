//! Sherpa-ONNX Kokoro synthesizer implementing [`Synthesizer`] via `sherpa-rs`.
//!
//! `KokoroTts::create` takes `&mut self` while [`Synthesizer`] works on
//! `&self`, so the engine is kept behind a mutex. sherpa-rs exposes only
//! whole-utterance synthesis, so this backend is blocking; the producer
//! pipelines it sentence by sentence.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use sherpa_rs::tts::{KokoroTts, KokoroTtsConfig};

use crate::error::SpeechError;
use crate::synth::{Synthesizer, SynthesizerLoader};
use crate::voice::VoiceId;

/// Sherpa-ONNX Kokoro output sample rate (24 kHz).
pub const SHERPA_SAMPLE_RATE: u32 = 24_000;

/// Loads a Kokoro model directory on first `initialize()`.
///
/// The directory must contain:
/// - `model.onnx`: the Kokoro ONNX model
/// - `voices.bin`: packed voice style embeddings
/// - `tokens.txt`: tokenizer vocabulary
/// - `espeak-ng-data/`: espeak-ng lexicon data
#[derive(Debug, Clone)]
pub struct SherpaLoader {
    model_dir: PathBuf,
}

impl SherpaLoader {
    #[must_use]
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }
}

impl SynthesizerLoader for SherpaLoader {
    fn load(&self) -> Result<Arc<dyn Synthesizer>, SpeechError> {
        Ok(Arc::new(SherpaSynthesizer::load(&self.model_dir)?))
    }
}

/// A loaded sherpa-onnx Kokoro model.
pub struct SherpaSynthesizer {
    engine: Mutex<KokoroTts>,
}

impl SherpaSynthesizer {
    pub fn load(model_dir: &Path) -> Result<Self, SpeechError> {
        if !model_dir.exists() {
            return Err(SpeechError::ModelNotFound(model_dir.to_path_buf()));
        }

        let model_path = model_dir.join("model.onnx");
        let voices_path = model_dir.join("voices.bin");
        let tokens_path = model_dir.join("tokens.txt");
        let data_dir = model_dir.join("espeak-ng-data");

        for path in [&model_path, &voices_path, &tokens_path, &data_dir] {
            if !path.exists() {
                return Err(SpeechError::ModelNotFound(path.clone()));
            }
        }

        tracing::info!(dir = %model_dir.display(), "Loading Sherpa Kokoro model");

        let config = KokoroTtsConfig {
            model: path_to_string(&model_path)?,
            voices: path_to_string(&voices_path)?,
            tokens: path_to_string(&tokens_path)?,
            data_dir: path_to_string(&data_dir)?,
            length_scale: 1.0,
            ..Default::default()
        };

        let engine = KokoroTts::new(config);
        tracing::info!("Sherpa Kokoro model loaded");

        Ok(Self {
            engine: Mutex::new(engine),
        })
    }
}

impl Synthesizer for SherpaSynthesizer {
    fn sample_rate(&self) -> u32 {
        SHERPA_SAMPLE_RATE
    }

    fn synthesize(
        &self,
        text: &str,
        voice: VoiceId,
        speed: f32,
    ) -> Result<Vec<f32>, SpeechError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let sid = i32::try_from(voice.clamped().0).unwrap_or(0);
        tracing::debug!(text_len = text.len(), sid, speed, "Synthesizing (Sherpa Kokoro)");

        let audio = self
            .engine
            .lock()
            .create(text, sid, speed)
            .map_err(|e| SpeechError::SynthesisError(e.to_string()))?;

        if audio.sample_rate != SHERPA_SAMPLE_RATE {
            return Err(SpeechError::SampleRateMismatch {
                synthesizer: audio.sample_rate,
                output: SHERPA_SAMPLE_RATE,
            });
        }

        Ok(audio.samples)
    }
}

/// Convert a path to a string, rejecting non-UTF-8 paths.
fn path_to_string(path: &Path) -> Result<String, SpeechError> {
    path.to_str().map(ToString::to_string).ok_or_else(|| {
        SpeechError::SynthesizerUnavailable(format!("Invalid path: {}", path.display()))
    })
}
