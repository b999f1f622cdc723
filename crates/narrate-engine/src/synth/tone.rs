//! Tone synthesizer: a deterministic stand-in for a speech model.
//!
//! Renders each word as a short sine burst and each word break as silence,
//! so the rhythm of the narration is audible without any model files. Each
//! word is delivered as its own streaming sub-chunk, which makes it handy
//! for exercising the pipeline's streaming path.

use std::f32::consts::TAU;

use crate::error::SpeechError;
use crate::synth::{ChunkControl, Synthesizer};
use crate::voice::VoiceId;

/// Default output rate, matching the Kokoro models.
pub const TONE_SAMPLE_RATE: u32 = 24_000;

const MS_PER_CHAR: f32 = 45.0;
const MAX_WORD_MS: f32 = 600.0;
const GAP_MS: f32 = 60.0;
const BASE_PITCH_HZ: f32 = 150.0;
const PITCH_STEP_HZ: f32 = 15.0;
const AMPLITUDE: f32 = 0.2;

/// Sine-burst synthesizer. Pitch follows the voice id; duration follows
/// word length divided by speed.
#[derive(Debug, Clone)]
pub struct ToneSynthesizer {
    sample_rate: u32,
}

impl ToneSynthesizer {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_sample_rate(TONE_SAMPLE_RATE)
    }

    #[must_use]
    pub const fn with_sample_rate(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    #[allow(clippy::cast_precision_loss)]
    fn pitch(voice: VoiceId) -> f32 {
        (voice.0 as f32).mul_add(PITCH_STEP_HZ, BASE_PITCH_HZ)
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn frames_for(&self, ms: f32, speed: f32) -> usize {
        (ms / speed.max(0.1) * self.sample_rate as f32 / 1000.0).round() as usize
    }

    /// One word burst followed by a word-break gap.
    #[allow(clippy::cast_precision_loss)]
    fn render_word(&self, word: &str, voice: VoiceId, speed: f32) -> Vec<f32> {
        let letters = word.chars().filter(|c| c.is_alphanumeric()).count().max(1);
        let word_ms = (letters as f32 * MS_PER_CHAR).min(MAX_WORD_MS);
        let tone_frames = self.frames_for(word_ms, speed);
        let gap_frames = self.frames_for(GAP_MS, speed);

        let freq = Self::pitch(voice);
        let rate = self.sample_rate as f32;
        // Short linear ramps on both ends avoid clicks at word boundaries.
        let ramp = (tone_frames / 10).max(1) as f32;

        let mut samples = Vec::with_capacity(tone_frames + gap_frames);
        for n in 0..tone_frames {
            let t = n as f32 / rate;
            let fade_in = (n as f32 / ramp).min(1.0);
            let fade_out = ((tone_frames - n) as f32 / ramp).min(1.0);
            samples.push(AMPLITUDE * fade_in * fade_out * (TAU * freq * t).sin());
        }
        samples.resize(tone_frames + gap_frames, 0.0);
        samples
    }
}

impl Default for ToneSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synthesizer for ToneSynthesizer {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn synthesize(
        &self,
        text: &str,
        voice: VoiceId,
        speed: f32,
    ) -> Result<Vec<f32>, SpeechError> {
        let mut samples = Vec::new();
        for word in text.split_whitespace() {
            samples.extend(self.render_word(word, voice, speed));
        }
        Ok(samples)
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn synthesize_streaming(
        &self,
        text: &str,
        voice: VoiceId,
        speed: f32,
        on_chunk: &mut dyn FnMut(&[f32]) -> ChunkControl,
    ) -> Result<(), SpeechError> {
        for word in text.split_whitespace() {
            let chunk = self.render_word(word, voice, speed);
            if on_chunk(&chunk) == ChunkControl::Stop {
                tracing::debug!("Tone synthesis stopped early by caller");
                break;
            }
        }
        Ok(())
    }
}
