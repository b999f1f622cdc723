//! Engine configuration: every tunable constant of the playback pipeline.
//!
//! [`EngineConfig`] is plain data: it derives `serde` so a front end can load
//! it from a TOML/JSON file, and every field falls back to its default when
//! absent. Durations are (de)serialised as integer milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SpeechError;
use crate::voice::VoiceId;

/// Slowest accepted speaking rate.
pub const MIN_SPEED: f32 = 0.5;

/// Fastest accepted speaking rate.
pub const MAX_SPEED: f32 = 2.0;

/// Longest accepted end-of-stream padding.
pub const MAX_END_SILENCE: Duration = Duration::from_secs(5);

/// Tunables for the producer/consumer pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of the chunk queue between producer and consumer.
    ///
    /// Streaming synthesizers deliver several sub-chunks per sentence, so
    /// this is sized to hold a handful of sentences.
    pub queue_capacity: usize,

    /// Sentences the producer should have queued before the consumer starts
    /// the output device.
    pub prebuffer_sentences: usize,

    /// Poll interval of the consumer's pre-buffer wait.
    #[serde(with = "millis")]
    pub prebuffer_poll: Duration,

    /// Upper bound on pre-buffer polls before playback starts regardless.
    pub prebuffer_max_polls: u32,

    /// Timeout of a single consumer poll on the queue.
    #[serde(with = "millis")]
    pub queue_poll_timeout: Duration,

    /// Poll interval of the producer/consumer pause wait.
    #[serde(with = "millis")]
    pub pause_poll: Duration,

    /// Length of the silence appended after the last sentence.
    ///
    /// The effective padding is never shorter than the output device's
    /// minimum hardware buffer.
    #[serde(with = "millis")]
    pub end_silence: Duration,

    /// Poll interval of the end-of-stream drain wait.
    #[serde(with = "millis")]
    pub drain_poll: Duration,

    /// Upper bound on drain polls before completion is declared anyway.
    pub drain_max_polls: u32,

    /// How long `stop()` waits for the background threads to exit.
    #[serde(with = "millis")]
    pub join_timeout: Duration,

    /// Queue depth at or below which the consumer logs an underrun warning.
    pub low_queue_warning: usize,

    /// Phrase synthesised once during initialization. Empty disables warm-up.
    pub warm_up_text: String,

    /// Voice used until the caller picks one.
    pub voice: VoiceId,

    /// Speaking rate used until the caller picks one.
    pub speed: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            prebuffer_sentences: 2,
            prebuffer_poll: Duration::from_millis(50),
            prebuffer_max_polls: 100,
            queue_poll_timeout: Duration::from_millis(20),
            pause_poll: Duration::from_millis(50),
            end_silence: Duration::from_millis(100),
            drain_poll: Duration::from_millis(20),
            drain_max_polls: 100,
            join_timeout: Duration::from_millis(500),
            low_queue_warning: 1,
            warm_up_text: "Hi.".to_string(),
            voice: VoiceId::DEFAULT,
            speed: 1.0,
        }
    }
}

impl EngineConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), SpeechError> {
        if self.queue_capacity == 0 {
            return Err(SpeechError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }

        for (name, value) in [
            ("prebuffer_poll", self.prebuffer_poll),
            ("queue_poll_timeout", self.queue_poll_timeout),
            ("pause_poll", self.pause_poll),
            ("drain_poll", self.drain_poll),
        ] {
            if value.is_zero() {
                return Err(SpeechError::InvalidConfig(format!("{name} must be non-zero")));
            }
        }

        if self.end_silence > MAX_END_SILENCE {
            return Err(SpeechError::InvalidConfig(format!(
                "end_silence must be at most {} ms, got {} ms",
                MAX_END_SILENCE.as_millis(),
                self.end_silence.as_millis()
            )));
        }

        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(SpeechError::InvalidConfig(format!(
                "speed must be a positive number, got {}",
                self.speed
            )));
        }

        Ok(())
    }

    /// Number of padding frames appended after the last sentence.
    pub(crate) fn end_silence_frames(&self, sample_rate: u32, min_buffer_frames: usize) -> usize {
        let from_duration = u128::from(sample_rate) * self.end_silence.as_millis() / 1000;
        usize::try_from(from_duration)
            .unwrap_or(usize::MAX)
            .max(min_buffer_frames)
    }
}

/// Voice and rate applied to each synthesized sentence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Speaker id passed to the synthesizer.
    pub voice: VoiceId,

    /// Speaking-rate multiplier (0.5–2.0, default 1.0).
    pub speed: f32,
}

impl VoiceSettings {
    /// Build settings with the voice clamped to the catalogue and the speed
    /// clamped to `[MIN_SPEED, MAX_SPEED]`.
    #[must_use]
    pub fn new(voice: VoiceId, speed: f32) -> Self {
        Self {
            voice: voice.clamped(),
            speed: clamp_speed(speed),
        }
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self::new(VoiceId::DEFAULT, 1.0)
    }
}

/// Clamp a speaking rate into the accepted range. NaN maps to 1.0.
#[must_use]
pub fn clamp_speed(speed: f32) -> f32 {
    if speed.is_nan() {
        1.0
    } else {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    }
}

/// `Duration` <-> integer milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
