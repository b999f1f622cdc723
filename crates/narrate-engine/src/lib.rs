#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

mod consumer;
mod producer;
mod session;

pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod output;
pub mod queue;
pub mod segment;
pub mod synth;
pub mod voice;

// Re-export key types for convenience
pub use config::{EngineConfig, VoiceSettings};
pub use engine::{EngineState, EventReceiver, SpeechEngine, SpeechEvent};
pub use error::SpeechError;
pub use output::AudioOutput;
pub use output::wav::WavOutput;
pub use segment::split_sentences;
pub use synth::tone::ToneSynthesizer;
pub use synth::{ChunkControl, Synthesizer, SynthesizerLoader};
pub use voice::{KOKORO_VOICES, VoiceId, VoiceInfo};
