//! Subcommands and their arguments.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use narrate_engine::VoiceId;
use narrate_engine::voice::{find_voice, find_voice_by_name};

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Read a text file (or stdin) aloud
    Speak(SpeakArgs),

    /// List the available voices
    Voices,

    /// Show how a text is split into sentences
    Sentences {
        /// Text file to split (reads stdin when omitted)
        file: Option<PathBuf>,
    },
}

/// Arguments of `narrate speak`.
#[derive(Args, Debug, Clone)]
pub struct SpeakArgs {
    /// Text file to read (reads stdin when omitted)
    pub file: Option<PathBuf>,

    /// Voice id or name (see `narrate voices`)
    #[arg(long, env = "NARRATE_VOICE", default_value = "1", value_parser = parse_voice)]
    pub voice: VoiceId,

    /// Speaking rate, 0.5 to 2.0
    #[arg(long, env = "NARRATE_SPEED", default_value_t = 1.0)]
    pub speed: f32,

    /// Start at this sentence (index as printed by `narrate sentences`)
    #[arg(long, value_name = "SENTENCE")]
    pub from: Option<usize>,

    /// Render to a WAV file instead of the speaker
    #[arg(long, value_name = "PATH")]
    pub wav: Option<PathBuf>,

    /// Render the WAV file faster than real time
    #[arg(long, requires = "wav")]
    pub fast: bool,

    /// Kokoro model directory (requires the `sherpa` feature)
    #[arg(long, env = "NARRATE_MODEL_DIR", value_name = "DIR")]
    pub model_dir: Option<PathBuf>,

    /// Read playback commands from stdin: p, r, j N, s, q
    #[arg(short, long, requires = "file")]
    pub interactive: bool,
}

/// Accept a catalogue id (`5`) or a speaker name (`am_adam`).
fn parse_voice(value: &str) -> Result<VoiceId, String> {
    let voice = match value.parse::<u32>() {
        Ok(id) => find_voice(VoiceId(id)),
        Err(_) => find_voice_by_name(value),
    };
    voice
        .map(|info| info.id)
        .ok_or_else(|| format!("unknown voice '{value}' (run `narrate voices`)"))
}
