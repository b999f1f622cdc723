//! CLI bootstrap - the composition root.
//!
//! This module is the only place where the engine is wired together:
//! - Logging (`tracing-subscriber`, to stderr)
//! - Engine configuration (defaults, optionally overridden by a TOML file)
//! - Synthesizer backend (tone generator, or Kokoro with `--model-dir`)
//! - Output device (WAV file with `--wav`, otherwise the speaker)

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use narrate_engine::synth::tone::TONE_SAMPLE_RATE;
use narrate_engine::{
    AudioOutput, EngineConfig, EventReceiver, SpeechEngine, SpeechError, Synthesizer,
    ToneSynthesizer, WavOutput,
};
use tracing_subscriber::EnvFilter;

use crate::commands::SpeakArgs;
use crate::error::CliError;

/// Clock speed-up for `--wav --fast`.
pub const FAST_RENDER_SCALE: f64 = 20.0;

// ── Logging ────────────────────────────────────────────────────────

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects `debug` and the
/// default is `info`. Logs go to stderr so stdout only carries narration.
pub fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("narrate_engine={level},narrate_cli={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ── Configuration ──────────────────────────────────────────────────

/// Engine configuration: defaults, overridden by the TOML file at `path`.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, CliError> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };

    let raw = fs::read_to_string(path)
        .map_err(|e| CliError::Config(format!("{}: {e}", path.display())))?;
    let config: EngineConfig = toml::from_str(&raw)
        .map_err(|e| CliError::Config(format!("{}: {e}", path.display())))?;
    config.validate()?;

    tracing::debug!(path = %path.display(), "Loaded engine configuration");
    Ok(config)
}

// ── Engine wiring ──────────────────────────────────────────────────

/// Synthesizer selected on the command line.
#[derive(Debug, Clone)]
enum Backend {
    Tone,
    #[cfg(feature = "sherpa")]
    Kokoro(PathBuf),
}

impl Backend {
    fn select(model_dir: Option<&Path>) -> Result<Self, CliError> {
        match model_dir {
            None => Ok(Self::Tone),
            #[cfg(feature = "sherpa")]
            Some(dir) => Ok(Self::Kokoro(dir.to_path_buf())),
            #[cfg(not(feature = "sherpa"))]
            Some(dir) => Err(CliError::Arguments(format!(
                "--model-dir {} needs a build with the `sherpa` feature",
                dir.display()
            ))),
        }
    }

    const fn sample_rate(&self) -> u32 {
        match self {
            Self::Tone => TONE_SAMPLE_RATE,
            #[cfg(feature = "sherpa")]
            Self::Kokoro(_) => narrate_engine::synth::sherpa::SHERPA_SAMPLE_RATE,
        }
    }

    fn load(&self) -> Result<Arc<dyn Synthesizer>, SpeechError> {
        match self {
            Self::Tone => Ok(Arc::new(ToneSynthesizer::new())),
            #[cfg(feature = "sherpa")]
            Self::Kokoro(dir) => narrate_engine::SynthesizerLoader::load(
                &narrate_engine::synth::sherpa::SherpaLoader::new(dir.clone()),
            ),
        }
    }
}

/// A wired engine plus the handles the speak command needs.
pub struct Playback {
    pub engine: SpeechEngine,
    pub events: EventReceiver,
    /// Set when rendering to a file; must be finalized after playback.
    pub wav: Option<(Arc<WavOutput>, PathBuf)>,
}

/// Build an (uninitialized) engine for `narrate speak`.
pub fn build_engine(config: EngineConfig, args: &SpeakArgs) -> Result<Playback, CliError> {
    let backend = Backend::select(args.model_dir.as_deref())?;
    let rate = backend.sample_rate();

    let (output, wav) = match &args.wav {
        Some(path) => {
            let mut device = WavOutput::create(path, rate)?;
            if args.fast {
                device = device.with_time_scale(FAST_RENDER_SCALE);
            }
            let device = Arc::new(device);
            let output: Arc<dyn AudioOutput> = Arc::clone(&device) as Arc<dyn AudioOutput>;
            (output, Some((device, path.clone())))
        }
        None => (speaker_output(rate)?, None),
    };

    tracing::debug!(?backend, sample_rate = rate, "Engine wiring selected");
    let loader = move || backend.load();
    let (engine, events) = SpeechEngine::new(config, loader, output)?;

    Ok(Playback {
        engine,
        events,
        wav,
    })
}

#[cfg(feature = "speaker")]
fn speaker_output(rate: u32) -> Result<Arc<dyn AudioOutput>, CliError> {
    let device = narrate_engine::output::speaker::SpeakerOutput::open(rate)?;
    Ok(Arc::new(device))
}

#[cfg(not(feature = "speaker"))]
fn speaker_output(_rate: u32) -> Result<Arc<dyn AudioOutput>, CliError> {
    Err(CliError::Arguments(
        "this build has no speaker output (enable the `speaker` feature); use --wav <PATH>".into(),
    ))
}
