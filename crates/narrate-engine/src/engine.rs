//! Speech engine: the control-thread state machine over the
//! producer/consumer pipeline.
//!
//! ```text
//!   Uninitialized → Initializing → Ready ⇄ Speaking ⇄ Paused
//!                         │                   │
//!                         └──→ Error          └──→ Ready (playback complete)
//! ```
//!
//! Every `speak`, `jump_to_sentence` and cold `resume` stops the previous
//! generation (joining its threads with a bounded timeout), advances the
//! generation counter and starts a fresh producer/consumer pair with its own
//! queue. `pause` only gates the threads and pauses the device, so a warm
//! `resume` continues from the exact hardware position.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::{EngineConfig, VoiceSettings, clamp_speed};
use crate::error::SpeechError;
use crate::generation::PauseState;
use crate::output::AudioOutput;
use crate::segment;
use crate::session::{Session, Shared};
use crate::synth::{Synthesizer, SynthesizerLoader};
use crate::voice::VoiceId;
use crate::{consumer, producer};

const JOIN_POLL: Duration = Duration::from_millis(5);

// ── Engine state machine ───────────────────────────────────────────

/// Current state of the speech engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// No synthesizer loaded.
    Uninitialized,

    /// `initialize()` is loading and warming up the synthesizer.
    Initializing,

    /// Loaded and idle.
    Ready,

    /// A generation is playing (or pre-buffering).
    Speaking,

    /// Playback paused; `resume()` continues it.
    Paused,

    /// Initialization failed. Only `initialize()` leaves this state.
    Error(String),
}

// ── Events emitted by the engine ───────────────────────────────────

/// Notifications for the UI / orchestration layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Engine state changed.
    StateChanged(EngineState),

    /// The first audio of sentence `n` was written to the output.
    SentenceStarted(usize),

    /// The last audio of sentence `n` was written to the output.
    SentenceCompleted(usize),

    /// The last sentence has finished playing.
    PlaybackComplete,

    /// Initialization failed, the engine was used before initialization,
    /// or no sentence of an utterance could be synthesized.
    Error(String),
}

/// Receiving end of the engine's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<SpeechEvent>;

// ── Engine ─────────────────────────────────────────────────────────

/// Gapless sentence-streaming speech engine.
///
/// Owned by its caller; every control method takes `&mut self`, so control
/// calls are naturally serialized. Events are delivered through the
/// receiver returned by [`SpeechEngine::new`].
pub struct SpeechEngine {
    shared: Arc<Shared>,
    loader: Box<dyn SynthesizerLoader>,
    synth: Option<Arc<dyn Synthesizer>>,
    output: Arc<dyn AudioOutput>,
    sentences: Arc<[String]>,
    /// First sentence of the latest generation; where a resume restarts
    /// before any of its audio has been written.
    start_index: usize,
    session: Option<Arc<Session>>,
    producer: Option<JoinHandle<()>>,
    consumer: Option<JoinHandle<()>>,
}

impl SpeechEngine {
    /// Create an engine. Nothing is loaded until [`initialize`](Self::initialize).
    ///
    /// Returns the engine and an event receiver for sentence, completion,
    /// state and error notifications.
    pub fn new(
        config: EngineConfig,
        loader: impl SynthesizerLoader + 'static,
        output: Arc<dyn AudioOutput>,
    ) -> Result<(Self, EventReceiver), SpeechError> {
        config.validate()?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let engine = Self {
            shared: Arc::new(Shared::new(config, event_tx)),
            loader: Box::new(loader),
            synth: None,
            output,
            sentences: Arc::from(Vec::new()),
            start_index: 0,
            session: None,
            producer: None,
            consumer: None,
        };

        Ok((engine, event_rx))
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Load and warm up the synthesizer.
    ///
    /// Idempotent: returns `Ok(())` immediately if already initialized.
    /// On failure the engine enters [`EngineState::Error`] and an
    /// [`SpeechEvent::Error`] is emitted.
    pub fn initialize(&mut self) -> Result<(), SpeechError> {
        if self.synth.is_some() {
            return Ok(());
        }

        self.shared.set_state(EngineState::Initializing);
        tracing::info!("Initializing speech engine");

        match self.load_synthesizer() {
            Ok(synth) => {
                self.synth = Some(synth);
                self.shared.set_state(EngineState::Ready);
                tracing::info!("Speech engine ready");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Speech engine initialization failed");
                let message = e.to_string();
                self.shared.set_state(EngineState::Error(message.clone()));
                self.shared.emit(SpeechEvent::Error(message));
                Err(e)
            }
        }
    }

    fn load_synthesizer(&self) -> Result<Arc<dyn Synthesizer>, SpeechError> {
        let synth = self.loader.load()?;

        let synthesizer = synth.sample_rate();
        let output = self.output.sample_rate();
        if synthesizer != output {
            return Err(SpeechError::SampleRateMismatch {
                synthesizer,
                output,
            });
        }

        let warm_up = self.shared.config.warm_up_text.trim();
        if !warm_up.is_empty() {
            let started = Instant::now();
            let settings = self.shared.settings();
            synth.synthesize(warm_up, settings.voice, settings.speed)?;
            tracing::debug!(
                elapsed_ms = started.elapsed().as_millis(),
                "Synthesizer warmed up"
            );
        }

        Ok(synth)
    }

    /// Stop playback and unload the synthesizer.
    ///
    /// The engine returns to [`EngineState::Uninitialized`]; a later
    /// [`initialize`](Self::initialize) loads it again.
    pub fn release(&mut self) {
        self.halt_and_join();
        if let Err(e) = self.output.stop() {
            tracing::warn!(error = %e, "Failed to stop audio output");
        }
        self.synth = None;
        self.sentences = Arc::from(Vec::new());
        self.shared.set_current_sentence(None);
        self.start_index = 0;
        self.shared.set_state(EngineState::Uninitialized);
        tracing::info!("Speech engine released");
    }

    // ── Playback control ───────────────────────────────────────────

    /// Speak `text` from its first sentence.
    ///
    /// Always stops any previous activity first. Text without any sentence
    /// leaves the engine idle. Calling this before a successful
    /// `initialize()` emits [`SpeechEvent::Error`] and returns
    /// [`SpeechError::NotInitialized`].
    pub fn speak(&mut self, text: &str, voice: VoiceId, speed: f32) -> Result<(), SpeechError> {
        if self.synth.is_none() {
            tracing::warn!("speak() called before initialize()");
            self.shared
                .emit(SpeechEvent::Error(SpeechError::NotInitialized.to_string()));
            return Err(SpeechError::NotInitialized);
        }

        self.halt_and_join();
        self.shared.set_settings(VoiceSettings::new(voice, speed));
        self.sentences = Arc::from(segment::split_sentences(text));
        self.shared.set_current_sentence(None);

        if self.sentences.is_empty() {
            tracing::debug!("Nothing to speak");
            self.shared.set_state(EngineState::Ready);
            return Ok(());
        }

        tracing::info!(sentences = self.sentences.len(), voice = %voice, speed, "Speaking");
        self.start_generation(0)
    }

    /// Restart playback at sentence `index` of the current text.
    ///
    /// No-op if no text is loaded, the engine is not initialized, or
    /// `index` is out of range. [`current_sentence`](Self::current_sentence)
    /// reads `None` until the first audio of `index` is written.
    pub fn jump_to_sentence(&mut self, index: usize) -> Result<(), SpeechError> {
        if self.synth.is_none() || index >= self.sentences.len() {
            tracing::debug!(index, total = self.sentences.len(), "Jump ignored");
            return Ok(());
        }

        tracing::info!(index, "Jumping to sentence");
        self.halt_and_join();
        self.shared.set_current_sentence(None);
        self.start_generation(index)
    }

    /// Pause playback, keeping buffered audio and in-flight synthesis.
    ///
    /// No-op unless currently speaking.
    pub fn pause(&mut self) {
        let mut state = self.shared.lock_state();
        if *state != EngineState::Speaking || !self.shared.pause.pause() {
            return;
        }

        if let Err(e) = self.output.pause() {
            tracing::warn!(error = %e, "Failed to pause audio output");
        }
        self.shared.transition(&mut state, EngineState::Paused);
        tracing::info!(sentence = ?self.shared.current_sentence(), "Paused");
    }

    /// Resume after [`pause`](Self::pause), or replay from the current
    /// sentence when idle.
    ///
    /// A warm pause continues instantly from the device buffer. If the
    /// pipeline drained while paused, synthesis restarts at the current
    /// sentence. No-op while already speaking.
    pub fn resume(&mut self) -> Result<(), SpeechError> {
        if self.synth.is_none() {
            return Ok(());
        }

        {
            let mut state = self.shared.lock_state();
            match *state {
                EngineState::Paused => {
                    let previous = self.shared.pause.resume();
                    let consumer_alive = self
                        .session
                        .as_ref()
                        .is_some_and(|session| session.consumer_running());

                    if previous == PauseState::PausedWarm && consumer_alive {
                        if let Err(e) = self.output.play() {
                            tracing::warn!(error = %e, "Failed to resume audio output");
                        }
                        self.shared.transition(&mut state, EngineState::Speaking);
                        tracing::info!("Resumed (warm)");
                        return Ok(());
                    }
                }
                EngineState::Ready if !self.sentences.is_empty() => {}
                _ => return Ok(()),
            }
        }

        let index = self
            .shared
            .current_sentence()
            .unwrap_or(self.start_index)
            .min(self.sentences.len().saturating_sub(1));
        tracing::info!(index, "Resumed (cold)");
        self.halt_and_join();
        self.start_generation(index)
    }

    /// Stop playback and discard buffered audio.
    ///
    /// Always leaves the engine `Ready` (if initialized) with no current
    /// sentence. Safe to call when nothing is playing.
    pub fn stop(&mut self) {
        self.halt_and_join();
        self.shared.set_current_sentence(None);
        self.start_index = 0;
        if self.synth.is_some() {
            self.shared.set_state(EngineState::Ready);
        }
    }

    // ── Settings ───────────────────────────────────────────────────

    /// Change the voice for sentences synthesized from now on.
    pub fn set_voice(&mut self, voice: VoiceId) {
        let mut settings = self.shared.settings();
        settings.voice = voice.clamped();
        self.shared.set_settings(settings);
        tracing::debug!(voice = %settings.voice, "Voice changed");
    }

    /// Change the speaking rate for sentences synthesized from now on.
    pub fn set_speed(&mut self, speed: f32) {
        let mut settings = self.shared.settings();
        settings.speed = clamp_speed(speed);
        self.shared.set_settings(settings);
        tracing::debug!(speed = settings.speed, "Speed changed");
    }

    // ── Queries ────────────────────────────────────────────────────

    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    /// Index of the sentence currently audible, if any.
    pub fn current_sentence(&self) -> Option<usize> {
        self.shared.current_sentence()
    }

    pub fn sentence_count(&self) -> usize {
        self.sentences.len()
    }

    /// The current sentence list.
    pub fn sentences(&self) -> &[String] {
        &self.sentences
    }

    pub fn is_speaking(&self) -> bool {
        self.state() == EngineState::Speaking
    }

    pub fn is_initialized(&self) -> bool {
        self.synth.is_some()
    }

    pub fn voice(&self) -> VoiceId {
        self.shared.settings().voice
    }

    pub fn speed(&self) -> f32 {
        self.shared.settings().speed
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    // ── Internal helpers ───────────────────────────────────────────

    /// Start a new generation at `start_index`.
    fn start_generation(&mut self, start_index: usize) -> Result<(), SpeechError> {
        let Some(synth) = self.synth.clone() else {
            return Err(SpeechError::NotInitialized);
        };

        let generation = {
            let mut state = self.shared.lock_state();
            self.shared.pause.clear();
            let generation = self.shared.generation.advance();
            self.shared.transition(&mut state, EngineState::Speaking);
            generation
        };

        let session = Arc::new(Session::new(
            Arc::clone(&self.shared),
            generation,
            Arc::clone(&self.sentences),
            start_index,
        ));
        tracing::debug!(generation, start_index, "Starting generation");

        self.session = Some(Arc::clone(&session));
        self.start_index = start_index;

        let spawned = producer::spawn(Arc::clone(&session), synth, &self.output).and_then(|p| {
            self.producer = Some(p);
            consumer::spawn(session, Arc::clone(&self.output))
        });

        match spawned {
            Ok(c) => {
                self.consumer = Some(c);
                Ok(())
            }
            Err(e) => {
                tracing::error!(generation, error = %e, "Failed to start playback threads");
                self.halt_and_join();
                self.shared.set_state(EngineState::Ready);
                Err(e)
            }
        }
    }

    /// Stop the current generation: halt its threads, discard buffered
    /// audio and wait (bounded) for both threads to exit.
    fn halt_and_join(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        session.halt();
        self.shared.pause.clear();
        self.discard_output();
        let dropped = session.queue.clear();

        let deadline = Instant::now() + self.shared.config.join_timeout;
        join_until(self.producer.take(), "producer", session.generation, deadline);
        join_until(self.consumer.take(), "consumer", session.generation, deadline);

        // A consumer caught mid-write may have pushed audio after the first
        // flush.
        self.discard_output();
        tracing::debug!(generation = session.generation, dropped, "Generation stopped");
    }

    fn discard_output(&self) {
        if let Err(e) = self.output.pause().and_then(|()| self.output.flush()) {
            tracing::warn!(error = %e, "Failed to flush audio output");
        }
    }
}

/// Join `handle` unless `deadline` passes first, in which case the thread
/// is detached. A detached thread exits at its next generation check.
fn join_until(
    handle: Option<JoinHandle<()>>,
    task: &'static str,
    generation: u64,
    deadline: Instant,
) {
    let Some(handle) = handle else {
        return;
    };

    while !handle.is_finished() {
        if Instant::now() >= deadline {
            tracing::warn!(task, generation, "Thread did not stop in time; detaching");
            return;
        }
        thread::sleep(JOIN_POLL);
    }

    if handle.join().is_err() {
        tracing::warn!(task, generation, "Thread panicked");
    }
}

impl Drop for SpeechEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
