//! State shared between the control thread and the background threads.
//!
//! [`Shared`] lives as long as the engine. [`Session`] lives for one
//! generation: it owns that generation's queue and liveness flags, so a
//! superseded producer can never feed the next generation's consumer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::config::{EngineConfig, VoiceSettings};
use crate::engine::{EngineState, SpeechEvent};
use crate::generation::{GenerationCounter, GenerationId, PauseGate};
use crate::queue::ChunkQueue;

const NO_SENTENCE: usize = usize::MAX;

// ── Engine-wide state ──────────────────────────────────────────────

pub(crate) struct Shared {
    pub config: EngineConfig,
    pub generation: GenerationCounter,
    pub pause: PauseGate,
    state: Mutex<EngineState>,
    current_sentence: AtomicUsize,
    settings: Mutex<VoiceSettings>,
    events: mpsc::UnboundedSender<SpeechEvent>,
}

impl Shared {
    pub fn new(
        config: EngineConfig,
        events: mpsc::UnboundedSender<SpeechEvent>,
    ) -> Self {
        let settings = VoiceSettings::new(config.voice, config.speed);
        Self {
            config,
            generation: GenerationCounter::new(),
            pause: PauseGate::new(),
            state: Mutex::new(EngineState::Uninitialized),
            current_sentence: AtomicUsize::new(NO_SENTENCE),
            settings: Mutex::new(settings),
            events,
        }
    }

    /// Send an event to the listener. A dropped receiver is not an error.
    pub fn emit(&self, event: SpeechEvent) {
        let _ = self.events.send(event);
    }

    pub fn state(&self) -> EngineState {
        self.state.lock().clone()
    }

    /// Lock the state for a check-then-transition sequence.
    pub fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock()
    }

    /// Transition under an already-held lock, emitting `StateChanged` if the
    /// state actually changed.
    pub fn transition(&self, state: &mut EngineState, next: EngineState) {
        if *state != next {
            tracing::debug!(from = ?*state, to = ?next, "Engine state transition");
            *state = next.clone();
            self.emit(SpeechEvent::StateChanged(next));
        }
    }

    pub fn set_state(&self, next: EngineState) {
        let mut state = self.state.lock();
        self.transition(&mut state, next);
    }

    pub fn current_sentence(&self) -> Option<usize> {
        match self.current_sentence.load(Ordering::SeqCst) {
            NO_SENTENCE => None,
            index => Some(index),
        }
    }

    pub fn set_current_sentence(&self, index: Option<usize>) {
        self.current_sentence
            .store(index.unwrap_or(NO_SENTENCE), Ordering::SeqCst);
    }

    pub fn settings(&self) -> VoiceSettings {
        *self.settings.lock()
    }

    pub fn set_settings(&self, settings: VoiceSettings) {
        *self.settings.lock() = settings;
    }
}

// ── Per-generation state ───────────────────────────────────────────

pub(crate) struct Session {
    pub generation: GenerationId,
    pub sentences: Arc<[String]>,
    pub start_index: usize,
    pub queue: ChunkQueue,
    pub shared: Arc<Shared>,
    halted: AtomicBool,
    sentences_buffered: AtomicUsize,
    producer_running: AtomicBool,
    consumer_running: AtomicBool,
}

impl Session {
    pub fn new(
        shared: Arc<Shared>,
        generation: GenerationId,
        sentences: Arc<[String]>,
        start_index: usize,
    ) -> Self {
        Self {
            generation,
            sentences,
            start_index,
            queue: ChunkQueue::new(shared.config.queue_capacity),
            shared,
            halted: AtomicBool::new(false),
            sentences_buffered: AtomicUsize::new(0),
            // Both start "running" so the consumer never mistakes a producer
            // that has not been scheduled yet for one that already finished.
            producer_running: AtomicBool::new(true),
            consumer_running: AtomicBool::new(true),
        }
    }

    /// Whether this generation's work is still wanted.
    pub fn is_live(&self) -> bool {
        !self.halted.load(Ordering::SeqCst) && self.shared.generation.is_current(self.generation)
    }

    /// Ask both threads to exit at their next check.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }

    pub fn sentences_buffered(&self) -> usize {
        self.sentences_buffered.load(Ordering::SeqCst)
    }

    pub fn note_sentence_buffered(&self) {
        self.sentences_buffered.fetch_add(1, Ordering::SeqCst);
    }

    pub fn producer_running(&self) -> bool {
        self.producer_running.load(Ordering::SeqCst)
    }

    pub fn consumer_running(&self) -> bool {
        self.consumer_running.load(Ordering::SeqCst)
    }

    pub fn producer_guard(&self) -> RunningGuard<'_> {
        RunningGuard(&self.producer_running)
    }

    pub fn consumer_guard(&self) -> RunningGuard<'_> {
        RunningGuard(&self.consumer_running)
    }
}

/// Clears a running flag when the owning thread exits, including by panic.
pub(crate) struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
