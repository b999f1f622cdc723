//! Generation counter and pause gate: the two flags shared between the
//! control thread and the producer/consumer threads.
//!
//! The counter answers "is this work still wanted?" and the gate answers
//! "should this work proceed right now?". Keeping them separate lets a paused
//! pipeline idle in place instead of being torn down and re-synthesized.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// Identifier of one play request. Strictly increasing per engine.
pub type GenerationId = u64;

// ── Generation counter ─────────────────────────────────────────────

/// Monotonic counter naming the current play request.
///
/// Only the control thread advances it (on `speak`, `jump_to_sentence` and
/// cold resume). Background threads capture the value they were started
/// with and compare it on every loop iteration.
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    current: Arc<AtomicU64>,
}

impl GenerationCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate all in-flight work and return the new current generation.
    pub fn advance(&self) -> GenerationId {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    #[must_use]
    pub fn current(&self) -> GenerationId {
        self.current.load(Ordering::SeqCst)
    }

    /// Whether work tagged with `generation` is still wanted.
    #[must_use]
    pub fn is_current(&self, generation: GenerationId) -> bool {
        self.current() == generation
    }
}

// ── Pause gate ─────────────────────────────────────────────────────

/// Three-valued pause state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PauseState {
    /// Not paused.
    Running = 0,

    /// Paused with buffered audio and live threads: resume only un-pauses
    /// the output device.
    PausedWarm = 1,

    /// Paused, but the consumer has since exited: resume must restart
    /// synthesis from the current sentence.
    PausedCold = 2,
}

impl PauseState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::PausedWarm,
            2 => Self::PausedCold,
            _ => Self::Running,
        }
    }

    #[must_use]
    pub const fn is_paused(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Shared pause gate.
///
/// Written by the control thread (`pause`, `resume`, `clear`) and exactly
/// once per pause by the consumer (`mark_drained`). Every transition is a
/// single atomic operation, so the warm/cold decision in `resume` cannot
/// race with the consumer exiting.
#[derive(Debug, Clone)]
pub struct PauseGate {
    state: Arc<AtomicU8>,
}

impl PauseGate {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(PauseState::Running as u8)),
        }
    }

    #[must_use]
    pub fn state(&self) -> PauseState {
        PauseState::from_u8(self.state.load(Ordering::SeqCst))
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state().is_paused()
    }

    /// Enter a warm pause. Returns `false` if already paused.
    pub fn pause(&self) -> bool {
        self.state
            .compare_exchange(
                PauseState::Running as u8,
                PauseState::PausedWarm as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Leave any pause, returning the state that was replaced.
    pub fn resume(&self) -> PauseState {
        PauseState::from_u8(self.state.swap(PauseState::Running as u8, Ordering::SeqCst))
    }

    /// Force the gate open without inspecting the previous state.
    pub fn clear(&self) {
        self.state.store(PauseState::Running as u8, Ordering::SeqCst);
    }

    /// Record that the consumer exited during a warm pause.
    ///
    /// Returns `true` if the gate was warm-paused (and is now cold).
    pub fn mark_drained(&self) -> bool {
        self.state
            .compare_exchange(
                PauseState::PausedWarm as u8,
                PauseState::PausedCold as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Sleep in `poll` steps while paused.
    ///
    /// Returns `true` once the gate opens with `is_live` still holding, and
    /// `false` as soon as `is_live` reports the work was superseded.
    pub fn wait_while_paused(&self, is_live: impl Fn() -> bool, poll: Duration) -> bool {
        loop {
            if !is_live() {
                return false;
            }
            if !self.is_paused() {
                return true;
            }
            thread::sleep(poll);
        }
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}
