//! Shared mocks for the engine integration tests.
//!
//! [`ScriptedSynth`] stamps every sample it produces with a marker derived
//! from the sentence text ("Sentence 7." → 0.008), so tests can map the
//! audio written to the device back to sentence indices. [`RecordingOutput`]
//! records every write and simulates a playback head that only advances
//! while playing.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use narrate_engine::{
    AudioOutput, ChunkControl, EngineConfig, SpeechEngine, SpeechError, SpeechEvent, Synthesizer,
    VoiceId,
};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

pub const RATE: u32 = 24_000;
pub const FRAMES: usize = 240;
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

// ── Text helpers ───────────────────────────────────────────────────

/// "Sentence 0. Sentence 1. …" with `n` sentences.
pub fn numbered_text(n: usize) -> String {
    (0..n)
        .map(|i| format!("Sentence {i}."))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sample value stamped on audio for `text`.
#[allow(clippy::cast_precision_loss)]
pub fn marker_for(text: &str) -> f32 {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits
        .parse::<usize>()
        .map_or(0.5, |n| (n + 1) as f32 / 1000.0)
}

/// Sentence index encoded in a sample, `None` for silence.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn sentence_of(sample: f32) -> Option<usize> {
    if sample == 0.0 {
        None
    } else {
        Some((sample * 1000.0).round() as usize - 1)
    }
}

/// Collapse a written sample stream into its sequence of sentence runs.
pub fn sentence_runs(samples: &[f32]) -> Vec<(Option<usize>, usize)> {
    let mut runs: Vec<(Option<usize>, usize)> = Vec::new();
    for &s in samples {
        let sentence = sentence_of(s);
        match runs.last_mut() {
            Some((last, len)) if *last == sentence => *len += 1,
            _ => runs.push((sentence, 1)),
        }
    }
    runs
}

// ── Mock synthesizer ───────────────────────────────────────────────

type FailPredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Synthesizer with scripted timing, chunking and failures.
pub struct ScriptedSynth {
    rate: u32,
    streaming: bool,
    sub_chunks: usize,
    frames_per_chunk: usize,
    delay: Duration,
    broken_streaming: bool,
    fail_when: Option<FailPredicate>,
    calls: Mutex<Vec<String>>,
    early_stops: AtomicUsize,
}

impl ScriptedSynth {
    /// Whole-sentence synthesis, `FRAMES` frames per sentence.
    pub fn blocking() -> Self {
        Self {
            rate: RATE,
            streaming: false,
            sub_chunks: 1,
            frames_per_chunk: FRAMES,
            delay: Duration::ZERO,
            broken_streaming: false,
            fail_when: None,
            calls: Mutex::new(Vec::new()),
            early_stops: AtomicUsize::new(0),
        }
    }

    /// Streaming synthesis, `sub_chunks` pieces of `FRAMES` frames each.
    pub fn streaming(sub_chunks: usize) -> Self {
        Self {
            streaming: true,
            sub_chunks,
            ..Self::blocking()
        }
    }

    #[must_use]
    pub const fn with_rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    /// Delay per sub-chunk (streaming) or per sentence (blocking).
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Streaming calls fail before delivering anything.
    #[must_use]
    pub const fn with_broken_streaming(mut self) -> Self {
        self.broken_streaming = true;
        self
    }

    #[must_use]
    pub fn failing_when(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    /// Every text passed to either synthesis method, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Streaming calls abandoned because the callback returned `Stop`.
    pub fn early_stops(&self) -> usize {
        self.early_stops.load(Ordering::SeqCst)
    }

    /// Total frames produced for one sentence.
    pub const fn frames_per_sentence(&self) -> usize {
        self.frames_per_chunk * self.sub_chunks
    }

    fn check_failure(&self, text: &str) -> Result<(), SpeechError> {
        match &self.fail_when {
            Some(fails) if fails(text) => Err(SpeechError::SynthesisError(format!(
                "scripted failure for {text:?}"
            ))),
            _ => Ok(()),
        }
    }
}

impl Synthesizer for ScriptedSynth {
    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn synthesize(&self, text: &str, _voice: VoiceId, _speed: f32) -> Result<Vec<f32>, SpeechError> {
        self.calls.lock().push(text.to_string());
        thread::sleep(self.delay);
        self.check_failure(text)?;
        Ok(vec![marker_for(text); self.frames_per_sentence()])
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    fn synthesize_streaming(
        &self,
        text: &str,
        _voice: VoiceId,
        _speed: f32,
        on_chunk: &mut dyn FnMut(&[f32]) -> ChunkControl,
    ) -> Result<(), SpeechError> {
        self.calls.lock().push(text.to_string());
        if self.broken_streaming {
            return Err(SpeechError::SynthesisError("streaming backend crashed".into()));
        }
        self.check_failure(text)?;

        let chunk = vec![marker_for(text); self.frames_per_chunk];
        for _ in 0..self.sub_chunks {
            thread::sleep(self.delay);
            if on_chunk(&chunk) == ChunkControl::Stop {
                self.early_stops.fetch_add(1, Ordering::SeqCst);
                return Ok(());
            }
        }
        Ok(())
    }
}

// ── Mock output device ─────────────────────────────────────────────

#[derive(Default)]
struct DeviceState {
    written: Vec<f32>,
    pending: u64,
    consumed: u64,
    playing: bool,
    /// Unplayed frames discarded by each flush, in order.
    flushes: Vec<u64>,
    plays: usize,
    /// Consecutive `frames_consumed` calls that found nothing left to play.
    drained_checks: usize,
}

/// Records writes; the playhead advances `consume_step` frames per
/// `frames_consumed` call while playing.
pub struct RecordingOutput {
    rate: u32,
    min_buffer: usize,
    write_delay: Duration,
    consume_step: AtomicU64,
    state: Mutex<DeviceState>,
    hold_armed: AtomicBool,
    held: AtomicBool,
    released: AtomicBool,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self {
            rate: RATE,
            min_buffer: 0,
            write_delay: Duration::ZERO,
            consume_step: AtomicU64::new(u64::MAX),
            state: Mutex::new(DeviceState::default()),
            hold_armed: AtomicBool::new(false),
            held: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn with_rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    #[must_use]
    pub const fn with_min_buffer(mut self, frames: usize) -> Self {
        self.min_buffer = frames;
        self
    }

    /// Sleep this long inside every `write`, like a device with a full buffer.
    #[must_use]
    pub const fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    /// Frames the playhead advances per poll. Zero freezes it.
    pub fn set_consume_step(&self, step: u64) {
        self.consume_step.store(step, Ordering::SeqCst);
    }

    /// Park the caller of the second consecutive `frames_consumed` that
    /// finds the device empty, i.e. the consumer's completion check after
    /// the drain wait, until [`release`](Self::release). Fires once.
    pub fn hold_before_completion(&self) {
        self.hold_armed.store(true, Ordering::SeqCst);
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    pub fn written(&self) -> Vec<f32> {
        self.state.lock().written.clone()
    }

    /// Number of samples written so far; a bookmark for `written_since`.
    pub fn mark(&self) -> usize {
        self.state.lock().written.len()
    }

    pub fn written_since(&self, mark: usize) -> Vec<f32> {
        self.state.lock().written[mark..].to_vec()
    }

    pub fn flushes(&self) -> Vec<u64> {
        self.state.lock().flushes.clone()
    }

    pub fn plays(&self) -> usize {
        self.state.lock().plays
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn consumed(&self) -> u64 {
        self.state.lock().consumed
    }
}

impl AudioOutput for RecordingOutput {
    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn min_buffer_frames(&self) -> usize {
        self.min_buffer
    }

    fn play(&self) -> Result<(), SpeechError> {
        let mut state = self.state.lock();
        state.playing = true;
        state.plays += 1;
        Ok(())
    }

    fn pause(&self) -> Result<(), SpeechError> {
        self.state.lock().playing = false;
        Ok(())
    }

    fn stop(&self) -> Result<(), SpeechError> {
        let mut state = self.state.lock();
        state.playing = false;
        state.pending = 0;
        Ok(())
    }

    fn flush(&self) -> Result<(), SpeechError> {
        let mut state = self.state.lock();
        let pending = state.pending;
        state.flushes.push(pending);
        state.pending = 0;
        Ok(())
    }

    fn write(&self, samples: &[f32]) -> Result<usize, SpeechError> {
        thread::sleep(self.write_delay);
        let mut state = self.state.lock();
        state.written.extend_from_slice(samples);
        state.pending += samples.len() as u64;
        state.drained_checks = 0;
        Ok(samples.len())
    }

    fn frames_consumed(&self) -> u64 {
        let (consumed, hold) = {
            let mut state = self.state.lock();
            if state.playing {
                let step = self.consume_step.load(Ordering::SeqCst).min(state.pending);
                state.pending -= step;
                state.consumed += step;
            }
            if state.pending == 0 && !state.written.is_empty() {
                state.drained_checks += 1;
            }
            let hold = state.drained_checks >= 2 && self.hold_armed.swap(false, Ordering::SeqCst);
            (state.consumed, hold)
        };

        if hold {
            self.held.store(true, Ordering::SeqCst);
            while !self.released.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
        }
        consumed
    }
}

// ── Engine helpers ─────────────────────────────────────────────────

/// Tight timings so tests finish quickly.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        prebuffer_poll: Duration::from_millis(1),
        prebuffer_max_polls: 500,
        queue_poll_timeout: Duration::from_millis(2),
        pause_poll: Duration::from_millis(2),
        end_silence: Duration::from_millis(10),
        drain_poll: Duration::from_millis(1),
        drain_max_polls: 5_000,
        join_timeout: Duration::from_secs(2),
        warm_up_text: String::new(),
        ..EngineConfig::default()
    }
}

/// Engine wired to the given mocks, already initialized.
pub fn ready_engine(
    config: EngineConfig,
    synth: &Arc<ScriptedSynth>,
    output: &Arc<RecordingOutput>,
) -> (SpeechEngine, UnboundedReceiver<SpeechEvent>) {
    let (mut engine, mut events) = new_engine(config, synth, output);
    engine.initialize().expect("initialize");
    drain_events(&mut events);
    (engine, events)
}

/// Engine wired to the given mocks, not yet initialized.
pub fn new_engine(
    config: EngineConfig,
    synth: &Arc<ScriptedSynth>,
    output: &Arc<RecordingOutput>,
) -> (SpeechEngine, UnboundedReceiver<SpeechEvent>) {
    let synth = Arc::clone(synth);
    let loader = move || -> Result<Arc<dyn Synthesizer>, SpeechError> {
        Ok(Arc::clone(&synth) as Arc<dyn Synthesizer>)
    };
    let output: Arc<dyn AudioOutput> = Arc::clone(output) as Arc<dyn AudioOutput>;
    SpeechEngine::new(config, loader, output).expect("valid config")
}

/// Drain all pending events from the event receiver and return them.
pub fn drain_events(rx: &mut UnboundedReceiver<SpeechEvent>) -> Vec<SpeechEvent> {
    let mut events = Vec::new();
    while let Ok(e) = rx.try_recv() {
        events.push(e);
    }
    events
}

/// Collect events until one matches `done` (inclusive). Panics on timeout.
pub fn wait_for(
    rx: &mut UnboundedReceiver<SpeechEvent>,
    done: impl Fn(&SpeechEvent) -> bool,
) -> Vec<SpeechEvent> {
    let deadline = Instant::now() + EVENT_TIMEOUT;
    let mut events = Vec::new();
    loop {
        while let Ok(event) = rx.try_recv() {
            let finished = done(&event);
            events.push(event);
            if finished {
                return events;
            }
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for event; got {events:?}"
        );
        thread::sleep(Duration::from_millis(1));
    }
}

pub fn wait_for_completion(rx: &mut UnboundedReceiver<SpeechEvent>) -> Vec<SpeechEvent> {
    wait_for(rx, |e| *e == SpeechEvent::PlaybackComplete)
}

/// Collect events for a fixed period.
pub fn collect_for(rx: &mut UnboundedReceiver<SpeechEvent>, period: Duration) -> Vec<SpeechEvent> {
    thread::sleep(period);
    drain_events(rx)
}

pub fn started(events: &[SpeechEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            SpeechEvent::SentenceStarted(i) => Some(*i),
            _ => None,
        })
        .collect()
}

pub fn completed(events: &[SpeechEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            SpeechEvent::SentenceCompleted(i) => Some(*i),
            _ => None,
        })
        .collect()
}

pub fn count(events: &[SpeechEvent], wanted: &SpeechEvent) -> usize {
    events.iter().filter(|e| *e == wanted).count()
}
