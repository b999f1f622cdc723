//! Integration tests for end-to-end playback through `SpeechEngine`.
//!
//! A scripted synthesizer stamps each sentence's audio with a marker value
//! and a recording device captures every write, so the tests can check
//! exactly which sentence's audio reached the output and in which order.
//!
//! # What is tested
//!
//! - Sentence ordering and notification order
//! - Completion only after the device has played everything written
//! - End-of-utterance silence padding
//! - Per-sentence failures are skipped, total failure is reported
//! - Streaming synthesis with fallback to whole-sentence synthesis
//! - Voice and speed settings reach the synthesizer

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use common::{
    FRAMES, RecordingOutput, ScriptedSynth, completed, count, fast_config, numbered_text,
    ready_engine, sentence_runs, started, wait_for, wait_for_completion,
};
use narrate_engine::{
    AudioOutput, EngineConfig, EngineState, SpeechEngine, SpeechError, SpeechEvent, Synthesizer,
    VoiceId,
};

// ── Basic playback ─────────────────────────────────────────────────

#[test]
fn two_sentences_play_in_order_and_complete_once() {
    let synth = Arc::new(ScriptedSynth::blocking());
    let output = Arc::new(RecordingOutput::new());
    let (mut engine, mut events) = ready_engine(fast_config(), &synth, &output);

    engine
        .speak("Hello there. How are you today?", VoiceId(0), 1.0)
        .unwrap();
    assert_eq!(engine.sentence_count(), 2);
    assert_eq!(engine.sentences(), ["Hello there.", "How are you today?"]);

    let events = wait_for_completion(&mut events);
    let sentence_events: Vec<&SpeechEvent> = events
        .iter()
        .filter(|e| !matches!(e, SpeechEvent::StateChanged(_)))
        .collect();
    assert_eq!(
        sentence_events,
        [
            &SpeechEvent::SentenceStarted(0),
            &SpeechEvent::SentenceCompleted(0),
            &SpeechEvent::SentenceStarted(1),
            &SpeechEvent::SentenceCompleted(1),
            &SpeechEvent::PlaybackComplete,
        ]
    );
    assert_eq!(count(&events, &SpeechEvent::PlaybackComplete), 1);
    assert_eq!(engine.state(), EngineState::Ready);
    assert!(!engine.is_speaking());
}

#[test]
fn speaking_state_is_reported_before_audio() {
    let synth = Arc::new(ScriptedSynth::blocking());
    let output = Arc::new(RecordingOutput::new());
    let (mut engine, mut events) = ready_engine(fast_config(), &synth, &output);

    engine.speak(&numbered_text(2), VoiceId::DEFAULT, 1.0).unwrap();

    let events = wait_for_completion(&mut events);
    assert_eq!(
        events.first(),
        Some(&SpeechEvent::StateChanged(EngineState::Speaking))
    );
    let ready_at = events
        .iter()
        .position(|e| *e == SpeechEvent::StateChanged(EngineState::Ready))
        .expect("engine returns to Ready");
    let complete_at = events
        .iter()
        .position(|e| *e == SpeechEvent::PlaybackComplete)
        .unwrap();
    assert!(ready_at < complete_at);
}

#[test]
fn sentence_notifications_are_strictly_increasing() {
    let synth = Arc::new(ScriptedSynth::streaming(3));
    let output = Arc::new(RecordingOutput::new());
    let (mut engine, mut events) = ready_engine(fast_config(), &synth, &output);

    engine.speak(&numbered_text(8), VoiceId::DEFAULT, 1.0).unwrap();
    let events = wait_for_completion(&mut events);

    assert_eq!(started(&events), (0..8).collect::<Vec<_>>());
    assert_eq!(completed(&events), (0..8).collect::<Vec<_>>());

    // Every completion follows its own start.
    for i in 0..8 {
        let start = events
            .iter()
            .position(|e| *e == SpeechEvent::SentenceStarted(i))
            .unwrap();
        let done = events
            .iter()
            .position(|e| *e == SpeechEvent::SentenceCompleted(i))
            .unwrap();
        assert!(start < done, "sentence {i} completed before it started");
    }
    assert_eq!(engine.current_sentence(), Some(7));
}

#[test]
fn written_audio_matches_sentence_order() {
    let synth = Arc::new(ScriptedSynth::blocking());
    let output = Arc::new(RecordingOutput::new());
    let (mut engine, mut events) = ready_engine(fast_config(), &synth, &output);

    engine.speak(&numbered_text(4), VoiceId::DEFAULT, 1.0).unwrap();
    wait_for_completion(&mut events);

    // 10 ms of silence at 24 kHz closes the utterance.
    assert_eq!(
        sentence_runs(&output.written()),
        [
            (Some(0), FRAMES),
            (Some(1), FRAMES),
            (Some(2), FRAMES),
            (Some(3), FRAMES),
            (None, 240),
        ]
    );
}

// ── End of stream ──────────────────────────────────────────────────

#[test]
fn completion_waits_for_device_to_play_everything() {
    let synth = Arc::new(ScriptedSynth::blocking());
    let output = Arc::new(RecordingOutput::new());
    // Slow playhead: 100 frames per poll.
    output.set_consume_step(100);
    let (mut engine, mut events) = ready_engine(fast_config(), &synth, &output);

    engine.speak(&numbered_text(3), VoiceId::DEFAULT, 1.0).unwrap();
    wait_for_completion(&mut events);

    let written = output.written().len() as u64;
    assert!(
        output.consumed() >= written,
        "completed after {} of {written} frames",
        output.consumed()
    );
    // The final flush found nothing left to discard.
    assert_eq!(output.flushes().last(), Some(&0));
    assert!(!output.is_playing());
}

#[test]
fn end_padding_covers_device_buffer() {
    let synth = Arc::new(ScriptedSynth::blocking());
    let output = Arc::new(RecordingOutput::new().with_min_buffer(1_000));
    let (mut engine, mut events) = ready_engine(fast_config(), &synth, &output);

    engine.speak(&numbered_text(1), VoiceId::DEFAULT, 1.0).unwrap();
    wait_for_completion(&mut events);

    assert_eq!(
        sentence_runs(&output.written()),
        [(Some(0), FRAMES), (None, 1_000)]
    );
}

#[test]
fn stuck_device_still_completes_after_drain_timeout() {
    let synth = Arc::new(ScriptedSynth::blocking());
    let output = Arc::new(RecordingOutput::new());
    output.set_consume_step(0);
    let config = EngineConfig {
        drain_max_polls: 20,
        ..fast_config()
    };
    let (mut engine, mut events) = ready_engine(config, &synth, &output);

    engine.speak(&numbered_text(2), VoiceId::DEFAULT, 1.0).unwrap();
    let events = wait_for_completion(&mut events);

    assert_eq!(completed(&events), [0, 1]);
    assert_eq!(engine.state(), EngineState::Ready);
    // The unplayed tail is discarded.
    assert!(output.flushes().last().copied().unwrap_or(0) > 0);
}

// ── Synthesis failures ─────────────────────────────────────────────

#[test]
fn failed_sentence_is_skipped() {
    let synth = Arc::new(ScriptedSynth::blocking().failing_when(|text| text.contains('1')));
    let output = Arc::new(RecordingOutput::new());
    let (mut engine, mut events) = ready_engine(fast_config(), &synth, &output);

    engine.speak(&numbered_text(3), VoiceId::DEFAULT, 1.0).unwrap();
    let events = wait_for_completion(&mut events);

    assert_eq!(started(&events), [0, 2]);
    assert!(
        !events.iter().any(|e| matches!(e, SpeechEvent::Error(_))),
        "a single failed sentence is not an error: {events:?}"
    );
    let runs = sentence_runs(&output.written());
    assert!(runs.iter().all(|(sentence, _)| *sentence != Some(1)));
}

#[test]
fn all_sentences_failing_reports_error_then_completes() {
    let synth = Arc::new(ScriptedSynth::blocking().failing_when(|_| true));
    let output = Arc::new(RecordingOutput::new());
    let (mut engine, mut events) = ready_engine(fast_config(), &synth, &output);

    engine.speak(&numbered_text(3), VoiceId::DEFAULT, 1.0).unwrap();
    let events = wait_for_completion(&mut events);

    let error_at = events
        .iter()
        .position(|e| matches!(e, SpeechEvent::Error(_)))
        .expect("error notification");
    let complete_at = events
        .iter()
        .position(|e| *e == SpeechEvent::PlaybackComplete)
        .unwrap();
    assert!(error_at < complete_at);
    assert_eq!(
        events[error_at],
        SpeechEvent::Error("no sentence could be synthesized".into())
    );
    assert!(started(&events).is_empty());
    assert_eq!(engine.state(), EngineState::Ready);
}

#[test]
fn broken_streaming_falls_back_to_whole_sentence() {
    let synth = Arc::new(ScriptedSynth::streaming(4).with_broken_streaming());
    let output = Arc::new(RecordingOutput::new());
    let (mut engine, mut events) = ready_engine(fast_config(), &synth, &output);

    engine.speak(&numbered_text(2), VoiceId::DEFAULT, 1.0).unwrap();
    let events = wait_for_completion(&mut events);

    assert_eq!(started(&events), [0, 1]);
    // One streaming attempt and one blocking retry per sentence.
    assert_eq!(
        synth.calls(),
        ["Sentence 0.", "Sentence 0.", "Sentence 1.", "Sentence 1."]
    );
    assert_eq!(
        sentence_runs(&output.written())[..2],
        [(Some(0), FRAMES * 4), (Some(1), FRAMES * 4)]
    );
}

#[test]
fn streaming_sub_chunks_are_played_contiguously() {
    let synth = Arc::new(ScriptedSynth::streaming(5));
    let output = Arc::new(RecordingOutput::new());
    let (mut engine, mut events) = ready_engine(fast_config(), &synth, &output);

    engine.speak(&numbered_text(2), VoiceId::DEFAULT, 1.0).unwrap();
    wait_for_completion(&mut events);

    assert_eq!(synth.calls(), ["Sentence 0.", "Sentence 1."]);
    assert_eq!(
        sentence_runs(&output.written()),
        [(Some(0), FRAMES * 5), (Some(1), FRAMES * 5), (None, 240)]
    );
}

// ── Settings reach the synthesizer ─────────────────────────────────

/// Records the voice and speed of the last call.
struct SettingsRecorder {
    voice: AtomicU32,
    speed_bits: AtomicU32,
}

impl Synthesizer for SettingsRecorder {
    fn sample_rate(&self) -> u32 {
        common::RATE
    }

    fn synthesize(&self, _text: &str, voice: VoiceId, speed: f32) -> Result<Vec<f32>, SpeechError> {
        self.voice.store(voice.0, Ordering::SeqCst);
        self.speed_bits.store(speed.to_bits(), Ordering::SeqCst);
        Ok(vec![0.25; 48])
    }
}

#[test]
fn voice_and_speed_are_clamped_and_forwarded() {
    let recorder = Arc::new(SettingsRecorder {
        voice: AtomicU32::new(u32::MAX),
        speed_bits: AtomicU32::new(0),
    });
    let loader_recorder = Arc::clone(&recorder);
    let loader = move || -> Result<Arc<dyn Synthesizer>, SpeechError> {
        Ok(Arc::clone(&loader_recorder) as Arc<dyn Synthesizer>)
    };
    let output: Arc<dyn AudioOutput> = Arc::new(RecordingOutput::new());
    let (mut engine, mut events) =
        SpeechEngine::new(fast_config(), loader, output).unwrap();
    engine.initialize().unwrap();

    engine.speak("One sentence.", VoiceId(42), 9.0).unwrap();
    wait_for_completion(&mut events);

    assert_eq!(engine.voice(), VoiceId(10));
    assert!((engine.speed() - 2.0).abs() < f32::EPSILON);
    assert_eq!(recorder.voice.load(Ordering::SeqCst), 10);
    assert!((f32::from_bits(recorder.speed_bits.load(Ordering::SeqCst)) - 2.0).abs() < f32::EPSILON);

    engine.set_speed(0.1);
    engine.set_voice(VoiceId(3));
    assert!((engine.speed() - 0.5).abs() < f32::EPSILON);
    assert_eq!(engine.voice(), VoiceId(3));

    engine.jump_to_sentence(0).unwrap();
    wait_for(&mut events, |e| *e == SpeechEvent::PlaybackComplete);
    assert_eq!(recorder.voice.load(Ordering::SeqCst), 3);
    assert!((f32::from_bits(recorder.speed_bits.load(Ordering::SeqCst)) - 0.5).abs() < f32::EPSILON);
}
