//! Producer: synthesizes sentences in order and feeds the chunk queue.

use std::sync::Arc;
use std::thread;

use crate::engine::SpeechEvent;
use crate::error::SpeechError;
use crate::output::AudioOutput;
use crate::queue::AudioChunk;
use crate::session::Session;
use crate::synth::{ChunkControl, Synthesizer};

/// How one sentence ended up.
enum SentenceOutcome {
    Queued,
    Failed,
    Superseded,
}

/// Start the producer thread for `session`.
pub(crate) fn spawn(
    session: Arc<Session>,
    synth: Arc<dyn Synthesizer>,
    output: &Arc<dyn AudioOutput>,
) -> Result<thread::JoinHandle<()>, SpeechError> {
    let min_buffer_frames = output.min_buffer_frames();
    thread::Builder::new()
        .name(format!("narrate-producer-{}", session.generation))
        .spawn(move || run(&session, synth.as_ref(), min_buffer_frames))
        .map_err(|source| SpeechError::Spawn {
            task: "producer",
            source,
        })
}

fn run(session: &Session, synth: &dyn Synthesizer, min_buffer_frames: usize) {
    let _running = session.producer_guard();
    let config = &session.shared.config;
    let is_live = || session.is_live();

    tracing::debug!(
        generation = session.generation,
        start = session.start_index,
        total = session.sentences.len(),
        "Producer started"
    );

    let mut attempted = 0usize;
    let mut failed = 0usize;

    for index in session.start_index..session.sentences.len() {
        if !is_live() {
            tracing::debug!(generation = session.generation, "Producer superseded");
            return;
        }
        if !session.shared.pause.wait_while_paused(is_live, config.pause_poll) {
            tracing::debug!(generation = session.generation, "Producer superseded while paused");
            return;
        }

        attempted += 1;
        match produce_sentence(session, synth, index) {
            SentenceOutcome::Queued => session.note_sentence_buffered(),
            SentenceOutcome::Failed => failed += 1,
            SentenceOutcome::Superseded => return,
        }
    }

    if !is_live() {
        return;
    }

    if attempted > 0 && failed == attempted {
        tracing::warn!(
            generation = session.generation,
            sentences = attempted,
            "Every sentence failed to synthesize"
        );
        session
            .shared
            .emit(SpeechEvent::Error("no sentence could be synthesized".to_string()));
    }

    let padding = config.end_silence_frames(synth.sample_rate(), min_buffer_frames);
    if session
        .queue
        .push(AudioChunk::end_padding(padding), is_live, config.queue_poll_timeout)
        && session
            .queue
            .push(AudioChunk::end_of_stream(), is_live, config.queue_poll_timeout)
    {
        tracing::debug!(
            generation = session.generation,
            padding_frames = padding,
            "Producer finished"
        );
    }
}

/// Synthesize sentence `index` and queue its audio.
fn produce_sentence(session: &Session, synth: &dyn Synthesizer, index: usize) -> SentenceOutcome {
    let text = &session.sentences[index];
    let settings = session.shared.settings();
    let poll = session.shared.config.queue_poll_timeout;
    let is_live = || session.is_live();

    if synth.supports_streaming() {
        let mut delivered = 0usize;
        let mut superseded = false;

        let mut on_chunk = |samples: &[f32]| {
            if !is_live() {
                superseded = true;
                return ChunkControl::Stop;
            }
            if samples.is_empty() {
                return ChunkControl::Continue;
            }
            if session
                .queue
                .push(AudioChunk::partial(index, samples.to_vec()), is_live, poll)
            {
                delivered += 1;
                ChunkControl::Continue
            } else {
                superseded = true;
                ChunkControl::Stop
            }
        };
        let result =
            synth.synthesize_streaming(text, settings.voice, settings.speed, &mut on_chunk);

        if superseded || !is_live() {
            return SentenceOutcome::Superseded;
        }

        match result {
            Ok(()) => {
                tracing::debug!(
                    generation = session.generation,
                    sentence = index,
                    chunks = delivered,
                    queued = session.queue.len(),
                    "Sentence streamed"
                );
                return close_sentence(session, index);
            }
            Err(e) if delivered > 0 => {
                // Part of the sentence is already queued; keep it rather than
                // synthesizing the whole sentence twice.
                tracing::warn!(
                    generation = session.generation,
                    sentence = index,
                    chunks = delivered,
                    error = %e,
                    "Streaming synthesis failed mid-sentence"
                );
                return close_sentence(session, index);
            }
            Err(e) => {
                tracing::debug!(
                    sentence = index,
                    error = %e,
                    "Streaming synthesis failed, falling back to blocking"
                );
            }
        }
    }

    match synth.synthesize(text, settings.voice, settings.speed) {
        Ok(samples) => {
            if !is_live() {
                return SentenceOutcome::Superseded;
            }
            let frames = samples.len();
            if session
                .queue
                .push(AudioChunk::whole(index, samples), is_live, poll)
            {
                tracing::debug!(
                    generation = session.generation,
                    sentence = index,
                    frames,
                    queued = session.queue.len(),
                    "Sentence synthesized"
                );
                SentenceOutcome::Queued
            } else {
                SentenceOutcome::Superseded
            }
        }
        Err(e) => {
            tracing::warn!(
                generation = session.generation,
                sentence = index,
                error = %e,
                "Sentence synthesis failed, skipping"
            );
            SentenceOutcome::Failed
        }
    }
}

fn close_sentence(session: &Session, index: usize) -> SentenceOutcome {
    let poll = session.shared.config.queue_poll_timeout;
    if session
        .queue
        .push(AudioChunk::sentence_end(index), || session.is_live(), poll)
    {
        SentenceOutcome::Queued
    } else {
        SentenceOutcome::Superseded
    }
}
