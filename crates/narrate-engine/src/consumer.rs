//! Consumer: drains the chunk queue into the audio output in order,
//! announcing sentence boundaries as they become audible.

use std::sync::Arc;
use std::thread;

use crate::engine::{EngineState, SpeechEvent};
use crate::error::SpeechError;
use crate::output::AudioOutput;
use crate::session::Session;

/// Why the main loop ended.
enum Exit {
    /// Every chunk of the generation has been written.
    Drained,
    /// A newer generation (or a stop) took over.
    Superseded,
}

/// Start the consumer thread for `session`.
pub(crate) fn spawn(
    session: Arc<Session>,
    output: Arc<dyn AudioOutput>,
) -> Result<thread::JoinHandle<()>, SpeechError> {
    thread::Builder::new()
        .name(format!("narrate-consumer-{}", session.generation))
        .spawn(move || run(&session, output.as_ref()))
        .map_err(|source| SpeechError::Spawn {
            task: "consumer",
            source,
        })
}

fn run(session: &Session, output: &dyn AudioOutput) {
    let _running = session.consumer_guard();
    let shared = &session.shared;
    let config = &shared.config;

    prebuffer(session);

    if session.is_live() && !shared.pause.is_paused() {
        if let Err(e) = output.play() {
            tracing::warn!(error = %e, "Failed to start audio output");
        }
    }

    let baseline = output.frames_consumed();
    let mut written: u64 = 0;
    let mut announced: Option<usize> = None;
    let mut queue_low = false;
    let mut drain_timed_out = false;

    let exit = loop {
        if !session.is_live() {
            break Exit::Superseded;
        }
        // Paused: leave the queue untouched so resume can continue from it.
        if shared.pause.is_paused() {
            thread::sleep(config.pause_poll);
            continue;
        }

        let Some(chunk) = session.queue.poll(config.queue_poll_timeout) else {
            if !session.producer_running() && session.queue.is_empty() {
                break Exit::Drained;
            }
            continue;
        };

        if !session.is_live() {
            break Exit::Superseded;
        }
        if chunk.is_end_of_stream() {
            break Exit::Drained;
        }

        if let Some(index) = chunk.sentence {
            if announced != Some(index) {
                announced = Some(index);
                shared.set_current_sentence(Some(index));
                shared.emit(SpeechEvent::SentenceStarted(index));
                tracing::debug!(generation = session.generation, sentence = index, "Sentence started");
            }
        }

        if !chunk.samples.is_empty() {
            match output.write(&chunk.samples) {
                Ok(frames) => written += frames as u64,
                Err(e) => tracing::warn!(error = %e, "Audio output write failed"),
            }
        }

        if chunk.is_final_of_sentence && session.is_live() {
            if let Some(index) = chunk.sentence {
                shared.emit(SpeechEvent::SentenceCompleted(index));
            }
        }

        // The end-of-stream marker stays queued until the tail has played,
        // so a pause in this wait is still a warm pause.
        if chunk.is_end_padding
            && await_drain(session, output, baseline + written) == Drain::TimedOut
        {
            drain_timed_out = true;
        }

        let queued = session.queue.len();
        let low = queued <= config.low_queue_warning
            && session.producer_running()
            && !shared.pause.is_paused();
        if low && !queue_low {
            tracing::warn!(generation = session.generation, queued, "Audio queue running low");
        }
        queue_low = low;
    };

    match exit {
        Exit::Superseded => {
            let dropped = session.queue.clear();
            tracing::debug!(generation = session.generation, dropped, "Consumer superseded");
        }
        Exit::Drained => finish(session, output, baseline + written, drain_timed_out),
    }
}

/// Hold off starting the device until a few sentences are ready.
fn prebuffer(session: &Session) {
    let config = &session.shared.config;
    let mut polls = 0;

    while polls < config.prebuffer_max_polls {
        if session.sentences_buffered() >= config.prebuffer_sentences
            || !session.producer_running()
            || !session.is_live()
            || session.shared.pause.is_paused()
        {
            break;
        }
        thread::sleep(config.prebuffer_poll);
        polls += 1;
    }

    tracing::debug!(
        generation = session.generation,
        buffered = session.sentences_buffered(),
        polls,
        "Pre-buffer complete"
    );
}

#[derive(Debug, PartialEq, Eq)]
enum Drain {
    Complete,
    Superseded,
    TimedOut,
}

/// Wait until the device has played `target` frames.
///
/// Gives up early if the generation is superseded, and after
/// `drain_max_polls` polls. Time spent paused does not count against the
/// poll budget.
fn await_drain(session: &Session, output: &dyn AudioOutput, target: u64) -> Drain {
    let config = &session.shared.config;
    let mut polls = 0;

    loop {
        let consumed = output.frames_consumed();
        if consumed >= target {
            tracing::debug!(generation = session.generation, consumed, target, "Output drained");
            return Drain::Complete;
        }
        if !session.is_live() {
            return Drain::Superseded;
        }
        if session.shared.pause.is_paused() {
            thread::sleep(config.pause_poll);
            continue;
        }
        if polls >= config.drain_max_polls {
            tracing::warn!(
                generation = session.generation,
                consumed,
                target,
                "Output did not drain in time"
            );
            return Drain::TimedOut;
        }
        thread::sleep(config.drain_poll);
        polls += 1;
    }
}

/// Complete the generation, or hand it over to a cold resume if a pause
/// arrived after the end-of-stream marker was taken.
///
/// The pause check and the `Ready` transition happen under the state lock,
/// so `pause()` either lands before (and the pause turns cold) or finds the
/// engine already `Ready`. The device is queried before taking the lock.
fn finish(session: &Session, output: &dyn AudioOutput, target: u64, mut gave_up: bool) {
    let shared = &session.shared;

    loop {
        let drained = gave_up || output.frames_consumed() >= target;
        {
            let mut state = shared.lock_state();
            if !session.is_live() {
                return;
            }

            if shared.pause.is_paused() {
                shared.pause.mark_drained();
                tracing::debug!(
                    generation = session.generation,
                    sentence = ?shared.current_sentence(),
                    "Consumer exited while paused; resume will restart synthesis"
                );
                return;
            }

            if drained {
                if let Err(e) = output.pause().and_then(|()| output.flush()) {
                    tracing::warn!(error = %e, "Failed to release audio output");
                }
                shared.transition(&mut state, EngineState::Ready);
                shared.emit(SpeechEvent::PlaybackComplete);
                tracing::info!(generation = session.generation, "Playback complete");
                return;
            }
        }

        // Not drained yet (the marker arrived without end padding, or a
        // pause and resume raced the drain wait): wait for the tail.
        match await_drain(session, output, target) {
            Drain::Complete => {}
            Drain::Superseded => return,
            Drain::TimedOut => gave_up = true,
        }
    }
}
