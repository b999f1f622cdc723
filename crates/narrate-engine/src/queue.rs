//! Audio chunks and the bounded queue that carries them from producer to
//! consumer.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, bounded};

/// One unit of queued PCM audio.
///
/// Created by the producer, moved through the queue, consumed by the
/// consumer. Never mutated in between.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Mono f32 samples at the synthesizer's rate. May be empty.
    pub samples: Vec<f32>,

    /// Sentence this audio belongs to; `None` for end-of-stream markers.
    pub sentence: Option<usize>,

    /// Last chunk of its sentence. Set exactly once per sentence.
    pub is_final_of_sentence: bool,

    /// Trailing silence appended after the last real sentence.
    pub is_end_padding: bool,
}

impl AudioChunk {
    /// A streamed sub-chunk in the middle of a sentence.
    #[must_use]
    pub const fn partial(sentence: usize, samples: Vec<f32>) -> Self {
        Self {
            samples,
            sentence: Some(sentence),
            is_final_of_sentence: false,
            is_end_padding: false,
        }
    }

    /// Empty marker closing a streamed sentence.
    #[must_use]
    pub const fn sentence_end(sentence: usize) -> Self {
        Self {
            samples: Vec::new(),
            sentence: Some(sentence),
            is_final_of_sentence: true,
            is_end_padding: false,
        }
    }

    /// A whole sentence from a blocking synthesis call.
    #[must_use]
    pub const fn whole(sentence: usize, samples: Vec<f32>) -> Self {
        Self {
            samples,
            sentence: Some(sentence),
            is_final_of_sentence: true,
            is_end_padding: false,
        }
    }

    /// `frames` of silence guarding the tail of the last sentence.
    #[must_use]
    pub fn end_padding(frames: usize) -> Self {
        Self {
            samples: vec![0.0; frames],
            sentence: None,
            is_final_of_sentence: false,
            is_end_padding: true,
        }
    }

    /// Zero-length sentinel: nothing more will arrive for this generation.
    #[must_use]
    pub const fn end_of_stream() -> Self {
        Self {
            samples: Vec::new(),
            sentence: None,
            is_final_of_sentence: false,
            is_end_padding: false,
        }
    }

    #[must_use]
    pub const fn is_end_of_stream(&self) -> bool {
        self.sentence.is_none() && !self.is_end_padding && self.samples.is_empty()
    }
}

/// Bounded FIFO between one producer and one consumer.
///
/// Both ends live in the same value; the per-generation session owns it,
/// so a new generation always starts with an empty queue.
#[derive(Debug)]
pub struct ChunkQueue {
    tx: Sender<AudioChunk>,
    rx: Receiver<AudioChunk>,
}

impl ChunkQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// Blocking put with backpressure.
    ///
    /// Waits in `poll` slices for free space, re-checking `is_live` between
    /// slices. Returns `false` (dropping the chunk) once the work is stale.
    pub fn push(&self, chunk: AudioChunk, is_live: impl Fn() -> bool, poll: Duration) -> bool {
        let mut chunk = chunk;
        loop {
            if !is_live() {
                return false;
            }
            match self.tx.send_timeout(chunk, poll) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(returned)) => chunk = returned,
                // Both ends are owned by `self`.
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }

    /// Take the next chunk, waiting at most `timeout`.
    pub fn poll(&self, timeout: Duration) -> Option<AudioChunk> {
        match self.rx.recv_timeout(timeout) {
            Ok(chunk) => Some(chunk),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Discard everything queued. Returns how many chunks were dropped.
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }
}
