//! Local speaker output via `rodio`, on a dedicated audio thread.
//!
//! `rodio::OutputStream` is `!Send` on some platforms (macOS CoreAudio,
//! etc.). Rather than `unsafe impl Send`, the stream and its sink are
//! confined to one OS thread and driven through [`AudioCommand`]s. The
//! public [`SpeakerOutput`] is the `Send + Sync` proxy the engine holds.
//!
//! rodio has no notion of a bounded device buffer or a playback head, so
//! both are emulated: every appended buffer is wrapped in a
//! [`CountingSource`] that bumps a shared counter for each sample the mixer
//! pulls, and `write` blocks while more than `buffer_frames` appended
//! frames are still unplayed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink, Source};

use crate::error::SpeechError;
use crate::output::AudioOutput;

/// Emulated device buffer: ~85 ms at 24 kHz.
pub const DEFAULT_BUFFER_FRAMES: usize = 2_048;

const WRITE_RETRY: Duration = Duration::from_millis(5);

// ── Commands ───────────────────────────────────────────────────────

enum AudioCommand {
    Play {
        reply: mpsc::Sender<Result<(), SpeechError>>,
    },
    Pause {
        reply: mpsc::Sender<Result<(), SpeechError>>,
    },
    /// Drop every queued source (rodio also pauses the sink).
    Clear {
        reply: mpsc::Sender<Result<(), SpeechError>>,
    },
    Append {
        samples: Vec<f32>,
        reply: mpsc::Sender<Result<(), SpeechError>>,
    },
    Shutdown,
}

// ── Frame-counting source ──────────────────────────────────────────

/// Pass-through source that counts the samples the mixer has pulled.
struct CountingSource<S> {
    inner: S,
    consumed: Arc<AtomicU64>,
}

impl<S> Iterator for CountingSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = self.inner.next()?;
        self.consumed.fetch_add(1, Ordering::Relaxed);
        Some(sample)
    }
}

impl<S> Source for CountingSource<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}

// ── Handle (Send + Sync proxy) ─────────────────────────────────────

/// Default output device, played through rodio.
pub struct SpeakerOutput {
    cmd_tx: mpsc::Sender<AudioCommand>,
    thread: Option<thread::JoinHandle<()>>,
    sample_rate: u32,
    buffer_frames: usize,
    /// Frames handed to the sink since the last flush baseline.
    appended: AtomicU64,
    /// Frames pulled by the mixer. Shared with every `CountingSource`.
    consumed: Arc<AtomicU64>,
    /// Bumped by every flush so blocked writers can bail out.
    epoch: AtomicU64,
}

impl SpeakerOutput {
    /// Open the default output device on a new audio thread.
    pub fn open(sample_rate: u32) -> Result<Self, SpeechError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<AudioCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), SpeechError>>();
        let consumed = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&consumed);
        let thread = thread::Builder::new()
            .name("narrate-audio".into())
            .spawn(move || Self::run(sample_rate, &counter, &cmd_rx, &init_tx))
            .map_err(|source| SpeechError::Spawn {
                task: "audio",
                source,
            })?;

        init_rx.recv().map_err(|_| SpeechError::AudioThreadDied)??;

        Ok(Self {
            cmd_tx,
            thread: Some(thread),
            sample_rate,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            appended: AtomicU64::new(0),
            consumed,
            epoch: AtomicU64::new(0),
        })
    }

    fn unplayed(&self) -> u64 {
        self.appended
            .load(Ordering::SeqCst)
            .saturating_sub(self.consumed.load(Ordering::SeqCst))
    }

    /// Send a command and block until the audio thread replies.
    fn send_and_recv(
        &self,
        build: impl FnOnce(mpsc::Sender<Result<(), SpeechError>>) -> AudioCommand,
    ) -> Result<(), SpeechError> {
        let (tx, rx) = mpsc::channel();
        self.cmd_tx
            .send(build(tx))
            .map_err(|_| SpeechError::AudioThreadDied)?;
        rx.recv().map_err(|_| SpeechError::AudioThreadDied)?
    }

    // ── Audio thread event loop ────────────────────────────────────

    fn run(
        sample_rate: u32,
        consumed: &Arc<AtomicU64>,
        cmd_rx: &mpsc::Receiver<AudioCommand>,
        init_tx: &mpsc::Sender<Result<(), SpeechError>>,
    ) {
        let (_stream, handle) = match OutputStream::try_default() {
            Ok(pair) => pair,
            Err(e) => {
                let _ = init_tx.send(Err(SpeechError::OutputStreamError(e.to_string())));
                return;
            }
        };
        let sink = match Sink::try_new(&handle) {
            Ok(sink) => sink,
            Err(e) => {
                let _ = init_tx.send(Err(SpeechError::OutputStreamError(e.to_string())));
                return;
            }
        };
        sink.pause();

        if init_tx.send(Ok(())).is_err() {
            return;
        }
        tracing::info!(sample_rate, "Speaker output initialized on default device");

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                AudioCommand::Play { reply } => {
                    sink.play();
                    let _ = reply.send(Ok(()));
                }
                AudioCommand::Pause { reply } => {
                    sink.pause();
                    let _ = reply.send(Ok(()));
                }
                AudioCommand::Clear { reply } => {
                    sink.clear();
                    let _ = reply.send(Ok(()));
                }
                AudioCommand::Append { samples, reply } => {
                    sink.append(CountingSource {
                        inner: SamplesBuffer::new(1, sample_rate, samples),
                        consumed: Arc::clone(consumed),
                    });
                    let _ = reply.send(Ok(()));
                }
                AudioCommand::Shutdown => break,
            }
        }

        sink.stop();
        tracing::debug!("Audio thread exiting");
    }
}

impl AudioOutput for SpeakerOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn min_buffer_frames(&self) -> usize {
        self.buffer_frames
    }

    fn play(&self) -> Result<(), SpeechError> {
        self.send_and_recv(|reply| AudioCommand::Play { reply })
    }

    fn pause(&self) -> Result<(), SpeechError> {
        self.send_and_recv(|reply| AudioCommand::Pause { reply })
    }

    fn stop(&self) -> Result<(), SpeechError> {
        self.flush()
    }

    fn flush(&self) -> Result<(), SpeechError> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.send_and_recv(|reply| AudioCommand::Clear { reply })?;
        // Cleared sources are never pulled again, so the unplayed count
        // restarts from the current playback head.
        self.appended
            .store(self.consumed.load(Ordering::SeqCst), Ordering::SeqCst);
        Ok(())
    }

    fn write(&self, samples: &[f32]) -> Result<usize, SpeechError> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let capacity = self.buffer_frames as u64;
        let mut accepted = 0;

        while accepted < samples.len() {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                break;
            }
            let space = usize::try_from(capacity.saturating_sub(self.unplayed())).unwrap_or(0);
            if space == 0 {
                thread::sleep(WRITE_RETRY);
                continue;
            }

            let take = space.min(samples.len() - accepted);
            let piece = samples[accepted..accepted + take].to_vec();
            self.send_and_recv(|reply| AudioCommand::Append {
                samples: piece,
                reply,
            })?;
            self.appended.fetch_add(take as u64, Ordering::SeqCst);
            accepted += take;
        }

        Ok(accepted)
    }

    fn frames_consumed(&self) -> u64 {
        self.consumed.load(Ordering::SeqCst)
    }
}

impl Drop for SpeakerOutput {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(AudioCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}
