//! WAV-file output device.
//!
//! Behaves like a sound card with a small hardware buffer: `write` blocks
//! once the buffer is full, a wall clock drains the buffer into the file at
//! the sample rate while playing, `pause` freezes the clock, and `flush`
//! discards whatever has not "played" yet. The resulting file therefore
//! contains exactly the audio a listener would have heard.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;

use crate::error::SpeechError;
use crate::output::AudioOutput;

/// Default device buffer: ~170 ms at 24 kHz.
pub const DEFAULT_BUFFER_FRAMES: usize = 4_096;

const WRITE_RETRY: Duration = Duration::from_millis(2);

type Writer = WavWriter<BufWriter<File>>;

struct DeviceState {
    writer: Option<Writer>,
    pending: VecDeque<f32>,
    playing: bool,
    /// Start of the current uninterrupted playing stretch.
    clock_origin: Instant,
    /// Frames played since `clock_origin`.
    clock_frames: u64,
    consumed: u64,
    /// Bumped by every flush so blocked writers can bail out.
    epoch: u64,
}

/// Real-time WAV renderer.
pub struct WavOutput {
    sample_rate: u32,
    buffer_frames: usize,
    time_scale: f64,
    state: Mutex<DeviceState>,
}

impl WavOutput {
    /// Create (or truncate) `path` as a mono 32-bit float WAV file.
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self, SpeechError> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(path.as_ref(), spec)?;
        tracing::info!(path = %path.as_ref().display(), sample_rate, "WAV output opened");

        Ok(Self {
            sample_rate,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            time_scale: 1.0,
            state: Mutex::new(DeviceState {
                writer: Some(writer),
                pending: VecDeque::with_capacity(DEFAULT_BUFFER_FRAMES),
                playing: false,
                clock_origin: Instant::now(),
                clock_frames: 0,
                consumed: 0,
                epoch: 0,
            }),
        })
    }

    /// Override the simulated hardware buffer size (minimum 1 frame).
    #[must_use]
    pub fn with_buffer_frames(mut self, frames: usize) -> Self {
        self.buffer_frames = frames.max(1);
        self
    }

    /// Run the playback clock `scale` times faster than real time.
    ///
    /// Useful for rendering long texts to disk; pause and drain behave the
    /// same, only quicker.
    #[must_use]
    pub fn with_time_scale(mut self, scale: f64) -> Self {
        self.time_scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
        self
    }

    /// Write out any audio still buffered and finalize the WAV header.
    ///
    /// Further writes are accepted but discarded.
    pub fn finalize(&self) -> Result<(), SpeechError> {
        let mut state = self.state.lock();
        let Some(mut writer) = state.writer.take() else {
            return Ok(());
        };
        for sample in state.pending.drain(..) {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        tracing::debug!(frames = state.consumed, "WAV output finalized");
        Ok(())
    }

    /// Move every frame the clock says has played from the buffer into the
    /// file.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn advance(&self, state: &mut DeviceState) -> Result<(), SpeechError> {
        if !state.playing {
            return Ok(());
        }

        let now = Instant::now();
        if state.pending.is_empty() {
            // Underrun: silence is not banked for later.
            state.clock_origin = now;
            state.clock_frames = 0;
            return Ok(());
        }

        let elapsed = now.duration_since(state.clock_origin).as_secs_f64() * self.time_scale;
        let due_total = (elapsed * f64::from(self.sample_rate)) as u64;
        let due = due_total.saturating_sub(state.clock_frames);
        let n = usize::try_from(due)
            .unwrap_or(usize::MAX)
            .min(state.pending.len());
        if n == 0 {
            return Ok(());
        }

        let DeviceState {
            writer, pending, ..
        } = &mut *state;
        for sample in pending.drain(..n) {
            if let Some(writer) = writer.as_mut() {
                writer.write_sample(sample)?;
            }
        }
        state.clock_frames += n as u64;
        state.consumed += n as u64;

        if state.pending.is_empty() {
            state.clock_origin = now;
            state.clock_frames = 0;
        }
        Ok(())
    }
}

impl AudioOutput for WavOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn min_buffer_frames(&self) -> usize {
        self.buffer_frames
    }

    fn play(&self) -> Result<(), SpeechError> {
        let mut state = self.state.lock();
        if !state.playing {
            state.playing = true;
            state.clock_origin = Instant::now();
            state.clock_frames = 0;
        }
        Ok(())
    }

    fn pause(&self) -> Result<(), SpeechError> {
        let mut state = self.state.lock();
        self.advance(&mut state)?;
        state.playing = false;
        Ok(())
    }

    fn stop(&self) -> Result<(), SpeechError> {
        let mut state = self.state.lock();
        self.advance(&mut state)?;
        state.playing = false;
        state.pending.clear();
        state.epoch += 1;
        Ok(())
    }

    fn flush(&self) -> Result<(), SpeechError> {
        let mut state = self.state.lock();
        let dropped = state.pending.len();
        state.pending.clear();
        state.epoch += 1;
        if dropped > 0 {
            tracing::trace!(dropped, "WAV output flushed");
        }
        Ok(())
    }

    fn write(&self, samples: &[f32]) -> Result<usize, SpeechError> {
        let mut accepted = 0;
        let epoch = self.state.lock().epoch;

        loop {
            {
                let mut state = self.state.lock();
                if state.epoch != epoch {
                    return Ok(accepted);
                }
                self.advance(&mut state)?;

                let space = self.buffer_frames.saturating_sub(state.pending.len());
                let take = space.min(samples.len() - accepted);
                state
                    .pending
                    .extend(&samples[accepted..accepted + take]);
                accepted += take;
            }

            if accepted == samples.len() {
                return Ok(accepted);
            }
            thread::sleep(WRITE_RETRY);
        }
    }

    fn frames_consumed(&self) -> u64 {
        let mut state = self.state.lock();
        if let Err(e) = self.advance(&mut state) {
            tracing::warn!(error = %e, "WAV output write failed");
        }
        state.consumed
    }
}
