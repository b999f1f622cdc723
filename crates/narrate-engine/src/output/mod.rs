//! Audio output capability: the streaming PCM sink the consumer writes to.
//!
//! The trait is **object-safe** (`Arc<dyn AudioOutput>`). All methods take
//! `&self`: the consumer thread writes while the control thread may pause
//! or flush concurrently, so implementations use interior synchronisation.
//!
//! | Implementor | Where used |
//! |---|---|
//! | [`WavOutput`](wav::WavOutput) | Rendering to a file; tests and headless use |
//! | `SpeakerOutput` (feature `speaker`) | Local playback through rodio |

#[cfg(feature = "speaker")]
pub mod speaker;
pub mod wav;

use crate::error::SpeechError;

/// A mono f32 PCM device with an internal hardware-style buffer.
pub trait AudioOutput: Send + Sync {
    /// Fixed sample rate (Hz).
    fn sample_rate(&self) -> u32;

    /// Smallest buffer the device plays from, in frames.
    ///
    /// End-of-stream padding is never shorter than this, so flushing the
    /// device after the last sentence cannot truncate real audio.
    fn min_buffer_frames(&self) -> usize {
        0
    }

    /// Start or resume consuming buffered audio.
    fn play(&self) -> Result<(), SpeechError>;

    /// Stop consuming audio, keeping the buffer intact.
    fn pause(&self) -> Result<(), SpeechError>;

    /// Stop playback. The device may be played again afterwards.
    fn stop(&self) -> Result<(), SpeechError>;

    /// Discard all buffered, not yet consumed audio.
    ///
    /// A `write` blocked on a full buffer returns early.
    fn flush(&self) -> Result<(), SpeechError>;

    /// Append samples, blocking until the device has accepted them.
    ///
    /// Returns the number of frames accepted, which is less than
    /// `samples.len()` only when a concurrent `flush` interrupted the call.
    fn write(&self, samples: &[f32]) -> Result<usize, SpeechError>;

    /// Frames actually played since the device was created. Monotonic.
    fn frames_consumed(&self) -> u64;
}
