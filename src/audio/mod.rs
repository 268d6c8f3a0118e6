//! Audio in and out of the appliance.
//!
//! # Pipeline
//!
//! ```text
//! trigger held → CaptureManager (arecord) → input.wav  → open_checked → recogniser
//! translated text → synthesiser → output.wav → CpalSink (1024-frame blocks) → speaker
//! ```
//!
//! Recording goes through an external recorder process so the ALSA device is
//! held only for the duration of one utterance; playback uses `cpal` directly.

pub mod capture;
pub mod format;
pub mod playback;
pub mod resample;

pub use capture::{CaptureError, CaptureManager, CapturedAudio, Recorder};
pub use format::{open_checked, FormatError, WavFormat};
pub use playback::{AudioSink, CpalSink, PlaybackError};
