//! Speech recognition.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                 Recognizer (trait)                        │
//! │                                                           │
//! │   SpeechRecognizer ── language ──▶ Arc<dyn SpeechModel>   │
//! │        │                               │                  │
//! │        │ open_checked(input.wav)       ▼                  │
//! │        └── 4000-frame chunks ──▶ RecognizerStream         │
//! │                                   (WhisperStream)         │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Models are loaded once at startup (one per language) and shared by
//! reference for the life of the process.

pub mod engine;
pub mod recognizer;

pub use engine::{RecognizerStream, SpeechModel, SttError, WhisperModel, WhisperStream};
pub use recognizer::{Recognizer, SpeechRecognizer, DEFAULT_CHUNK_FRAMES};

#[cfg(test)]
pub use recognizer::MockRecognizer;
