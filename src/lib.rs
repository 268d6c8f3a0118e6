//! Push-to-talk Vietnamese ↔ English voice translator.
//!
//! A trigger input starts and stops an external recorder, a mode input picks
//! the direction, and each utterance runs through recognition, translation
//! and synthesis before it is played back.

pub mod audio;
pub mod config;
pub mod gpio;
pub mod language;
pub mod pipeline;
pub mod process;
pub mod stt;
pub mod translate;
pub mod tts;
