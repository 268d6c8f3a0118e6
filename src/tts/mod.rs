//! Speaking the translation: synthesis, then playback.
//!
//! ```text
//! VoiceSpeaker::speak(text, language)
//!     ├─▶ Synthesizer::synthesize  (piper → output.wav)
//!     └─▶ AudioSink::play_wav      (cpal, 1024-frame blocks)
//! ```
//!
//! A failure in either half is returned to the orchestrator as a
//! [`SpeakError`]; nothing is retried.

pub mod piper;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::audio::{AudioSink, PlaybackError};
use crate::language::Language;
use crate::process::ProcessError;

pub use piper::{PiperSynthesizer, Synthesizer};

// ---------------------------------------------------------------------------
// SpeakError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SpeakError {
    /// The synthesiser could not be run or exceeded its time limit.
    #[error("synthesizer process: {0}")]
    Process(#[from] ProcessError),

    /// The synthesiser exited unsuccessfully.
    #[error("synthesizer failed: {0}")]
    SynthesisFailed(String),

    /// The synthesiser exited cleanly but wrote nothing.
    #[error("synthesizer produced no audio at {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("synthesizer I/O: {0}")]
    Io(#[source] std::io::Error),

    #[error("playback: {0}")]
    Playback(#[from] PlaybackError),
}

// ---------------------------------------------------------------------------
// Speaker
// ---------------------------------------------------------------------------

/// Speaks text aloud in `language`, blocking until playback has finished.
pub trait Speaker: Send + Sync {
    fn speak(&self, text: &str, language: Language) -> Result<(), SpeakError>;
}

/// Synthesiser plus output device.
pub struct VoiceSpeaker {
    synthesizer: Arc<dyn Synthesizer>,
    sink: Arc<dyn AudioSink>,
}

impl VoiceSpeaker {
    pub fn new(synthesizer: Arc<dyn Synthesizer>, sink: Arc<dyn AudioSink>) -> Self {
        Self { synthesizer, sink }
    }
}

impl Speaker for VoiceSpeaker {
    fn speak(&self, text: &str, language: Language) -> Result<(), SpeakError> {
        let wav = self.synthesizer.synthesize(text, language)?;
        self.sink.play_wav(&wav)?;
        log::info!("tts: spoke {} chars in {}", text.chars().count(), language.name());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockSpeaker  (test-only)
// ---------------------------------------------------------------------------

/// Records what it was asked to say; optionally fails every call.
#[cfg(test)]
pub struct MockSpeaker {
    fail: bool,
    pub spoken: std::sync::Mutex<Vec<(String, Language)>>,
}

#[cfg(test)]
impl MockSpeaker {
    pub fn ok() -> Self {
        Self {
            fail: false,
            spoken: Default::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            spoken: Default::default(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.spoken.lock().unwrap().len()
    }
}

#[cfg(test)]
impl Speaker for MockSpeaker {
    fn speak(&self, text: &str, language: Language) -> Result<(), SpeakError> {
        self.spoken.lock().unwrap().push((text.to_string(), language));
        if self.fail {
            return Err(SpeakError::SynthesisFailed("exit status: 1".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    struct StubSynth {
        result: fn() -> Result<PathBuf, SpeakError>,
    }

    impl Synthesizer for StubSynth {
        fn synthesize(&self, _text: &str, _language: Language) -> Result<PathBuf, SpeakError> {
            (self.result)()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        played: Mutex<Vec<PathBuf>>,
        fail: bool,
    }

    impl AudioSink for RecordingSink {
        fn play_wav(&self, path: &Path) -> Result<(), PlaybackError> {
            self.played.lock().unwrap().push(path.to_path_buf());
            if self.fail {
                return Err(PlaybackError::NoDevice);
            }
            Ok(())
        }
    }

    #[test]
    fn plays_synthesised_file() {
        let sink = Arc::new(RecordingSink::default());
        let speaker = VoiceSpeaker::new(
            Arc::new(StubSynth {
                result: || Ok(PathBuf::from("/tmp/output.wav")),
            }),
            sink.clone(),
        );

        speaker.speak("Hello", Language::English).unwrap();
        assert_eq!(
            *sink.played.lock().unwrap(),
            vec![PathBuf::from("/tmp/output.wav")]
        );
    }

    #[test]
    fn synthesis_failure_skips_playback() {
        let sink = Arc::new(RecordingSink::default());
        let speaker = VoiceSpeaker::new(
            Arc::new(StubSynth {
                result: || Err(SpeakError::SynthesisFailed("exit status: 1".into())),
            }),
            sink.clone(),
        );

        let err = speaker.speak("Hello", Language::English).unwrap_err();
        assert!(matches!(err, SpeakError::SynthesisFailed(_)));
        assert!(sink.played.lock().unwrap().is_empty());
    }

    #[test]
    fn playback_failure_is_reported() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let speaker = VoiceSpeaker::new(
            Arc::new(StubSynth {
                result: || Ok(PathBuf::from("/tmp/output.wav")),
            }),
            sink,
        );

        let err = speaker.speak("Xin chào", Language::Vietnamese).unwrap_err();
        assert!(matches!(err, SpeakError::Playback(PlaybackError::NoDevice)));
    }

    #[test]
    fn missing_output_message_names_path() {
        let e = SpeakError::MissingOutput(PathBuf::from("/work/output.wav"));
        assert!(e.to_string().contains("/work/output.wav"));
    }
}
