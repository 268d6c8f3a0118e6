//! Buffer-to-text recognition used by the session pipeline.
//!
//! [`Recognizer::recognize`] never fails: a buffer in the wrong format, an
//! I/O error or a decoder error is logged and reported as `""`, which the
//! orchestrator treats as "nothing recognised".

use std::path::Path;
use std::sync::Arc;

use crate::audio::{open_checked, FormatError, WavFormat};
use crate::language::Language;

use super::engine::{SpeechModel, SttError};

/// Frames fed to a stream per call unless configured otherwise.
pub const DEFAULT_CHUNK_FRAMES: usize = 4_000;

/// Turns a finished audio buffer into text.
pub trait Recognizer: Send + Sync {
    /// Transcribe the buffer at `audio` as speech in `language`.
    ///
    /// Returns an empty string when nothing was recognised or recognition
    /// failed.
    fn recognize(&self, audio: &Path, language: Language) -> String;
}

// ---------------------------------------------------------------------------
// SpeechRecognizer
// ---------------------------------------------------------------------------

/// Routes each request to the model for its language and streams the buffer
/// through it in fixed-size chunks.
pub struct SpeechRecognizer {
    vietnamese: Arc<dyn SpeechModel>,
    english: Arc<dyn SpeechModel>,
    chunk_frames: usize,
}

impl SpeechRecognizer {
    pub fn new(
        vietnamese: Arc<dyn SpeechModel>,
        english: Arc<dyn SpeechModel>,
        chunk_frames: usize,
    ) -> Self {
        Self {
            vietnamese,
            english,
            chunk_frames: chunk_frames.max(1),
        }
    }

    fn model(&self, language: Language) -> &dyn SpeechModel {
        match language {
            Language::Vietnamese => self.vietnamese.as_ref(),
            Language::English => self.english.as_ref(),
        }
    }

    fn try_recognize(&self, audio: &Path, language: Language) -> Result<String, SttError> {
        let mut reader = open_checked(audio, WavFormat::SPEECH_16K)?;
        let mut stream = self.model(language).open_stream()?;

        let mut parts: Vec<String> = Vec::new();
        let mut samples = reader.samples::<i16>();
        let mut chunk = Vec::with_capacity(self.chunk_frames);

        loop {
            chunk.clear();
            for sample in samples.by_ref().take(self.chunk_frames) {
                chunk.push(sample?);
            }
            if chunk.is_empty() {
                break;
            }
            if let Some(partial) = stream.accept_waveform(&chunk)? {
                parts.push(partial);
            }
        }
        parts.push(stream.final_result()?);

        let text = parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(text)
    }
}

impl Recognizer for SpeechRecognizer {
    fn recognize(&self, audio: &Path, language: Language) -> String {
        match self.try_recognize(audio, language) {
            Ok(text) => {
                log::info!("stt: [{language}] {text:?}");
                text
            }
            Err(SttError::Format(e @ FormatError::Mismatch { .. })) => {
                log::warn!("stt: {e}; buffer ignored");
                String::new()
            }
            Err(e) => {
                log::error!("stt: recognition failed: {e}");
                String::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MockRecognizer  (test-only)
// ---------------------------------------------------------------------------

/// Returns a fixed transcript and records the languages it was asked for.
#[cfg(test)]
pub struct MockRecognizer {
    text: String,
    pub calls: std::sync::Mutex<Vec<Language>>,
}

#[cfg(test)]
impl MockRecognizer {
    pub fn returning(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            calls: Default::default(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
impl Recognizer for MockRecognizer {
    fn recognize(&self, _audio: &Path, language: Language) -> String {
        self.calls.lock().unwrap().push(language);
        self.text.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
