//! Speech models and their recognition streams.
//!
//! # Overview
//!
//! [`SpeechModel`] is a loaded, immutable model for one language.  Each
//! recognition opens a fresh [`RecognizerStream`] on it, feeds 16 kHz mono
//! `i16` samples in chunks, and collects the final result:
//!
//! ```text
//! open_stream() ─▶ accept_waveform(chunk) … ─▶ final_result()
//!                        │
//!                        └─▶ Some(partial) when a window is finalised
//! ```
//!
//! [`WhisperModel`] is the production implementation over
//! `whisper_rs::WhisperContext`.  Whisper decodes whole windows rather than a
//! live stream, so [`WhisperStream`] buffers samples and transcribes every
//! full 30 s window as a partial, and the remainder on `final_result`.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::language::Language;

/// Sample rate every model expects.
pub const SAMPLE_RATE: usize = 16_000;

/// Whisper decodes at most 30 s per pass.
const WINDOW_SAMPLES: usize = 30 * SAMPLE_RATE;

/// Remainders shorter than 0.5 s are not worth a decoder pass.
const MIN_TAIL_SAMPLES: usize = SAMPLE_RATE / 2;

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// Errors raised inside the recognition subsystem.
///
/// [`crate::stt::Recognizer`] never surfaces these to the pipeline; they are
/// logged and turned into an empty transcript.
#[derive(Debug, Error)]
pub enum SttError {
    /// The GGML model file was not found at the given path.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// `whisper_rs` failed to initialise a context or state.
    #[error("whisper context initialisation failed: {0}")]
    ContextInit(String),

    /// An error occurred during the inference pass.
    #[error("transcription error: {0}")]
    Transcription(String),

    /// The audio buffer could not be read or has the wrong format.
    #[error(transparent)]
    Format(#[from] crate::audio::FormatError),

    /// Sample decoding failed part way through the buffer.
    #[error("failed to read samples: {0}")]
    Samples(#[from] hound::Error),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A loaded recognition model for a single language.
///
/// Shared behind `Arc<dyn SpeechModel>`; `open_stream` must not mutate the
/// model.
pub trait SpeechModel: Send + Sync {
    fn language(&self) -> Language;

    fn open_stream(&self) -> Result<Box<dyn RecognizerStream + '_>, SttError>;
}

/// One recognition pass over one utterance.
pub trait RecognizerStream {
    /// Feed the next chunk.  Returns a finalised partial transcript when one
    /// became available.
    fn accept_waveform(&mut self, samples: &[i16]) -> Result<Option<String>, SttError>;

    /// Flush buffered audio and return the last piece of the transcript.
    fn final_result(&mut self) -> Result<String, SttError>;
}

// ---------------------------------------------------------------------------
// WindowBuffer
// ---------------------------------------------------------------------------

/// Accumulates `f32` samples and hands out fixed-size decode windows.
#[derive(Debug)]
struct WindowBuffer {
    pending: Vec<f32>,
    window: usize,
    min_tail: usize,
}

impl WindowBuffer {
    fn new(window: usize, min_tail: usize) -> Self {
        Self {
            pending: Vec::with_capacity(window),
            window,
            min_tail,
        }
    }

    /// Append `samples`; returns every window that is now complete.
    fn push(&mut self, samples: &[i16]) -> Vec<Vec<f32>> {
        self.pending
            .extend(samples.iter().map(|&s| f32::from(s) / 32_768.0));

        let mut windows = Vec::new();
        while self.pending.len() >= self.window {
            let rest = self.pending.split_off(self.window);
            windows.push(std::mem::replace(&mut self.pending, rest));
        }
        windows
    }

    /// Take the remainder, or `None` if it is too short to decode.
    fn finish(&mut self) -> Option<Vec<f32>> {
        let tail = std::mem::take(&mut self.pending);
        (tail.len() >= self.min_tail).then_some(tail)
    }
}

// ---------------------------------------------------------------------------
// WhisperModel
// ---------------------------------------------------------------------------

/// A Whisper GGML model pinned to one language.
pub struct WhisperModel {
    ctx: WhisperContext,
    language: Language,
    n_threads: i32,
}

impl std::fmt::Debug for WhisperModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperModel")
            .field("language", &self.language)
            .field("n_threads", &self.n_threads)
            .finish_non_exhaustive()
    }
}

// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs; the weights
// are read-only after loading and every decode creates its own state.
unsafe impl Send for WhisperModel {}
unsafe impl Sync for WhisperModel {}

impl WhisperModel {
    /// Load a GGML model from `model_path` for `language`.
    ///
    /// # Errors
    ///
    /// - [`SttError::ModelNotFound`]: `model_path` does not exist.
    /// - [`SttError::ContextInit`]: whisper-rs failed to load the file.
    pub fn load(
        model_path: impl AsRef<Path>,
        language: Language,
        use_gpu: bool,
    ) -> Result<Self, SttError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(use_gpu);
        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        log::info!("stt: loaded {} model from {}", language.name(), path.display());

        Ok(Self {
            ctx,
            language,
            n_threads: optimal_threads(),
        })
    }

    /// Decode one window of 16 kHz mono audio.
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        let mut fp = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        fp.set_language(Some(self.language.code()));
        fp.set_n_threads(self.n_threads);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);
        fp.set_print_special(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        let started = std::time::Instant::now();
        state
            .full(fp, audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;
            text.push_str(&segment);
        }

        log::debug!(
            "stt: decoded {:.1}s of audio in {} ms",
            audio.len() as f32 / SAMPLE_RATE as f32,
            started.elapsed().as_millis()
        );
        Ok(text.trim().to_string())
    }
}

impl SpeechModel for WhisperModel {
    fn language(&self) -> Language {
        self.language
    }

    fn open_stream(&self) -> Result<Box<dyn RecognizerStream + '_>, SttError> {
        Ok(Box::new(WhisperStream {
            model: self,
            buffer: WindowBuffer::new(WINDOW_SAMPLES, MIN_TAIL_SAMPLES),
        }))
    }
}

/// Buffered recognition stream over a [`WhisperModel`].
pub struct WhisperStream<'a> {
    model: &'a WhisperModel,
    buffer: WindowBuffer,
}

impl RecognizerStream for WhisperStream<'_> {
    fn accept_waveform(&mut self, samples: &[i16]) -> Result<Option<String>, SttError> {
        let mut partials = Vec::new();
        for window in self.buffer.push(samples) {
            let text = self.model.transcribe(&window)?;
            if !text.is_empty() {
                partials.push(text);
            }
        }
        Ok((!partials.is_empty()).then(|| partials.join(" ")))
    }

    fn final_result(&mut self) -> Result<String, SttError> {
        match self.buffer.finish() {
            Some(tail) => self.model.transcribe(&tail),
            None => Ok(String::new()),
        }
    }
}

/// Threads handed to Whisper, capped at 8.
fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
