//! Session orchestrator: record → recognise → translate → speak.
//!
//! [`SessionOrchestrator`] consumes debounced [`TriggerEvent`]s from the
//! single-slot trigger channel and runs one session per accepted edge.
//!
//! # Session flow
//!
//! ```text
//! TriggerEvent
//!   └─▶ overlaps previous session?  ── yes ──▶ ignored
//!   └─▶ read mode pin once → Direction
//!         └─▶ spawn_blocking(recorder.capture_while_held)       [Recording]
//!               └─▶ spawn_blocking(recognizer.recognize)         [Recognizing]
//!                     ├─ ""   → abort
//!                     └─▶ translator.translate (async)           [Translating]
//!                           └─▶ spawn_blocking(speaker.speak)    [Speaking]
//!                                 └─▶ Idle
//! ```
//!
//! Every stage failure ends the session and returns the pipeline to `Idle`;
//! nothing escapes [`SessionOrchestrator::run_session`].
//!
//! A shutdown request cancels a capture in progress, lets that session
//! finish, and then ends [`SessionOrchestrator::run`].

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};

use crate::audio::{CaptureError, Recorder};
use crate::gpio::{DigitalInput, Pin, TriggerEvent};
use crate::language::Direction;
use crate::stt::Recognizer;
use crate::translate::Translator;
use crate::tts::Speaker;

use super::state::{
    AbortReason, AppState, PipelineState, Session, SessionOutcome, SessionStatus, SharedState,
};

// ---------------------------------------------------------------------------
// SessionOrchestrator
// ---------------------------------------------------------------------------

/// Drives sessions, one at a time.
///
/// Create with [`SessionOrchestrator::new`], then spawn [`run`](Self::run)
/// as a tokio task.
pub struct SessionOrchestrator {
    state: SharedState,
    pins: Arc<dyn DigitalInput>,
    mode_pin: Pin,
    recorder: Arc<dyn Recorder>,
    recognizer: Arc<dyn Recognizer>,
    translator: Arc<dyn Translator>,
    speaker: Arc<dyn Speaker>,
    next_id: u64,
    last_session_end: Option<Instant>,
}

impl SessionOrchestrator {
    pub fn new(
        state: SharedState,
        pins: Arc<dyn DigitalInput>,
        mode_pin: Pin,
        recorder: Arc<dyn Recorder>,
        recognizer: Arc<dyn Recognizer>,
        translator: Arc<dyn Translator>,
        speaker: Arc<dyn Speaker>,
    ) -> Self {
        Self {
            state,
            pins,
            mode_pin,
            recorder,
            recognizer,
            translator,
            speaker,
            next_id: 1,
            last_session_end: None,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run sessions until `triggers` is closed or `shutdown` changes.
    ///
    /// Dropping the `shutdown` sender also counts as a shutdown request.
    pub async fn run(
        mut self,
        mut triggers: mpsc::Receiver<TriggerEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let event = tokio::select! {
                event = triggers.recv() => match event {
                    Some(event) => event,
                    None => {
                        log::info!("pipeline: trigger channel closed, orchestrator shutting down");
                        return;
                    }
                },
                _ = shutdown.changed() => break,
            };

            if self.overlaps_previous(&event) {
                log::debug!("pipeline: trigger during previous session ignored");
                self.update(|st| st.ignored_edges += 1);
                continue;
            }

            let direction = Direction::from_mode_level(self.pins.read_level(self.mode_pin));
            let recorder = Arc::clone(&self.recorder);
            let mut stop = shutdown.clone();

            let (outcome, stopping) = {
                let session = self.run_session(direction);
                tokio::pin!(session);
                tokio::select! {
                    outcome = &mut session => (outcome, false),
                    _ = stop.changed() => {
                        log::info!("pipeline: shutdown requested, finishing current session");
                        recorder.cancel();
                        (session.await, true)
                    }
                }
            };
            self.last_session_end = Some(Instant::now());
            log::info!("pipeline: session ended: {}", outcome.label());

            if stopping {
                break;
            }
        }

        log::info!("pipeline: shutdown requested, orchestrator stopped");
    }

    /// An edge observed before the previous session ended was pressed while
    /// the pipeline was busy.
    fn overlaps_previous(&self, event: &TriggerEvent) -> bool {
        matches!(self.last_session_end, Some(end) if event.at < end)
    }

    // -----------------------------------------------------------------------
    // One session
    // -----------------------------------------------------------------------

    /// Run one complete session with a latched `direction`.
    pub async fn run_session(&mut self, direction: Direction) -> SessionOutcome {
        let mut session = Session::new(self.next_id, direction);
        self.next_id += 1;

        log::info!("pipeline: session {} started ({direction})", session.id);
        self.update(|st| {
            st.pipeline = PipelineState::Recording;
            st.direction = Some(direction);
        });

        // ── 1. Capture ───────────────────────────────────────────────────
        let recorder = Arc::clone(&self.recorder);
        let captured = match tokio::task::spawn_blocking(move || recorder.capture_while_held()).await
        {
            Ok(Ok(audio)) => audio,
            Ok(Err(e @ CaptureError::Timeout { .. })) => {
                log::error!("pipeline: {e}");
                return self.abort(&mut session, AbortReason::CaptureTimeout);
            }
            Ok(Err(e)) => {
                log::error!("pipeline: capture failed: {e}");
                return self.abort(&mut session, AbortReason::CaptureFailed);
            }
            Err(e) => {
                log::error!("pipeline: capture task failed: {e}");
                return self.abort(&mut session, AbortReason::Internal);
            }
        };

        if !captured.exists() {
            log::warn!(
                "pipeline: no audio buffer at {}",
                captured.path.display()
            );
            return self.abort(&mut session, AbortReason::BufferMissing);
        }

        // ── 2. Recognition ───────────────────────────────────────────────
        self.advance(&mut session, SessionStatus::Recognizing, PipelineState::Recognizing);

        let recognizer = Arc::clone(&self.recognizer);
        let source = direction.source();
        let path = captured.path.clone();
        let recognized =
            match tokio::task::spawn_blocking(move || recognizer.recognize(&path, source)).await {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    log::error!("pipeline: recognition task failed: {e}");
                    return self.abort(&mut session, AbortReason::Internal);
                }
            };

        if recognized.is_empty() {
            return self.abort(&mut session, AbortReason::RecognitionEmpty);
        }
        session.recognized_text = recognized;

        // ── 3. Translation ───────────────────────────────────────────────
        self.advance(&mut session, SessionStatus::Translating, PipelineState::Translating);

        session.translated_text = match self
            .translator
            .translate(&session.recognized_text, direction)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                log::warn!("pipeline: translation failed ({e}), speaking recognised text");
                session.recognized_text.clone()
            }
        };

        // ── 4. Synthesis + playback ──────────────────────────────────────
        self.advance(&mut session, SessionStatus::Speaking, PipelineState::Speaking);

        let speaker = Arc::clone(&self.speaker);
        let text = session.translated_text.clone();
        let target = direction.target();
        match tokio::task::spawn_blocking(move || speaker.speak(&text, target)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::error!("pipeline: {e}");
                return self.abort(&mut session, AbortReason::SpeakFailed);
            }
            Err(e) => {
                log::error!("pipeline: speak task failed: {e}");
                return self.abort(&mut session, AbortReason::Internal);
            }
        }

        // ── 5. Done ──────────────────────────────────────────────────────
        session.status = SessionStatus::Done;
        let outcome = SessionOutcome::Completed {
            recognized: std::mem::take(&mut session.recognized_text),
            translated: std::mem::take(&mut session.translated_text),
        };
        self.update(|st| st.finish(&outcome));
        outcome
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn advance(&self, session: &mut Session, status: SessionStatus, pipeline: PipelineState) {
        session.status = status;
        log::debug!("pipeline: session {} → {}", session.id, pipeline.label());
        self.update(|st| st.pipeline = pipeline);
    }

    fn abort(&self, session: &mut Session, reason: AbortReason) -> SessionOutcome {
        session.status = SessionStatus::Failed;
        log::warn!("pipeline: session {} aborted: {reason}", session.id);
        let outcome = SessionOutcome::Aborted(reason);
        self.update(|st| st.finish(&outcome));
        outcome
    }

    /// Short critical section on the shared state.  A poisoned lock is
    /// recovered; the state is observation-only.
    fn update(&self, f: impl FnOnce(&mut AppState)) {
        match self.state.lock() {
            Ok(mut st) => f(&mut st),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
