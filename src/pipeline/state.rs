//! Pipeline state machine, session records and shared observation state.
//!
//! [`PipelineState`] is what the orchestrator is doing right now.  A
//! [`Session`] is one push-to-talk cycle; it lives only inside
//! `SessionOrchestrator::run_session` and ends in a [`SessionOutcome`].
//!
//! [`SharedState`] is a type alias for `Arc<Mutex<AppState>>`.  It exists for
//! observation (logs, tests); the orchestrator never waits on it.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::language::Direction;

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// States of the session pipeline.
///
/// ```text
/// Idle ──trigger──▶ Recording ──buffer──▶ Recognizing ──text──▶ Translating
///                                                                    │
/// Idle ◀──────────── playback done / failed ──────────── Speaking ◀──┘
///
/// any state ──empty / failed stage──▶ Idle   (abort)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Waiting for a trigger edge.
    #[default]
    Idle,
    /// The recorder is running while the trigger is held.
    Recording,
    /// The buffer is being transcribed.
    Recognizing,
    /// The transcript is being translated.
    Translating,
    /// The translation is being synthesised and played.
    Speaking,
}

impl PipelineState {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Recording => "Recording",
            PipelineState::Recognizing => "Recognizing",
            PipelineState::Translating => "Translating",
            PipelineState::Speaking => "Speaking",
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Progress of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Recording,
    Recognizing,
    Translating,
    Speaking,
    Done,
    Failed,
}

/// One push-to-talk cycle.  Never persisted.
#[derive(Debug, Clone)]
pub struct Session {
    /// Monotonic, starting at 1.
    pub id: u64,
    /// Latched from the mode pin when the trigger fired.
    pub direction: Direction,
    pub recognized_text: String,
    pub translated_text: String,
    pub status: SessionStatus,
}

impl Session {
    pub fn new(id: u64, direction: Direction) -> Self {
        Self {
            id,
            direction,
            recognized_text: String::new(),
            translated_text: String::new(),
            status: SessionStatus::Recording,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionOutcome
// ---------------------------------------------------------------------------

/// Why a session ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The recorder ignored SIGTERM and was killed.
    CaptureTimeout,
    /// The recorder could not be started or reaped.
    CaptureFailed,
    /// The recorder exited without leaving a buffer.
    BufferMissing,
    /// Nothing was recognised (including malformed buffers).
    RecognitionEmpty,
    /// Synthesis or playback failed.
    SpeakFailed,
    /// A blocking stage panicked or was cancelled.
    Internal,
}

impl AbortReason {
    pub fn label(&self) -> &'static str {
        match self {
            AbortReason::CaptureTimeout => "capture timeout",
            AbortReason::CaptureFailed => "capture failed",
            AbortReason::BufferMissing => "buffer missing",
            AbortReason::RecognitionEmpty => "nothing recognised",
            AbortReason::SpeakFailed => "speak failed",
            AbortReason::Internal => "internal error",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed { recognized: String, translated: String },
    Aborted(AbortReason),
}

impl SessionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SessionOutcome::Completed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionOutcome::Completed { .. } => "completed",
            SessionOutcome::Aborted(reason) => reason.label(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Observable state of the appliance.
#[derive(Debug, Default)]
pub struct AppState {
    /// Current phase of the pipeline.
    pub pipeline: PipelineState,
    /// Direction of the session in flight, if any.
    pub direction: Option<Direction>,
    /// Sessions that reached the speaker.
    pub completed: u64,
    /// Sessions that ended early.
    pub aborted: u64,
    /// Trigger edges rejected because they overlapped a session.
    pub ignored_edges: u64,
    /// Label of the most recent [`SessionOutcome`].
    pub last_outcome: Option<&'static str>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the end of a session and return to `Idle`.
    pub fn finish(&mut self, outcome: &SessionOutcome) {
        self.pipeline = PipelineState::Idle;
        self.direction = None;
        if outcome.is_completed() {
            self.completed += 1;
        } else {
            self.aborted += 1;
        }
        self.last_outcome = Some(outcome.label());
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].  Do not hold the lock across
/// `.await` points.
pub type SharedState = Arc<Mutex<AppState>>;

pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(AppState::new()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pipeline_state_is_idle() {
        assert_eq!(PipelineState::default(), PipelineState::Idle);
    }

    #[test]
    fn new_session_is_recording() {
        let s = Session::new(1, Direction::ViToEn);
        assert_eq!(s.status, SessionStatus::Recording);
        assert!(s.recognized_text.is_empty());
        assert!(s.translated_text.is_empty());
    }

    #[test]
    fn outcome_labels() {
        let done = SessionOutcome::Completed {
            recognized: "xin chào".into(),
            translated: "hello".into(),
        };
        assert!(done.is_completed());
        assert_eq!(done.label(), "completed");

        let empty = SessionOutcome::Aborted(AbortReason::RecognitionEmpty);
        assert!(!empty.is_completed());
        assert_eq!(empty.label(), "nothing recognised");
    }

    #[test]
    fn finish_counts_and_returns_to_idle() {
        let mut st = AppState::new();
        st.pipeline = PipelineState::Speaking;
        st.direction = Some(Direction::EnToVi);

        st.finish(&SessionOutcome::Aborted(AbortReason::SpeakFailed));
        assert_eq!(st.pipeline, PipelineState::Idle);
        assert_eq!(st.direction, None);
        assert_eq!((st.completed, st.aborted), (0, 1));
        assert_eq!(st.last_outcome, Some("speak failed"));

        st.finish(&SessionOutcome::Completed {
            recognized: "a".into(),
            translated: "b".into(),
        });
        assert_eq!((st.completed, st.aborted), (1, 1));
    }

    #[test]
    fn shared_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedState>();
    }
}
