//! Session pipeline: one push-to-talk cycle per trigger edge.
//!
//! # Architecture
//!
//! ```text
//! TriggerEvent (mpsc, capacity 1)
//!        │
//!        ▼
//! SessionOrchestrator::run()  ← async tokio task, stops on the shutdown watch
//!        │
//!        ├─ mode pin          → Direction (latched)
//!        ├─ spawn_blocking(Recorder::capture_while_held)  → Recording
//!        ├─ spawn_blocking(Recognizer::recognize)         → Recognizing
//!        ├─ Translator::translate                         → Translating
//!        └─ spawn_blocking(Speaker::speak)                → Speaking
//!
//! SharedState (Arc<Mutex<AppState>>) ←─── counters and current phase
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voice_translate::audio::Recorder;
//! use voice_translate::gpio::{trigger_channel, DigitalInput, Pin};
//! use voice_translate::pipeline::{new_shared_state, SessionOrchestrator};
//! use voice_translate::stt::Recognizer;
//! use voice_translate::translate::Translator;
//! use voice_translate::tts::Speaker;
//! use tokio::sync::watch;
//!
//! # fn pins() -> Arc<dyn DigitalInput> { unimplemented!() }
//! # fn recorder() -> Arc<dyn Recorder> { unimplemented!() }
//! # fn recognizer() -> Arc<dyn Recognizer> { unimplemented!() }
//! # fn translator() -> Arc<dyn Translator> { unimplemented!() }
//! # fn speaker() -> Arc<dyn Speaker> { unimplemented!() }
//! #[tokio::main]
//! async fn main() {
//!     let (_trigger_tx, trigger_rx) = trigger_channel();
//!     let orchestrator = SessionOrchestrator::new(
//!         new_shared_state(),
//!         pins(),
//!         Pin(27),
//!         recorder(),
//!         recognizer(),
//!         translator(),
//!         speaker(),
//!     );
//!
//!     // _trigger_tx goes to the input backend wrapped in an EdgeSender.
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!     orchestrator.run(trigger_rx, shutdown_rx).await;
//! }
//! ```

pub mod runner;
pub mod state;

pub use runner::SessionOrchestrator;
pub use state::{
    new_shared_state, AbortReason, AppState, PipelineState, Session, SessionOutcome,
    SessionStatus, SharedState,
};
