//! Digital inputs: the record trigger and the direction mode pin.
//!
//! # Design
//!
//! Backends expose two primitives:
//!
//! * [`DigitalInput::read_level`]: sample a pin's current level.
//! * rising edges on the trigger pin, pushed through an [`EdgeSender`] that
//!   debounces them and forwards at most one [`TriggerEvent`] into a
//!   single-slot `tokio::sync::mpsc` channel.
//!
//! The orchestrator blocks on the receiving end of that channel, so the
//! interrupt/callback thread of a backend never runs pipeline code itself.
//!
//! ```text
//! rdev / rppal callback ──rising edge──▶ EdgeSender (debounce, try_send)
//!                                              │ capacity 1
//!                                              ▼
//!                                 SessionOrchestrator::run()
//! ```
//!
//! Backends:
//!
//! * [`KeyboardInput`]: two global keys emulate the pins (default).
//! * `GpioInput`: Raspberry Pi header via `rppal` (`rpi` feature).

pub mod keyboard;
#[cfg(feature = "rpi")]
pub mod rpi;

use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;

pub use keyboard::{parse_key, KeyboardInput};
#[cfg(feature = "rpi")]
pub use rpi::GpioInput;

// ---------------------------------------------------------------------------
// Level / Pin
// ---------------------------------------------------------------------------

/// Logic level of a digital input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// A BCM pin number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pin(pub u8);

impl std::fmt::Display for Pin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// GpioError
// ---------------------------------------------------------------------------

/// Input backend initialisation failures.  All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum GpioError {
    /// The configured key name is not recognised.
    #[error("unknown key name: {0:?}")]
    UnknownKey(String),

    /// The pin controller could not be opened or configured.
    #[error("pin {pin} unavailable: {message}")]
    Unavailable { pin: Pin, message: String },

    /// The backend was not compiled into this binary.
    #[error("input backend not available: {0}")]
    NotCompiled(&'static str),
}

// ---------------------------------------------------------------------------
// DigitalInput
// ---------------------------------------------------------------------------

/// Level access to the appliance's inputs.
///
/// Implementations are shared between the orchestrator (mode pin) and the
/// capture worker thread (trigger pin), hence `Send + Sync`.
pub trait DigitalInput: Send + Sync {
    fn read_level(&self, pin: Pin) -> Level;
}

// ---------------------------------------------------------------------------
// TriggerEvent / debouncing
// ---------------------------------------------------------------------------

/// A debounced rising edge on the trigger pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    /// When the edge was observed.
    pub at: Instant,
}

impl TriggerEvent {
    pub fn now() -> Self {
        Self { at: Instant::now() }
    }
}

/// Accepts at most one edge per `window`.
#[derive(Debug)]
pub struct EdgeDebouncer {
    window: Duration,
    last: Option<Instant>,
}

impl EdgeDebouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Returns `true` when an edge at `now` falls outside the window opened
    /// by the previously accepted edge.
    pub fn accept(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Debouncing producer side of the trigger channel, owned by a backend.
#[derive(Debug)]
pub struct EdgeSender {
    tx: mpsc::Sender<TriggerEvent>,
    debouncer: Mutex<EdgeDebouncer>,
}

impl EdgeSender {
    pub fn new(tx: mpsc::Sender<TriggerEvent>, debounce: Duration) -> Self {
        Self {
            tx,
            debouncer: Mutex::new(EdgeDebouncer::new(debounce)),
        }
    }

    /// Report a rising edge observed at `at`.
    ///
    /// Returns `true` if the event was queued.  Edges inside the debounce
    /// window, or arriving while the slot is still occupied, are dropped.
    pub fn rising_edge(&self, at: Instant) -> bool {
        let accepted = match self.debouncer.lock() {
            Ok(mut d) => d.accept(at),
            Err(poisoned) => poisoned.into_inner().accept(at),
        };
        if !accepted {
            log::debug!("gpio: edge inside debounce window ignored");
            return false;
        }

        match self.tx.try_send(TriggerEvent { at }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::debug!("gpio: trigger slot occupied, edge dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::warn!("gpio: trigger channel closed, edge dropped");
                false
            }
        }
    }
}

/// Create the single-slot trigger channel.
pub fn trigger_channel() -> (mpsc::Sender<TriggerEvent>, mpsc::Receiver<TriggerEvent>) {
    mpsc::channel(1)
}

// ---------------------------------------------------------------------------
// FakePins  (test-only)
// ---------------------------------------------------------------------------

/// Scripted inputs for tests.
///
/// The trigger pin replays `trigger_script` one level per read and then holds
/// the last level; the mode pin always reads `mode`.
#[cfg(test)]
pub struct FakePins {
    pub trigger: Pin,
    pub mode: Pin,
    mode_level: Level,
    trigger_script: Mutex<std::collections::VecDeque<Level>>,
    last_trigger: Mutex<Level>,
    pub mode_reads: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FakePins {
    pub fn new(mode_level: Level, trigger_script: impl IntoIterator<Item = Level>) -> Self {
        Self {
            trigger: Pin(17),
            mode: Pin(27),
            mode_level,
            trigger_script: Mutex::new(trigger_script.into_iter().collect()),
            last_trigger: Mutex::new(Level::Low),
            mode_reads: Default::default(),
        }
    }

    /// Trigger held for `reads` samples, then released.
    pub fn held_for(mode_level: Level, reads: usize) -> Self {
        Self::new(mode_level, std::iter::repeat(Level::High).take(reads))
    }
}

#[cfg(test)]
impl DigitalInput for FakePins {
    fn read_level(&self, pin: Pin) -> Level {
        if pin == self.mode {
            self.mode_reads
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            return self.mode_level;
        }
        let mut last = self.last_trigger.lock().unwrap();
        if let Some(next) = self.trigger_script.lock().unwrap().pop_front() {
            *last = next;
        }
        *last
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
