//! Keyboard emulation of the two pins, backed by `rdev`.
//!
//! * The trigger key reads High while held; pressing it is a rising edge.
//! * Each press of the mode key toggles the mode pin level (starts Low,
//!   i.e. Vietnamese → English).
//!
//! `rdev::listen` is a blocking call that must live on its own OS thread.
//! [`KeyboardInput`] owns that thread and a stop flag; dropping it sets the
//! flag so the callback silently ignores further events.  `rdev::listen` has
//! no graceful shutdown API, so the thread itself stays blocked until the
//! process exits.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Instant;

use crate::config::InputConfig;

use super::{DigitalInput, EdgeSender, GpioError, Level, Pin};

// ---------------------------------------------------------------------------
// KeyboardInput
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct KeyLevels {
    trigger: AtomicBool,
    mode: AtomicBool,
}

/// Handle to a running keyboard listener thread.
pub struct KeyboardInput {
    trigger_pin: Pin,
    mode_pin: Pin,
    levels: Arc<KeyLevels>,
    stop: Arc<AtomicBool>,
    _thread: std::thread::JoinHandle<()>,
}

impl KeyboardInput {
    /// Spawn the listener thread.
    ///
    /// Trigger key presses are reported through `edges`; auto-repeat presses
    /// while the key is already down are not edges.
    pub fn start(config: &InputConfig, edges: EdgeSender) -> Result<Self, GpioError> {
        let trigger_key = parse_key(&config.trigger_key)
            .ok_or_else(|| GpioError::UnknownKey(config.trigger_key.clone()))?;
        let mode_key = parse_key(&config.mode_key)
            .ok_or_else(|| GpioError::UnknownKey(config.mode_key.clone()))?;

        let levels = Arc::new(KeyLevels::default());
        let stop = Arc::new(AtomicBool::new(false));

        let thread_levels = Arc::clone(&levels);
        let thread_stop = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("keyboard-pins".into())
            .spawn(move || {
                let result = rdev::listen(move |event| {
                    if thread_stop.load(Ordering::Relaxed) {
                        return;
                    }

                    match event.event_type {
                        rdev::EventType::KeyPress(k) if k == trigger_key => {
                            let was_high = thread_levels.trigger.swap(true, Ordering::SeqCst);
                            if !was_high {
                                edges.rising_edge(Instant::now());
                            }
                        }
                        rdev::EventType::KeyRelease(k) if k == trigger_key => {
                            thread_levels.trigger.store(false, Ordering::SeqCst);
                        }
                        rdev::EventType::KeyPress(k) if k == mode_key => {
                            let high = !thread_levels.mode.fetch_xor(true, Ordering::SeqCst);
                            log::info!(
                                "keyboard-pins: mode pin now {:?}",
                                Level::from(high)
                            );
                        }
                        _ => {}
                    }
                });

                if let Err(e) = result {
                    log::error!("keyboard-pins: rdev::listen exited with error: {:?}", e);
                }
            })
            .map_err(|e| GpioError::Unavailable {
                pin: Pin(config.trigger_pin),
                message: format!("cannot spawn keyboard listener: {e}"),
            })?;

        log::info!(
            "keyboard-pins: {} = trigger, {} = mode toggle",
            config.trigger_key,
            config.mode_key
        );

        Ok(Self {
            trigger_pin: Pin(config.trigger_pin),
            mode_pin: Pin(config.mode_pin),
            levels,
            stop,
            _thread: thread,
        })
    }
}

impl DigitalInput for KeyboardInput {
    fn read_level(&self, pin: Pin) -> Level {
        if pin == self.trigger_pin {
            Level::from(self.levels.trigger.load(Ordering::SeqCst))
        } else if pin == self.mode_pin {
            Level::from(self.levels.mode.load(Ordering::SeqCst))
        } else {
            Level::Low
        }
    }
}

impl Drop for KeyboardInput {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Parse a key name from a config string into an [`rdev::Key`].
///
/// Supports F1–F12 and a handful of named keys.  Returns `None` for
/// unrecognised names.
///
/// ```
/// use voice_translate::gpio::parse_key;
///
/// assert_eq!(parse_key("F9"),    Some(rdev::Key::F9));
/// assert_eq!(parse_key("Space"), Some(rdev::Key::Space));
/// assert_eq!(parse_key("xyz"),   None);
/// ```
pub fn parse_key(key_str: &str) -> Option<rdev::Key> {
    match key_str {
        "F1" => Some(rdev::Key::F1),
        "F2" => Some(rdev::Key::F2),
        "F3" => Some(rdev::Key::F3),
        "F4" => Some(rdev::Key::F4),
        "F5" => Some(rdev::Key::F5),
        "F6" => Some(rdev::Key::F6),
        "F7" => Some(rdev::Key::F7),
        "F8" => Some(rdev::Key::F8),
        "F9" => Some(rdev::Key::F9),
        "F10" => Some(rdev::Key::F10),
        "F11" => Some(rdev::Key::F11),
        "F12" => Some(rdev::Key::F12),

        "Space" => Some(rdev::Key::Space),
        "Return" | "Enter" => Some(rdev::Key::Return),
        "Tab" => Some(rdev::Key::Tab),
        "CapsLock" => Some(rdev::Key::CapsLock),
        "ScrollLock" => Some(rdev::Key::ScrollLock),
        "Pause" => Some(rdev::Key::Pause),
        "Insert" => Some(rdev::Key::Insert),
        "ControlRight" | "RightCtrl" => Some(rdev::Key::ControlRight),
        "AltGr" => Some(rdev::Key::AltGr),

        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_function_keys() {
        assert_eq!(parse_key("F9"), Some(rdev::Key::F9));
        assert_eq!(parse_key("F10"), Some(rdev::Key::F10));
        assert_eq!(parse_key("F12"), Some(rdev::Key::F12));
    }

    #[test]
    fn parse_named_keys() {
        assert_eq!(parse_key("Space"), Some(rdev::Key::Space));
        assert_eq!(parse_key("Enter"), Some(rdev::Key::Return));
        assert_eq!(parse_key("RightCtrl"), Some(rdev::Key::ControlRight));
    }

    #[test]
    fn parse_unknown_key_returns_none() {
        assert_eq!(parse_key("xyz"), None);
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("f9"), None);
    }
}
