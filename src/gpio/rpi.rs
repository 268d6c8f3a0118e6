//! Raspberry Pi GPIO backend via `rppal`.
//!
//! Both pins are configured as inputs with pull-down resistors, matching the
//! appliance wiring (button and mode switch pull the line to 3V3).  The
//! trigger pin gets an asynchronous rising-edge interrupt; `rppal` runs the
//! callback on its own interrupt thread, which only reports the edge.

use std::sync::Mutex;
use std::time::Instant;

use rppal::gpio::{Event, Gpio, InputPin, Trigger};

use crate::config::InputConfig;

use super::{DigitalInput, EdgeSender, GpioError, Level, Pin};

/// Trigger and mode pins on the GPIO header.
pub struct GpioInput {
    trigger_pin: Pin,
    mode_pin: Pin,
    trigger: Mutex<InputPin>,
    mode: InputPin,
}

impl GpioInput {
    /// Open the GPIO controller and register the trigger interrupt.
    pub fn open(config: &InputConfig, edges: EdgeSender) -> Result<Self, GpioError> {
        let trigger_pin = Pin(config.trigger_pin);
        let mode_pin = Pin(config.mode_pin);

        let unavailable = |pin: Pin| {
            move |e: rppal::gpio::Error| GpioError::Unavailable {
                pin,
                message: e.to_string(),
            }
        };

        let gpio = Gpio::new().map_err(unavailable(trigger_pin))?;

        let mut trigger = gpio
            .get(trigger_pin.0)
            .map_err(unavailable(trigger_pin))?
            .into_input_pulldown();
        let mode = gpio
            .get(mode_pin.0)
            .map_err(unavailable(mode_pin))?
            .into_input_pulldown();

        // Debouncing happens in EdgeSender so both backends share it.
        trigger
            .set_async_interrupt(Trigger::RisingEdge, None, move |_event: Event| {
                edges.rising_edge(Instant::now());
            })
            .map_err(unavailable(trigger_pin))?;

        log::info!("gpio: trigger on {trigger_pin}, mode on {mode_pin}");

        Ok(Self {
            trigger_pin,
            mode_pin,
            trigger: Mutex::new(trigger),
            mode,
        })
    }
}

fn level(l: rppal::gpio::Level) -> Level {
    match l {
        rppal::gpio::Level::High => Level::High,
        rppal::gpio::Level::Low => Level::Low,
    }
}

impl DigitalInput for GpioInput {
    fn read_level(&self, pin: Pin) -> Level {
        if pin == self.mode_pin {
            level(self.mode.read())
        } else if pin == self.trigger_pin {
            match self.trigger.lock() {
                Ok(p) => level(p.read()),
                Err(poisoned) => level(poisoned.into_inner().read()),
            }
        } else {
            Level::Low
        }
    }
}

impl Drop for GpioInput {
    fn drop(&mut self) {
        if let Ok(mut p) = self.trigger.lock() {
            let _ = p.clear_async_interrupt();
        }
    }
}
