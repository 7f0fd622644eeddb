//! Push button input.
//!
//! The button is wired between a GPIO pin and ground with the internal
//! pull-up enabled, so a press is a falling edge. Presses are debounced
//! where the interrupt arrives and handed to the scheduler over a bounded
//! channel; the scheduler never blocks on it.

use crate::error::Result;
use crate::navigation::ButtonEvent;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Minimum spacing between accepted presses.
pub const DEBOUNCE: Duration = Duration::from_millis(250);

/// Presses buffered while the scheduler is busy.
pub const BUTTON_QUEUE_DEPTH: usize = 8;

/// Create the press channel between a button driver and the scheduler.
pub fn button_channel() -> (mpsc::Sender<ButtonEvent>, mpsc::Receiver<ButtonEvent>) {
    mpsc::channel(BUTTON_QUEUE_DEPTH)
}

/// Rejects edges arriving within `window` of the last accepted one.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn accept(&mut self, now: Instant) -> bool {
        let accepted = self
            .last
            .map_or(true, |last| now.saturating_duration_since(last) >= self.window);
        if accepted {
            self.last = Some(now);
        }
        accepted
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE)
    }
}

/// Debounce one edge and enqueue a press; returns whether one was sent.
///
/// A full queue drops the press rather than blocking the caller.
pub fn forward_press(
    debouncer: &mut Debouncer,
    tx: &mpsc::Sender<ButtonEvent>,
    now: Instant,
) -> bool {
    debouncer.accept(now) && tx.try_send(ButtonEvent::Pressed).is_ok()
}

/// A registered button that can be unhooked at shutdown.
pub trait Button: Send {
    /// Deregister the input. Further presses are ignored.
    fn release(&mut self) -> Result<()>;
}

#[cfg(feature = "gpio")]
mod raspberry_pi {
    use super::*;
    use crate::error::StatusError;
    use rppal::gpio::{Gpio, InputPin, Trigger};
    use tracing::debug;

    /// Button on a GPIO pin, reported through an async interrupt.
    pub struct GpioButton {
        pin: Option<InputPin>,
    }

    impl GpioButton {
        /// Claim `pin` and start forwarding debounced presses into `tx`.
        pub fn listen(pin: u8, tx: mpsc::Sender<ButtonEvent>) -> Result<Self> {
            let gpio = Gpio::new().map_err(|e| {
                StatusError::gpio_error(format!("Failed to initialize GPIO: {}", e))
            })?;
            let mut input = gpio
                .get(pin)
                .map_err(|e| StatusError::gpio_error(format!("Failed to access pin {}: {}", pin, e)))?
                .into_input_pullup();

            let mut debouncer = Debouncer::default();
            input
                .set_async_interrupt(Trigger::FallingEdge, move |_level| {
                    if forward_press(&mut debouncer, &tx, Instant::now()) {
                        debug!("Button press");
                    }
                })
                .map_err(|e| {
                    StatusError::gpio_error(format!("Failed to watch pin {}: {}", pin, e))
                })?;

            Ok(Self { pin: Some(input) })
        }
    }

    impl Button for GpioButton {
        fn release(&mut self) -> Result<()> {
            if let Some(mut pin) = self.pin.take() {
                pin.clear_async_interrupt()
                    .map_err(|e| StatusError::gpio_error(format!("Failed to release button: {}", e)))?;
            }
            Ok(())
        }
    }

    impl Drop for GpioButton {
        fn drop(&mut self) {
            let _ = self.release();
        }
    }
}

#[cfg(not(feature = "gpio"))]
mod mock {
    use super::*;
    use tracing::info;

    /// Button stand-in for systems without GPIO support. Never presses.
    pub struct NoButton {
        _tx: Option<mpsc::Sender<ButtonEvent>>,
    }

    impl NoButton {
        pub fn listen(pin: u8, tx: mpsc::Sender<ButtonEvent>) -> Result<Self> {
            info!("GPIO not available, button on pin {} is inactive", pin);
            Ok(Self { _tx: Some(tx) })
        }
    }

    impl Button for NoButton {
        fn release(&mut self) -> Result<()> {
            self._tx = None;
            Ok(())
        }
    }
}

// Re-export the appropriate button driver
#[cfg(feature = "gpio")]
pub use raspberry_pi::GpioButton as DefaultButton;

#[cfg(not(feature = "gpio"))]
pub use mock::NoButton as DefaultButton;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_window() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::default();

        assert!(debouncer.accept(t0));
        assert!(!debouncer.accept(t0 + Duration::from_millis(100)));
        assert!(!debouncer.accept(t0 + Duration::from_millis(249)));
        assert!(debouncer.accept(t0 + Duration::from_millis(250)));
        // The window restarts from the last accepted edge.
        assert!(!debouncer.accept(t0 + Duration::from_millis(400)));
    }

    #[test]
    fn test_forward_press_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut debouncer = Debouncer::new(Duration::ZERO);
        let t0 = Instant::now();

        assert!(forward_press(&mut debouncer, &tx, t0));
        assert!(!forward_press(&mut debouncer, &tx, t0 + Duration::from_millis(1)));
        assert_eq!(rx.try_recv().ok(), Some(ButtonEvent::Pressed));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_bounce_yields_single_press() {
        let (tx, mut rx) = button_channel();
        let mut debouncer = Debouncer::default();
        let t0 = Instant::now();

        for ms in [0, 3, 7, 20, 120] {
            forward_press(&mut debouncer, &tx, t0 + Duration::from_millis(ms));
        }
        assert_eq!(rx.try_recv().ok(), Some(ButtonEvent::Pressed));
        assert!(rx.try_recv().is_err());
    }
}
