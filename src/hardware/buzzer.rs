//! Piezo buzzer patterns and drivers.
//!
//! The GPIO driver is feature-gated; without `gpio` a logging stand-in is used.

use crate::error::{Result, StatusError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Patterns queued per driver before new ones are dropped.
pub const PATTERN_QUEUE_DEPTH: usize = 8;

/// Named beep sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Single short beep (warning)
    Short,
    /// Single long beep (critical)
    Long,
    /// Two short beeps (attention)
    Double,
    /// Three short beeps (urgent)
    Triple,
}

impl Pattern {
    /// `(on_ms, off_ms)` pulses.
    pub fn pulses(self) -> &'static [(u64, u64)] {
        match self {
            Pattern::Short => &[(100, 100)],
            Pattern::Long => &[(500, 100)],
            Pattern::Double => &[(100, 100), (100, 100)],
            Pattern::Triple => &[(100, 100), (100, 100), (100, 100)],
        }
    }

    /// Total playback time in milliseconds.
    pub fn duration_ms(self) -> u64 {
        self.pulses().iter().map(|(on, off)| on + off).sum()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pattern::Short => "short",
            Pattern::Long => "long",
            Pattern::Double => "double",
            Pattern::Triple => "triple",
        };
        f.write_str(name)
    }
}

impl FromStr for Pattern {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "short" => Ok(Pattern::Short),
            "long" => Ok(Pattern::Long),
            "double" => Ok(Pattern::Double),
            "triple" => Ok(Pattern::Triple),
            other => Err(StatusError::parse_error(format!("unknown buzzer pattern: {}", other))),
        }
    }
}

/// Trait for buzzer drivers.
pub trait Buzzer: Send {
    /// Queue a pattern for playback. Must not block the caller.
    fn play(&mut self, pattern: Pattern) -> Result<()>;

    /// Stop playback and leave the buzzer off.
    fn silence(&mut self) -> Result<()>;
}

#[cfg(feature = "gpio")]
mod raspberry_pi {
    use super::*;
    use rppal::gpio::{Gpio, OutputPin};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{mpsc, Notify};
    use tokio::task::JoinHandle;
    use tracing::warn;

    const TONE_HZ: f64 = 2000.0;
    const DUTY_CYCLE: f64 = 0.5;

    /// Active-low piezo buzzer on a GPIO pin, played from a background task.
    pub struct GpioBuzzer {
        patterns: Option<mpsc::Sender<Pattern>>,
        stop: Arc<Notify>,
        task: Option<JoinHandle<()>>,
    }

    impl GpioBuzzer {
        /// Claim `pin` and start the playback task. Requires a Tokio runtime.
        pub fn new(pin: u8) -> Result<Self> {
            let gpio = Gpio::new().map_err(|e| {
                StatusError::gpio_error(format!("Failed to initialize GPIO: {}", e))
            })?;
            let mut output = gpio
                .get(pin)
                .map_err(|e| StatusError::gpio_error(format!("Failed to access pin {}: {}", pin, e)))?
                .into_output();
            output.set_high();

            let (tx, rx) = mpsc::channel(PATTERN_QUEUE_DEPTH);
            let stop = Arc::new(Notify::new());
            let task = tokio::spawn(play_patterns(output, rx, stop.clone()));

            Ok(Self {
                patterns: Some(tx),
                stop,
                task: Some(task),
            })
        }
    }

    async fn play_patterns(mut pin: OutputPin, mut rx: mpsc::Receiver<Pattern>, stop: Arc<Notify>) {
        'patterns: loop {
            let pattern = tokio::select! {
                _ = stop.notified() => break 'patterns,
                next = rx.recv() => match next {
                    Some(pattern) => pattern,
                    None => break 'patterns,
                },
            };

            for &(on_ms, off_ms) in pattern.pulses() {
                if let Err(e) = pin.set_pwm_frequency(TONE_HZ, DUTY_CYCLE) {
                    warn!("Buzzer PWM failed: {}", e);
                }
                let on = tokio::time::sleep(Duration::from_millis(on_ms));
                let interrupted = tokio::select! {
                    _ = stop.notified() => true,
                    _ = on => false,
                };
                let _ = pin.clear_pwm();
                pin.set_high();
                if interrupted {
                    break 'patterns;
                }
                tokio::time::sleep(Duration::from_millis(off_ms)).await;
            }
        }
        let _ = pin.clear_pwm();
        pin.set_high();
    }

    impl Buzzer for GpioBuzzer {
        fn play(&mut self, pattern: Pattern) -> Result<()> {
            let Some(tx) = &self.patterns else {
                return Err(StatusError::gpio_error("buzzer already silenced"));
            };
            match tx.try_send(pattern) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Buzzer queue full, dropping {} pattern", pattern);
                    Ok(())
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    Err(StatusError::gpio_error("buzzer task stopped"))
                }
            }
        }

        fn silence(&mut self) -> Result<()> {
            self.patterns = None;
            self.stop.notify_one();
            // The task drives the pin high on its way out.
            self.task.take();
            Ok(())
        }
    }

    impl Drop for GpioBuzzer {
        fn drop(&mut self) {
            let _ = self.silence();
        }
    }
}

#[cfg(not(feature = "gpio"))]
mod mock {
    use super::*;
    use tracing::info;

    /// Buzzer stand-in for systems without GPIO support; logs each pattern.
    pub struct LogBuzzer {
        silenced: bool,
    }

    impl LogBuzzer {
        pub fn new(pin: u8) -> Result<Self> {
            info!("GPIO not available, buzzer on pin {} will only log", pin);
            Ok(Self { silenced: false })
        }
    }

    impl Buzzer for LogBuzzer {
        fn play(&mut self, pattern: Pattern) -> Result<()> {
            if self.silenced {
                return Err(StatusError::gpio_error("buzzer already silenced"));
            }
            info!("Buzzer: {} ({} ms)", pattern, pattern.duration_ms());
            Ok(())
        }

        fn silence(&mut self) -> Result<()> {
            self.silenced = true;
            Ok(())
        }
    }
}

// Re-export the appropriate buzzer driver
#[cfg(feature = "gpio")]
pub use raspberry_pi::GpioBuzzer as DefaultBuzzer;

#[cfg(not(feature = "gpio"))]
pub use mock::LogBuzzer as DefaultBuzzer;
