//! Hardware collaborators: push button, piezo buzzer and display.
//!
//! Button and buzzer drivers are feature-gated behind `gpio`; without it,
//! logging stand-ins are exported under the same `Default*` names.

pub mod button;
pub mod buzzer;
pub mod display;

pub use button::{button_channel, Button, Debouncer, DefaultButton};
pub use buzzer::{Buzzer, DefaultBuzzer, Pattern};
pub use display::{Display, LogDisplay};
