//! Display sink for composed screens.
//!
//! Panel drivers (SSD1306 over I2C and friends) implement [`Display`]; the
//! default [`LogDisplay`] writes screen changes to the log instead.

use crate::error::Result;
use crate::pages::Screen;
use tracing::info;

/// Trait for display drivers.
pub trait Display: Send {
    /// Draw a composed screen.
    fn show(&mut self, screen: &Screen) -> Result<()>;

    /// Draw a one or two line message, used for loading and fatal errors.
    fn show_error(&mut self, line1: &str, line2: Option<&str>) -> Result<()> {
        self.show(&Screen::message(line1, line2))
    }

    /// Blank the panel.
    fn clear(&mut self) -> Result<()>;
}

/// Logs each screen that differs from the previous one.
#[derive(Debug, Default)]
pub struct LogDisplay {
    last: Option<Screen>,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently shown screen.
    pub fn current(&self) -> Option<&Screen> {
        self.last.as_ref()
    }
}

impl Display for LogDisplay {
    fn show(&mut self, screen: &Screen) -> Result<()> {
        if self.last.as_ref() != Some(screen) {
            info!("{}", screen);
            self.last = Some(screen.clone());
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if self.last.take().is_some() {
            info!("Display cleared");
        }
        Ok(())
    }
}
