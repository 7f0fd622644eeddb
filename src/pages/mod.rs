//! Page composition.
//!
//! A page turns whatever telemetry is cached into a [`Screen`]: a title,
//! optional icons and up to three label/value lines. Drawing the screen is
//! the display driver's business. Pages never fetch; each declares the keys
//! it reads through [`Page::needs`] so the scheduler can keep them fresh.

pub mod format;
pub mod home;
pub mod network;
pub mod raid;
pub mod storage;
pub mod system;
pub mod temps;

use crate::config::Config;
use crate::navigation::View;
use crate::raid::RaidHealth;
use crate::telemetry::{Need, Readings, SystemKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Frames in the rebuild spinner.
pub const SPINNER_FRAMES: usize = 4;

/// Icons a screen can carry. Animated icons hold the frame to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "icon", content = "frame", rename_all = "snake_case")]
pub enum Icon {
    Clean,
    Rebuild(usize),
    Degraded(usize),
    Unknown(usize),
    Power(usize),
}

impl Icon {
    /// Icon for a RAID health at animation step `frame`.
    pub fn for_health(health: Option<RaidHealth>, frame: usize) -> Self {
        match health {
            Some(RaidHealth::Clean) => Icon::Clean,
            Some(RaidHealth::Syncing(_)) => Icon::Rebuild(frame % SPINNER_FRAMES),
            Some(RaidHealth::Degraded) => Icon::Degraded(blink(frame)),
            Some(RaidHealth::Unknown) | None => Icon::Unknown(blink(frame)),
        }
    }
}

/// Two-phase blink at half the spinner rate.
fn blink(frame: usize) -> usize {
    (frame / 2) % 2
}

/// One label/value row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub label: String,
    pub value: String,
}

impl Line {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Everything the display needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    pub title: String,
    /// Small icon at the right of the header
    pub header_icon: Option<Icon>,
    /// Large icon at the left of the body
    pub body_icon: Option<Icon>,
    pub lines: Vec<Line>,
}

impl Screen {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            header_icon: None,
            body_icon: None,
            lines: Vec::new(),
        }
    }

    /// Plain text screen for loading and error messages.
    pub fn message(line1: &str, line2: Option<&str>) -> Self {
        let mut screen = Self::new(line1);
        if let Some(line2) = line2 {
            screen.lines.push(Line::new(line2, ""));
        }
        screen
    }

    pub fn with_header_icon(mut self, icon: Option<Icon>) -> Self {
        self.header_icon = icon;
        self
    }

    pub fn with_body_icon(mut self, icon: Icon) -> Self {
        self.body_icon = Some(icon);
        self
    }

    pub fn line(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.lines.push(Line::new(label, value));
        self
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.title)?;
        if let Some(icon) = self.header_icon {
            write!(f, " {:?}", icon)?;
        }
        for line in &self.lines {
            if line.value.is_empty() {
                write!(f, "\n  {}", line.label)?;
            } else {
                write!(f, "\n  {} {}", line.label, line.value.trim_start())?;
            }
        }
        Ok(())
    }
}

/// Settings and animation state a page may consult while composing.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContext {
    pub raid_mount: String,
    pub network_interface: String,
    pub temp_warn_celsius: f64,
    pub temp_critical_celsius: f64,
    pub frame: usize,
}

impl PageContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            raid_mount: config.raid_mount.clone(),
            network_interface: config.network_interface.clone(),
            temp_warn_celsius: f64::from(config.temp_warn_celsius),
            temp_critical_celsius: f64::from(config.temp_critical_celsius),
            frame: 0,
        }
    }

    pub fn with_frame(mut self, frame: usize) -> Self {
        self.frame = frame;
        self
    }

    pub(crate) fn temp(&self, celsius: Option<f64>) -> String {
        format::fmt_temp(celsius, self.temp_warn_celsius, self.temp_critical_celsius)
    }

    /// Header icon: power warning while under-voltage or throttled, else RAID health.
    pub(crate) fn header_icon(&self, readings: &impl Readings) -> Option<Icon> {
        if readings.power().is_some_and(|p| p.has_current_issue()) {
            return Some(Icon::Power(blink(self.frame)));
        }
        let health = readings.raid_status().map(|s| s.health());
        Some(Icon::for_health(health, self.frame))
    }
}

impl Default for PageContext {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Keys every screen header reads.
fn header_needs() -> Vec<Need> {
    vec![
        Need::System(SystemKey::PowerThrottled, Duration::from_secs(5)),
        Need::Raid(crate::telemetry::RaidKey::Status, Duration::from_secs(2)),
    ]
}

/// Browsable detail pages, in button order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Network,
    System,
    Storage,
    Raid,
    Temps,
}

impl Page {
    pub const ALL: [Page; 5] = [
        Page::Network,
        Page::System,
        Page::Storage,
        Page::Raid,
        Page::Temps,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Page::Network => "Network",
            Page::System => "System",
            Page::Storage => "Storage",
            Page::Raid => "RAID",
            Page::Temps => "Temps",
        }
    }

    pub fn needs(self) -> Vec<Need> {
        match self {
            Page::Network => network::needs(),
            Page::System => system::needs(),
            Page::Storage => storage::needs(),
            Page::Raid => raid::needs(),
            Page::Temps => temps::needs(),
        }
    }

    pub fn compose(self, readings: &impl Readings, ctx: &PageContext) -> Screen {
        let screen = match self {
            Page::Network => network::compose(readings, ctx),
            Page::System => system::compose(readings, ctx),
            Page::Storage => storage::compose(readings, ctx),
            Page::Raid => raid::compose(readings, ctx),
            Page::Temps => temps::compose(readings, ctx),
        };
        screen.with_header_icon(ctx.header_icon(readings))
    }
}

/// Keys the given view reads, header included.
pub fn needs_for(view: View) -> Vec<Need> {
    let mut needs = header_needs();
    match view {
        View::Home => needs.extend(home::needs()),
        View::Page(i) => {
            if let Some(page) = Page::ALL.get(i) {
                needs.extend(page.needs());
            }
        }
    }
    needs
}

/// Compose the screen for a view. Out-of-range pages fall back to Home.
pub fn render(view: View, readings: &impl Readings, ctx: &PageContext) -> Screen {
    match view {
        View::Page(i) if i < Page::ALL.len() => Page::ALL[i].compose(readings, ctx),
        _ => home::compose(readings, ctx).with_header_icon(ctx.header_icon(readings)),
    }
}
