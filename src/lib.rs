//! # oled_status - Raspberry Pi OLED status daemon
//!
//! Samples system, storage and network health on a Raspberry Pi NAS, shows
//! it on a small OLED panel and beeps a piezo buzzer when something needs
//! attention.
//!
//! ## Features
//!
//! - **TTL source cache**: Glances API, md RAID sysfs attributes and host facts,
//!   each key fetched at most once per freshness window and bounded by a timeout
//! - **RAID interpretation**: raw `array_state`/`sync_action` mapped to clean,
//!   degraded, syncing or unknown
//! - **Alarms**: level alarms with a cooldown, plus an edge alarm when a resync starts
//! - **Navigation**: one button cycles detail pages; inactivity returns home
//! - **GPIO**: button and buzzer drivers behind the `gpio` feature
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oled_status::{
//!     button_channel, Config, DefaultBuzzer, GlancesSource, LogDisplay, MdadmSource,
//!     Scheduler, SystemSource, Telemetry,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let telemetry = Telemetry::new(
//!         GlancesSource::new(&config.glances_url, config.fetch_timeout())?,
//!         MdadmSource::new("md0"),
//!         SystemSource::default(),
//!         Some("md0".to_string()),
//!         config.fetch_timeout(),
//!     );
//!     let (_presses, buttons) = button_channel();
//!     let buzzer = DefaultBuzzer::new(config.buzzer_pin)?;
//!
//!     let mut scheduler = Scheduler::new(&config, telemetry, LogDisplay::new(), buzzer, buttons);
//!     scheduler.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//!     Ok(())
//! }
//! ```

pub mod alarms;
pub mod config;
pub mod error;
pub mod hardware;
pub mod navigation;
pub mod pages;
pub mod raid;
pub mod report;
pub mod scheduler;
pub mod telemetry;

// Re-export public API
pub use alarms::{AlarmEngine, AlarmKind, AlarmRecord, AlarmRules, Firing};
pub use config::Config;
pub use error::{Result, StatusError};
pub use hardware::{
    button_channel, Button, Buzzer, DefaultButton, DefaultBuzzer, Display, LogDisplay, Pattern,
};
pub use navigation::{ButtonEvent, Navigator, View};
pub use pages::{Page, PageContext, Screen};
pub use raid::{ArrayState, RaidHealth, RaidStatus, SyncAction};
pub use report::StatusReport;
pub use scheduler::{AnimationFrame, Scheduler, TickOutcome};
pub use telemetry::{
    DataSource, GlancesSource, MdadmSource, Need, Readings, ReadingsSnapshot, SourceCache,
    SystemSource, Telemetry,
};

/// The default Glances REST API base URL
pub const DEFAULT_GLANCES_URL: &str = "http://localhost:61208/api/4";

/// The default mount point of the monitored array
pub const DEFAULT_RAID_MOUNT: &str = "/mnt/storage";
