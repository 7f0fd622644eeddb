//! Telemetry sources and the TTL cache in front of them.
//!
//! Three collaborators feed the daemon: the Glances REST API, the md RAID
//! attributes in sysfs, and host facts (IP, uptime, vcgencmd). Each sits
//! behind a [`SourceCache`] so consumers choose their own freshness while
//! sharing a single fetch per key.

pub mod cache;
pub mod context;
pub mod data;
pub mod glances;
pub mod mdadm;
pub mod system;
pub mod traits;

// Re-export commonly used items
pub use cache::{CacheEntry, Fetched, SourceCache};
pub use context::{Need, ReadingsSnapshot, RefreshBatch, RefreshResults, Telemetry};
pub use glances::{GlancesKey, GlancesSource, GlancesValue};
pub use mdadm::{discover_md_device, MdadmSource, RaidKey};
pub use system::{SystemKey, SystemSource, SystemValue};
pub use traits::{DataSource, Readings};
