//! Traits at the seams between sources, the cache and their consumers.

use crate::error::Result;
use crate::raid::RaidStatus;
use crate::telemetry::data::*;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::net::IpAddr;

/// A keyed external collaborator the cache fetches from.
///
/// Implementations perform exactly one fetch per call and report any failure
/// as an error; the cache decides what to do with it.
pub trait DataSource: Send + Sync + 'static {
    /// Key naming one value this source can produce.
    type Key: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;
    /// Value produced for a key.
    type Value: Clone + Send + Sync + 'static;

    /// Short source name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch the current value for `key`.
    fn fetch(&self, key: &Self::Key) -> impl Future<Output = Result<Self::Value>> + Send;
}

/// Read-only view of whatever telemetry is currently cached.
///
/// Every accessor returns `None` when the value is unknown: never fetched,
/// or the most recent fetch failed. Consumers must not read `None` as
/// "unchanged".
pub trait Readings {
    fn cpu(&self) -> Option<&CpuStats>;
    fn load(&self) -> Option<&LoadStats>;
    fn mem(&self) -> Option<&MemStats>;
    fn filesystems(&self) -> Option<&[FsEntry]>;
    fn networks(&self) -> Option<&[NetEntry]>;
    fn raid_arrays(&self) -> Option<&RaidMap>;
    fn disk_io(&self) -> Option<&[DiskIoEntry]>;
    fn smart(&self) -> Option<&SmartMap>;
    fn sensors(&self) -> Option<&[SensorEntry]>;
    fn raid_raw(&self) -> Option<&RaidRaw>;
    /// Resolved md device name, e.g. "md0".
    fn md_name(&self) -> Option<&str>;
    fn ip_address(&self) -> Option<IpAddr>;
    fn uptime_secs(&self) -> Option<f64>;
    fn power(&self) -> Option<&PowerFlags>;
    /// CPU temperature as reported by vcgencmd.
    fn vc_cpu_temp(&self) -> Option<f64>;

    /// Semantic RAID state, derived fresh from the raw fields on every call.
    fn raid_status(&self) -> Option<RaidStatus> {
        self.raid_raw().map(RaidStatus::interpret)
    }

    /// CPU temperature from a Glances sensor labelled cpu/core, else vcgencmd.
    fn cpu_temp(&self) -> Option<f64> {
        self.sensors()
            .and_then(|sensors| {
                sensors.iter().find_map(|s| {
                    let label = s.label.to_lowercase();
                    if label.contains("cpu") || label.contains("core") {
                        s.value
                    } else {
                        None
                    }
                })
            })
            .or_else(|| self.vc_cpu_temp())
    }

    /// Filesystem entry for a mount point.
    fn filesystem(&self, mount: &str) -> Option<&FsEntry> {
        self.filesystems()?.iter().find(|f| f.mnt_point == mount)
    }

    /// Hottest disk temperature across the SMART map.
    fn hottest_disk(&self) -> Option<f64> {
        self.smart()?
            .values()
            .filter_map(|d| d.temperature_c)
            .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))))
    }
}
