//! Typed values produced by the data sources.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CPU utilisation from the Glances `cpu` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuStats {
    /// Total CPU usage percentage (0.0 to 100.0)
    pub total: f64,
}

/// System load averages from the Glances `load` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadStats {
    pub min1: f64,
    pub min5: f64,
    pub min15: f64,
}

/// Memory usage from the Glances `mem` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemStats {
    /// Total system memory in bytes
    pub total: u64,
    /// Available memory in bytes
    pub available: u64,
    /// Used memory in bytes
    pub used: u64,
    /// Memory usage percentage (0.0 to 100.0)
    pub percent: f64,
}

/// One mounted filesystem from the Glances `fs` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsEntry {
    pub device_name: String,
    pub fs_type: String,
    /// Mount point (e.g., "/", "/mnt/storage")
    pub mnt_point: String,
    pub size: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

/// One network interface from the Glances `network` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetEntry {
    pub interface_name: String,
    pub bytes_sent_rate_per_sec: f64,
    pub bytes_recv_rate_per_sec: f64,
}

/// One md array from the Glances `raid` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaidEntry {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub raid_type: Option<String>,
    /// Member layout, e.g. "UU" or "U_" when a member is missing
    pub config: Option<String>,
    pub used: Option<u64>,
    pub available: Option<u64>,
    pub members: Vec<String>,
    pub components: BTreeMap<String, serde_json::Value>,
}

impl RaidEntry {
    /// Member device names, preferring the explicit list over the component map.
    pub fn member_names(&self) -> Vec<String> {
        if !self.members.is_empty() {
            return self.members.clone();
        }
        self.components.keys().cloned().collect()
    }

    /// Whether the member layout shows a missing disk.
    pub fn is_degraded(&self) -> bool {
        self.config.as_deref().is_some_and(|c| c.contains('_'))
    }
}

/// Glances `raid` payload keyed by md device name.
pub type RaidMap = BTreeMap<String, RaidEntry>;

/// One block device from the Glances `diskio` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskIoEntry {
    pub disk_name: String,
    pub read_bytes_rate_per_sec: f64,
    pub write_bytes_rate_per_sec: f64,
}

impl DiskIoEntry {
    /// Combined read and write throughput in KiB/s.
    pub fn total_kibps(&self) -> f64 {
        (self.read_bytes_rate_per_sec + self.write_bytes_rate_per_sec) / 1024.0
    }
}

/// One sensor reading from the Glances `sensors` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorEntry {
    pub label: String,
    pub value: Option<f64>,
    pub unit: Option<String>,
}

/// Reduced SMART attributes for one disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmartDisk {
    pub temperature_c: Option<f64>,
    pub power_on_hours: Option<u64>,
    pub power_cycles: Option<u64>,
    pub reallocated_sectors: Option<u64>,
    pub pending_sectors: Option<u64>,
    pub uncorrectable_sectors: Option<u64>,
    pub crc_errors: Option<u64>,
}

impl SmartDisk {
    /// Whether any bad-sector counter is non-zero. Missing counters count as zero.
    pub fn has_bad_sectors(&self) -> bool {
        [
            self.reallocated_sectors,
            self.pending_sectors,
            self.uncorrectable_sectors,
        ]
        .iter()
        .any(|count| count.unwrap_or(0) > 0)
    }

    fn is_empty(&self) -> bool {
        *self == SmartDisk::default()
    }
}

/// SMART data keyed by short device name ("sda", "nvme0n1").
pub type SmartMap = BTreeMap<String, SmartDisk>;

/// Insert a disk only when at least one attribute was decoded.
pub(crate) fn insert_smart(map: &mut SmartMap, device: String, disk: SmartDisk) {
    if !disk.is_empty() {
        map.insert(device, disk);
    }
}

/// Raw md array fields read from sysfs and /proc/mdstat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaidRaw {
    /// Contents of `/sys/block/<md>/md/array_state`
    pub array_state: Option<String>,
    /// Contents of `/sys/block/<md>/md/sync_action`
    pub sync_action: Option<String>,
    /// Percent complete of the running sync
    pub progress: Option<f64>,
    /// Estimated minutes until the sync finishes
    pub finish_min: Option<f64>,
    /// Sync speed in K/sec
    pub speed_kps: Option<f64>,
}

/// Decoded `vcgencmd get_throttled` flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerFlags {
    pub under_voltage: bool,
    pub freq_capped: bool,
    pub throttled: bool,
    pub soft_temp_limit: bool,
    pub under_voltage_occurred: bool,
    pub freq_capped_occurred: bool,
    pub throttled_occurred: bool,
    pub soft_temp_limit_occurred: bool,
    /// Raw hex value as reported, e.g. "0x50005"
    pub raw: String,
}

impl PowerFlags {
    /// Decode the throttle bit field.
    pub fn from_bits(value: u32, raw: impl Into<String>) -> Self {
        Self {
            under_voltage: value & 0x1 != 0,
            freq_capped: value & 0x2 != 0,
            throttled: value & 0x4 != 0,
            soft_temp_limit: value & 0x8 != 0,
            under_voltage_occurred: value & 0x1_0000 != 0,
            freq_capped_occurred: value & 0x2_0000 != 0,
            throttled_occurred: value & 0x4_0000 != 0,
            soft_temp_limit_occurred: value & 0x8_0000 != 0,
            raw: raw.into(),
        }
    }

    /// A power problem is happening right now.
    pub fn has_current_issue(&self) -> bool {
        self.under_voltage || self.throttled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_flags_bits() {
        let flags = PowerFlags::from_bits(0x50005, "0x50005");
        assert!(flags.under_voltage);
        assert!(!flags.freq_capped);
        assert!(flags.throttled);
        assert!(flags.under_voltage_occurred);
        assert!(flags.throttled_occurred);
        assert!(!flags.soft_temp_limit_occurred);
        assert!(flags.has_current_issue());

        let history_only = PowerFlags::from_bits(0x10000, "0x10000");
        assert!(!history_only.has_current_issue());
    }

    #[test]
    fn test_bad_sectors() {
        let healthy = SmartDisk {
            temperature_c: Some(35.0),
            reallocated_sectors: Some(0),
            ..Default::default()
        };
        assert!(!healthy.has_bad_sectors());

        let pending = SmartDisk {
            pending_sectors: Some(2),
            ..Default::default()
        };
        assert!(pending.has_bad_sectors());
    }

    #[test]
    fn test_raid_entry_members() {
        let entry: RaidEntry = serde_json::from_str(
            r#"{"status":"active","type":"raid1","config":"U_","used":1,"available":2,
                "components":{"sdb1":"1","sda1":"0"}}"#,
        )
        .unwrap();
        assert_eq!(entry.member_names(), vec!["sda1", "sdb1"]);
        assert!(entry.is_degraded());
        assert_eq!(entry.raid_type.as_deref(), Some("raid1"));
    }
}
