//! Glances REST API source.

use crate::error::{Result, StatusError};
use crate::telemetry::data::*;
use crate::telemetry::traits::DataSource;
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

lazy_static! {
    static ref DISK_NAME: Regex = Regex::new(r"^(sd[a-z]+|nvme\d+n\d+|hd[a-z]+)$").unwrap();
    static ref FIRST_NUMBER: Regex = Regex::new(r"-?\d+(\.\d+)?").unwrap();
}

/// Glances endpoints the daemon reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GlancesKey {
    Cpu,
    Load,
    Mem,
    Fs,
    Network,
    Raid,
    DiskIo,
    Smart,
    Sensors,
}

impl GlancesKey {
    pub const ALL: [GlancesKey; 9] = [
        GlancesKey::Cpu,
        GlancesKey::Load,
        GlancesKey::Mem,
        GlancesKey::Fs,
        GlancesKey::Network,
        GlancesKey::Raid,
        GlancesKey::DiskIo,
        GlancesKey::Smart,
        GlancesKey::Sensors,
    ];

    /// Path segment under the API base URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            GlancesKey::Cpu => "cpu",
            GlancesKey::Load => "load",
            GlancesKey::Mem => "mem",
            GlancesKey::Fs => "fs",
            GlancesKey::Network => "network",
            GlancesKey::Raid => "raid",
            GlancesKey::DiskIo => "diskio",
            GlancesKey::Smart => "smart",
            GlancesKey::Sensors => "sensors",
        }
    }
}

/// Decoded payload of one Glances endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum GlancesValue {
    Cpu(CpuStats),
    Load(LoadStats),
    Mem(MemStats),
    Fs(Vec<FsEntry>),
    Network(Vec<NetEntry>),
    Raid(RaidMap),
    DiskIo(Vec<DiskIoEntry>),
    Smart(SmartMap),
    Sensors(Vec<SensorEntry>),
}

/// HTTP client for a local Glances instance.
pub struct GlancesSource {
    client: reqwest::Client,
    base_url: String,
}

impl GlancesSource {
    /// Create a source for `base_url` (e.g. `http://localhost:61208/api/4`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, key: GlancesKey) -> String {
        format!("{}/{}", self.base_url, key.endpoint())
    }
}

impl DataSource for GlancesSource {
    type Key = GlancesKey;
    type Value = GlancesValue;

    fn name(&self) -> &'static str {
        "glances"
    }

    async fn fetch(&self, key: &GlancesKey) -> Result<GlancesValue> {
        let body: Value = self
            .client
            .get(self.url_for(*key))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        decode(*key, body)
    }
}

/// Decode a raw endpoint payload into its typed value.
pub fn decode(key: GlancesKey, body: Value) -> Result<GlancesValue> {
    Ok(match key {
        GlancesKey::Cpu => GlancesValue::Cpu(typed(body)?),
        GlancesKey::Load => GlancesValue::Load(typed(body)?),
        GlancesKey::Mem => GlancesValue::Mem(typed(body)?),
        GlancesKey::Fs => GlancesValue::Fs(typed(body)?),
        GlancesKey::Network => GlancesValue::Network(typed(body)?),
        GlancesKey::Raid => GlancesValue::Raid(typed(body)?),
        GlancesKey::DiskIo => GlancesValue::DiskIo(typed(body)?),
        GlancesKey::Smart => GlancesValue::Smart(parse_smart(&body)?),
        GlancesKey::Sensors => GlancesValue::Sensors(typed(body)?),
    })
}

fn typed<T: DeserializeOwned>(body: Value) -> Result<T> {
    Ok(serde_json::from_value(body)?)
}

/// Reduce the Glances SMART payload to the attributes the daemon uses.
///
/// The payload is a list of per-device objects whose SMART attributes are
/// keyed by attribute id. Devices that are not plain disks are skipped.
pub fn parse_smart(body: &Value) -> Result<SmartMap> {
    let devices = body
        .as_array()
        .ok_or_else(|| StatusError::parse_error("SMART payload is not a list"))?;

    let mut parsed = SmartMap::new();
    for obj in devices.iter().filter_map(Value::as_object) {
        let Some(dev) = obj
            .get("DeviceName")
            .and_then(Value::as_str)
            .and_then(|name| name.split_whitespace().next())
        else {
            continue;
        };
        if !DISK_NAME.is_match(dev) {
            continue;
        }

        let counter = |ids: &[&str]| attribute(obj, ids, None).map(|v| v.max(0.0) as u64);
        let disk = SmartDisk {
            temperature_c: attribute(obj, &["194", "190"], Some("temp")),
            power_on_hours: counter(&["9"]),
            power_cycles: counter(&["12"]),
            reallocated_sectors: counter(&["5"]),
            pending_sectors: counter(&["197"]),
            uncorrectable_sectors: counter(&["198"]),
            crc_errors: counter(&["199"]),
        };
        insert_smart(&mut parsed, dev.to_string(), disk);
    }
    Ok(parsed)
}

/// First number of the raw value of the first matching attribute.
fn attribute(
    obj: &serde_json::Map<String, Value>,
    ids: &[&str],
    name_filter: Option<&str>,
) -> Option<f64> {
    ids.iter().find_map(|id| {
        let attr = obj.get(*id)?.as_object()?;
        if let Some(filter) = name_filter {
            let name = attr.get("name").and_then(Value::as_str).unwrap_or("");
            if !name.to_lowercase().contains(filter) {
                return None;
            }
        }
        let raw = match attr.get("raw")? {
            Value::String(s) => s.clone(),
            Value::Null => return None,
            other => other.to_string(),
        };
        FIRST_NUMBER.find(&raw)?.as_str().parse().ok()
    })
}
