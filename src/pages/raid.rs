//! RAID page: array state, member layout and member disks from Glances.

use super::format::NA;
use super::{PageContext, Screen};
use crate::telemetry::{GlancesKey, Need, Readings};
use std::time::Duration;

pub fn needs() -> Vec<Need> {
    vec![Need::Glances(GlancesKey::Raid, Duration::from_secs(5))]
}

pub fn compose(readings: &impl Readings, _ctx: &PageContext) -> Screen {
    let entry = readings
        .md_name()
        .and_then(|md| readings.raid_arrays()?.get(md));

    let status = entry
        .and_then(|r| r.status.as_deref())
        .map_or_else(|| NA.to_string(), str::to_lowercase);
    let state = match entry.and_then(|r| r.raid_type.as_deref()) {
        Some(kind) => format!("{} ({})", status, kind.to_lowercase()),
        None => status,
    };

    let config = entry.and_then(|r| r.config.as_deref()).unwrap_or(NA);
    let mut health = match entry.and_then(|r| r.used.zip(r.available)) {
        Some((used, available)) => format!("{}/{} {}", used, available, config),
        None => config.to_string(),
    };
    if entry.is_some_and(|r| r.is_degraded()) {
        health = format!("DEGRADED {}", health);
    }

    let members = entry.map(|r| r.member_names()).unwrap_or_default();
    let disks = if members.is_empty() {
        NA.to_string()
    } else {
        members.join(" ")
    };

    Screen::new("RAID")
        .line("State:", state)
        .line("Health:", health)
        .line("Disks:", disks)
}
