//! Home view: RAID overview in clean, in-progress and degraded variants.

use super::format::{fmt_eta, fmt_percent, fmt_rate, NA};
use super::{blink, Icon, PageContext, Screen, SPINNER_FRAMES};
use crate::raid::{ArrayState, RaidStatus};
use crate::telemetry::{GlancesKey, Need, RaidKey, Readings};
use std::time::Duration;

pub fn needs() -> Vec<Need> {
    vec![
        Need::Raid(RaidKey::Status, Duration::from_secs(2)),
        Need::Glances(GlancesKey::Fs, Duration::from_secs(5)),
        Need::Glances(GlancesKey::Raid, Duration::from_secs(5)),
        Need::Glances(GlancesKey::DiskIo, Duration::from_secs(2)),
        Need::Glances(GlancesKey::Smart, Duration::from_secs(10)),
    ]
}

/// Pick the variant from the RAID state: in-progress while a sync runs,
/// degraded for a degraded idle array, clean otherwise.
pub fn compose(readings: &impl Readings, ctx: &PageContext) -> Screen {
    match readings.raid_status() {
        Some(status) if status.is_syncing() => in_progress(&status, ctx),
        Some(status) if status.array_state == ArrayState::Degraded => degraded(readings, ctx),
        _ => clean(readings, ctx),
    }
}

fn in_progress(status: &RaidStatus, ctx: &PageContext) -> Screen {
    Screen::new("Resyncing...")
        .with_body_icon(Icon::Rebuild(ctx.frame % SPINNER_FRAMES))
        .line("Prog:", fmt_percent(status.progress))
        .line("Rate:", fmt_rate(status.speed_kbs))
        .line("ETA:", fmt_eta(status.eta_minutes))
}

fn degraded(readings: &impl Readings, ctx: &PageContext) -> Screen {
    let entry = readings
        .md_name()
        .and_then(|md| readings.raid_arrays()?.get(md));
    let disks = entry
        .and_then(|r| r.used.zip(r.available))
        .map_or_else(|| NA.to_string(), |(used, available)| format!("{}/{}", used, available));
    let raid_type = entry
        .and_then(|r| r.raid_type.as_deref())
        .map_or_else(|| NA.to_string(), str::to_uppercase);

    Screen::new("DEGRADED")
        .with_body_icon(Icon::Degraded(blink(ctx.frame)))
        .line("Disks:", disks)
        .line("Type:", raid_type)
        .line("Temp:", ctx.temp(readings.hottest_disk()))
}

fn clean(readings: &impl Readings, ctx: &PageContext) -> Screen {
    let used = readings.filesystem(&ctx.raid_mount).map(|fs| fs.percent);
    let rw = readings.md_name().and_then(|md| {
        readings
            .disk_io()?
            .iter()
            .find(|d| d.disk_name == md)
            .map(|d| d.total_kibps())
    });

    Screen::new("Online")
        .with_body_icon(Icon::Clean)
        .line("Used:", fmt_percent(used))
        .line("R/W:", fmt_rate(rw))
        .line("Temp:", ctx.temp(readings.hottest_disk()))
}
