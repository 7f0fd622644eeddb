//! Storage page: capacity of the RAID mount.

use super::format::{fmt_bytes, fmt_percent};
use super::{PageContext, Screen};
use crate::telemetry::{GlancesKey, Need, Readings};
use std::time::Duration;

pub fn needs() -> Vec<Need> {
    vec![Need::Glances(GlancesKey::Fs, Duration::from_secs(5))]
}

pub fn compose(readings: &impl Readings, ctx: &PageContext) -> Screen {
    let fs = readings.filesystem(&ctx.raid_mount);

    Screen::new("Storage")
        .line("Used:", fmt_bytes(fs.map(|f| f.used)))
        .line("Free:", fmt_bytes(fs.map(|f| f.free)))
        .line("Pct:", fmt_percent(fs.map(|f| f.percent)))
}
