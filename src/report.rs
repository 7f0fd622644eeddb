//! One-shot status report: everything the daemon would show and alarm on.

use crate::alarms::AlarmRules;
use crate::navigation::View;
use crate::pages::{self, PageContext, Screen};
use crate::raid::{RaidHealth, RaidStatus};
use crate::telemetry::{Readings, ReadingsSnapshot};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub readings: ReadingsSnapshot,
    pub raid: Option<RaidStatus>,
    pub raid_health: Option<RaidHealth>,
    /// Alarm predicates that currently hold
    pub active_alarms: Vec<String>,
    /// Home first, then every detail page in button order
    pub screens: Vec<Screen>,
}

impl StatusReport {
    pub fn build(readings: ReadingsSnapshot, rules: &AlarmRules, ctx: &PageContext) -> Self {
        let raid = readings.raid_status();
        let raid_health = raid.as_ref().map(RaidStatus::health);
        let active_alarms = rules
            .conditions(&readings)
            .into_iter()
            .filter(|c| c.active)
            .map(|c| c.id)
            .collect();
        let screens = std::iter::once(View::Home)
            .chain((0..pages::Page::ALL.len()).map(View::Page))
            .map(|view| pages::render(view, &readings, ctx))
            .collect();

        Self {
            readings,
            raid,
            raid_health,
            active_alarms,
            screens,
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let md = self.readings.md_name().unwrap_or("unknown");
        match &self.raid {
            Some(raid) => writeln!(
                f,
                "RAID {}: {:?}/{} ({:?})",
                md, raid.array_state, raid.sync_action, self.raid_health
            )?,
            None => writeln!(f, "RAID {}: unavailable", md)?,
        }
        if self.active_alarms.is_empty() {
            writeln!(f, "Alarms: none")?;
        } else {
            writeln!(f, "Alarms: {}", self.active_alarms.join(", "))?;
        }
        for screen in &self.screens {
            writeln!(f)?;
            writeln!(f, "{}", screen)?;
        }
        Ok(())
    }
}
