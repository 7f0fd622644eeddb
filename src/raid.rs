//! Interpretation of raw md array fields.

use crate::telemetry::data::RaidRaw;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Health reported by `/sys/block/<md>/md/array_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayState {
    Clean,
    Active,
    Degraded,
    Readonly,
    Inactive,
    Unknown,
}

impl ArrayState {
    /// Map a raw sysfs value. Anything unrecognised is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_lowercase();
        if raw.contains("degraded") {
            return ArrayState::Degraded;
        }
        match raw.as_str() {
            "clean" => ArrayState::Clean,
            "active" | "active-idle" | "write-pending" => ArrayState::Active,
            "readonly" | "read-auto" => ArrayState::Readonly,
            "inactive" | "clear" | "suspended" => ArrayState::Inactive,
            _ => ArrayState::Unknown,
        }
    }
}

/// Background operation reported by `/sys/block/<md>/md/sync_action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Idle,
    Resync,
    Recovery,
    Check,
    Repair,
    Frozen,
    Unknown,
}

impl SyncAction {
    /// Map a raw sysfs value. Anything unrecognised is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "idle" => SyncAction::Idle,
            "resync" => SyncAction::Resync,
            "recover" | "recovery" => SyncAction::Recovery,
            "check" => SyncAction::Check,
            "repair" => SyncAction::Repair,
            "frozen" => SyncAction::Frozen,
            _ => SyncAction::Unknown,
        }
    }

    /// A sync operation with progress figures is running.
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            SyncAction::Resync | SyncAction::Recovery | SyncAction::Check | SyncAction::Repair
        )
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncAction::Idle => "idle",
            SyncAction::Resync => "resync",
            SyncAction::Recovery => "recovery",
            SyncAction::Check => "check",
            SyncAction::Repair => "repair",
            SyncAction::Frozen => "frozen",
            SyncAction::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Semantic array state shown on the display and used by alarms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaidHealth {
    Clean,
    Degraded,
    /// A resync, recovery, check or repair is running
    Syncing(SyncAction),
    Unknown,
}

/// Interpreted array status. Derived from [`RaidRaw`] on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaidStatus {
    pub array_state: ArrayState,
    pub sync_action: SyncAction,
    /// Percent complete; present only while a sync is in progress
    pub progress: Option<f64>,
    pub eta_minutes: Option<f64>,
    pub speed_kbs: Option<f64>,
}

impl RaidStatus {
    pub fn interpret(raw: &RaidRaw) -> Self {
        let array_state = raw
            .array_state
            .as_deref()
            .map_or(ArrayState::Unknown, ArrayState::parse);
        let sync_action = raw
            .sync_action
            .as_deref()
            .map_or(SyncAction::Unknown, SyncAction::parse);

        let (progress, eta_minutes, speed_kbs) = if sync_action.is_in_progress() {
            (raw.progress, raw.finish_min, raw.speed_kps)
        } else {
            (None, None, None)
        };

        Self {
            array_state,
            sync_action,
            progress,
            eta_minutes,
            speed_kbs,
        }
    }

    /// Degraded dominates; a running sync dominates the array state otherwise.
    pub fn health(&self) -> RaidHealth {
        if self.array_state == ArrayState::Degraded {
            return RaidHealth::Degraded;
        }
        if self.sync_action.is_in_progress() {
            return RaidHealth::Syncing(self.sync_action);
        }
        match (self.array_state, self.sync_action) {
            (ArrayState::Clean | ArrayState::Active, SyncAction::Idle | SyncAction::Frozen) => {
                RaidHealth::Clean
            }
            _ => RaidHealth::Unknown,
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.sync_action.is_in_progress()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(array_state: &str, sync_action: &str) -> RaidRaw {
        RaidRaw {
            array_state: Some(array_state.to_string()),
            sync_action: Some(sync_action.to_string()),
            progress: Some(42.5),
            finish_min: Some(90.0),
            speed_kps: Some(120_000.0),
        }
    }

    #[test]
    fn test_clean_combinations() {
        for (array, sync) in [("clean", "idle"), ("active", "idle"), ("clean", "frozen"), ("active", "frozen")] {
            let status = RaidStatus::interpret(&raw(array, sync));
            assert_eq!(status.health(), RaidHealth::Clean, "{} + {}", array, sync);
            assert_eq!(status.progress, None);
            assert_eq!(status.eta_minutes, None);
        }
    }

    #[test]
    fn test_sync_action_dominates_active() {
        let status = RaidStatus::interpret(&raw("active", "resync"));
        assert_eq!(status.health(), RaidHealth::Syncing(SyncAction::Resync));
        assert_eq!(status.progress, Some(42.5));
        assert_eq!(status.eta_minutes, Some(90.0));
        assert_eq!(status.speed_kbs, Some(120_000.0));

        for (sync, action) in [
            ("recover", SyncAction::Recovery),
            ("recovery", SyncAction::Recovery),
            ("check", SyncAction::Check),
            ("repair", SyncAction::Repair),
        ] {
            let status = RaidStatus::interpret(&raw("clean", sync));
            assert_eq!(status.health(), RaidHealth::Syncing(action));
            assert!(status.progress.is_some());
        }
    }

    #[test]
    fn test_degraded_regardless_of_sync() {
        let status = RaidStatus::interpret(&raw("degraded", "idle"));
        assert_eq!(status.health(), RaidHealth::Degraded);
        assert_eq!(status.progress, None);

        let rebuilding = RaidStatus::interpret(&raw("degraded", "recovery"));
        assert_eq!(rebuilding.health(), RaidHealth::Degraded);
        assert_eq!(rebuilding.progress, Some(42.5));
    }

    #[test]
    fn test_unrecognised_values_are_unknown() {
        let status = RaidStatus::interpret(&raw("clean", "foo"));
        assert_eq!(status.sync_action, SyncAction::Unknown);
        assert_eq!(status.health(), RaidHealth::Unknown);
        assert_eq!(status.progress, None);
        assert_eq!(status.speed_kbs, None);

        assert_eq!(ArrayState::parse("bogus"), ArrayState::Unknown);
        assert_eq!(
            RaidStatus::interpret(&RaidRaw::default()).health(),
            RaidHealth::Unknown
        );
    }

    #[test]
    fn test_array_state_variants() {
        assert_eq!(ArrayState::parse("read-auto"), ArrayState::Readonly);
        assert_eq!(ArrayState::parse("inactive\n"), ArrayState::Inactive);
        assert_eq!(ArrayState::parse("active-idle"), ArrayState::Active);
        assert_eq!(
            RaidStatus::interpret(&raw("readonly", "idle")).health(),
            RaidHealth::Unknown
        );
    }
}
