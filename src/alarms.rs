//! Alarm evaluation with per-alarm debouncing.
//!
//! Every alarm condition is one row of a table produced by [`AlarmRules`]:
//! an identifier, a kind (level with cooldown, or edge), a buzzer pattern
//! and whether its predicate currently holds. [`AlarmEngine`] keeps one
//! [`AlarmRecord`] per identifier and decides which rows fire this tick.
//! Predicates only read cached data; absent data is never a fault.

use crate::config::Config;
use crate::hardware::buzzer::Pattern;
use crate::raid::RaidHealth;
use crate::telemetry::{GlancesKey, Need, RaidKey, Readings, SystemKey};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const RAID_DEGRADED: &str = "raid_degraded";
pub const RAID_RESYNC_START: &str = "raid_resync_start";
pub const POWER_UNDERVOLTAGE: &str = "power_undervoltage";

pub fn temp_warn_id(disk: &str) -> String {
    format!("temp_{}_warn", disk)
}

pub fn temp_critical_id(disk: &str) -> String {
    format!("temp_{}_critical", disk)
}

pub fn smart_fault_id(disk: &str) -> String {
    format!("smart_{}_realloc", disk)
}

/// How an alarm turns a predicate into firings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmKind {
    /// Fires while the predicate holds, at most once per `cooldown`.
    Level { cooldown: Duration },
    /// Fires once per false-to-true transition of the predicate.
    Edge,
}

/// Per-alarm state, created on first evaluation and kept for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmRecord {
    pub id: String,
    pub kind: AlarmKind,
    pub last_fired_at: Option<Instant>,
    /// The predicate held at the previous evaluation
    pub active_latched: bool,
}

impl AlarmRecord {
    pub fn new(id: impl Into<String>, kind: AlarmKind) -> Self {
        Self {
            id: id.into(),
            kind,
            last_fired_at: None,
            active_latched: false,
        }
    }

    /// Feed one predicate observation; returns whether the alarm fires.
    pub fn observe(&mut self, active: bool, now: Instant) -> bool {
        if !active {
            // last_fired_at stays: a level cooldown keeps running while clear.
            self.active_latched = false;
            return false;
        }

        let fire = match self.kind {
            AlarmKind::Level { cooldown } => self
                .last_fired_at
                .map_or(true, |last| now.saturating_duration_since(last) >= cooldown),
            AlarmKind::Edge => !self.active_latched,
        };
        self.active_latched = true;
        if fire {
            self.last_fired_at = Some(now);
        }
        fire
    }
}

/// One evaluated row of the alarm table.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub id: String,
    pub kind: AlarmKind,
    pub pattern: Pattern,
    pub active: bool,
}

/// An alarm that fired and the pattern it plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing {
    pub id: String,
    pub pattern: Pattern,
}

/// Thresholds and cooldown shared by every rule.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmRules {
    pub cooldown: Duration,
    pub temp_warn_celsius: f64,
    pub temp_critical_celsius: f64,
}

impl Default for AlarmRules {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl AlarmRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cooldown: config.alarm_cooldown(),
            temp_warn_celsius: f64::from(config.temp_warn_celsius),
            temp_critical_celsius: f64::from(config.temp_critical_celsius),
        }
    }

    /// Cached keys the rules read, with the freshness they want.
    pub fn needs(&self) -> Vec<Need> {
        vec![
            Need::Raid(RaidKey::Status, Duration::from_secs(5)),
            Need::Glances(GlancesKey::Smart, Duration::from_secs(10)),
            Need::System(SystemKey::PowerThrottled, Duration::from_secs(10)),
        ]
    }

    /// Evaluate every rule against the cached readings.
    pub fn conditions(&self, readings: &impl Readings) -> Vec<Condition> {
        let level = AlarmKind::Level {
            cooldown: self.cooldown,
        };
        let raid = readings.raid_status();
        let degraded = raid
            .as_ref()
            .is_some_and(|s| s.health() == RaidHealth::Degraded);

        let mut conditions = vec![
            Condition {
                id: RAID_DEGRADED.to_string(),
                kind: level,
                pattern: Pattern::Double,
                active: degraded,
            },
            Condition {
                id: POWER_UNDERVOLTAGE.to_string(),
                kind: level,
                pattern: Pattern::Double,
                active: readings.power().is_some_and(|p| p.has_current_issue()),
            },
        ];

        // Without md data there is no row: the edge keeps its latch until
        // an idle array is actually observed.
        if let Some(status) = &raid {
            conditions.push(Condition {
                id: RAID_RESYNC_START.to_string(),
                kind: AlarmKind::Edge,
                pattern: Pattern::Short,
                active: status.is_syncing(),
            });
        }

        for (disk, smart) in readings.smart().into_iter().flatten() {
            let temp = smart.temperature_c;
            conditions.push(Condition {
                id: temp_warn_id(disk),
                kind: level,
                pattern: Pattern::Short,
                active: temp.is_some_and(|t| {
                    t >= self.temp_warn_celsius && t < self.temp_critical_celsius
                }),
            });
            conditions.push(Condition {
                id: temp_critical_id(disk),
                kind: level,
                pattern: Pattern::Triple,
                active: temp.is_some_and(|t| t >= self.temp_critical_celsius),
            });
            conditions.push(Condition {
                id: smart_fault_id(disk),
                kind: level,
                pattern: Pattern::Long,
                active: smart.has_bad_sectors(),
            });
        }

        conditions
    }
}

/// Debouncing state for every alarm seen so far.
#[derive(Debug, Default)]
pub struct AlarmEngine {
    rules: AlarmRules,
    records: HashMap<String, AlarmRecord>,
}

impl AlarmEngine {
    pub fn new(rules: AlarmRules) -> Self {
        Self {
            rules,
            records: HashMap::new(),
        }
    }

    pub fn rules(&self) -> &AlarmRules {
        &self.rules
    }

    /// Evaluate the rules against cached readings and return what fires.
    pub fn check(&mut self, readings: &impl Readings, now: Instant) -> Vec<Firing> {
        let conditions = self.rules.conditions(readings);
        self.evaluate(&conditions, now)
    }

    /// Apply one tick of conditions.
    ///
    /// Level records with no row this tick (a disk missing from the SMART
    /// data) are observed as inactive. Edge records keep their latch.
    pub fn evaluate(&mut self, conditions: &[Condition], now: Instant) -> Vec<Firing> {
        let mut fired = Vec::new();
        let mut seen = HashSet::with_capacity(conditions.len());

        for condition in conditions {
            seen.insert(condition.id.as_str());
            let record = self
                .records
                .entry(condition.id.clone())
                .or_insert_with(|| AlarmRecord::new(&condition.id, condition.kind));
            let was_latched = record.active_latched;

            record.kind = condition.kind;
            if record.observe(condition.active, now) {
                info!(alarm = %condition.id, pattern = ?condition.pattern, "alarm fired");
                fired.push(Firing {
                    id: condition.id.clone(),
                    pattern: condition.pattern,
                });
            } else if was_latched && !condition.active {
                debug!(alarm = %condition.id, "alarm cleared");
            }
        }

        for record in self.records.values_mut() {
            let level = matches!(record.kind, AlarmKind::Level { .. });
            if level && record.active_latched && !seen.contains(record.id.as_str()) {
                debug!(alarm = %record.id, "alarm cleared, no data");
                record.active_latched = false;
            }
        }

        fired
    }

    pub fn record(&self, id: &str) -> Option<&AlarmRecord> {
        self.records.get(id)
    }

    /// Identifiers whose predicate held at the last evaluation.
    pub fn active(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .records
            .values()
            .filter(|r| r.active_latched)
            .map(|r| r.id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }
}
