//! The scheduler-owned bundle of source caches.

use crate::telemetry::cache::{Fetched, SourceCache};
use crate::telemetry::data::*;
use crate::telemetry::glances::{GlancesKey, GlancesSource, GlancesValue};
use crate::telemetry::mdadm::{MdadmSource, RaidKey};
use crate::telemetry::system::{SystemKey, SystemSource, SystemValue};
use crate::telemetry::traits::{DataSource, Readings};
use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// A source serving the Glances endpoints.
pub trait GlancesFeed: DataSource<Key = GlancesKey, Value = GlancesValue> {}
impl<T: DataSource<Key = GlancesKey, Value = GlancesValue>> GlancesFeed for T {}

/// A source serving raw md array state.
pub trait RaidFeed: DataSource<Key = RaidKey, Value = RaidRaw> {}
impl<T: DataSource<Key = RaidKey, Value = RaidRaw>> RaidFeed for T {}

/// A source serving host facts.
pub trait SystemFeed: DataSource<Key = SystemKey, Value = SystemValue> {}
impl<T: DataSource<Key = SystemKey, Value = SystemValue>> SystemFeed for T {}

/// One cached key a consumer wants, and how old it may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Need {
    Glances(GlancesKey, Duration),
    Raid(RaidKey, Duration),
    System(SystemKey, Duration),
}

impl Need {
    /// Every key of every source, at one TTL.
    pub fn everything(ttl: Duration) -> Vec<Need> {
        GlancesKey::ALL
            .iter()
            .map(|k| Need::Glances(*k, ttl))
            .chain(std::iter::once(Need::Raid(RaidKey::Status, ttl)))
            .chain(SystemKey::ALL.iter().map(|k| Need::System(*k, ttl)))
            .collect()
    }
}

/// Fetches of one data refresh across all three sources.
pub struct RefreshResults<G: DataSource, R: DataSource, S: DataSource> {
    started_at: Instant,
    glances: Vec<Fetched<G>>,
    raid: Vec<Fetched<R>>,
    system: Vec<Fetched<S>>,
}

impl<G: DataSource, R: DataSource, S: DataSource> RefreshResults<G, R, S> {
    pub fn len(&self) -> usize {
        self.glances.len() + self.raid.len() + self.system.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A data refresh in flight. Owns its sources, so the loop can keep
/// ticking while it runs.
pub type RefreshBatch<G, R, S> = BoxFuture<'static, RefreshResults<G, R, S>>;

/// All source caches plus the resolved md device name.
///
/// Owned by the scheduler; nothing else holds cache state.
pub struct Telemetry<G = GlancesSource, R = MdadmSource, S = SystemSource>
where
    G: GlancesFeed,
    R: RaidFeed,
    S: SystemFeed,
{
    pub glances: SourceCache<G>,
    pub raid: SourceCache<R>,
    pub system: SourceCache<S>,
    md_name: Option<String>,
}

impl<G: GlancesFeed, R: RaidFeed, S: SystemFeed> Telemetry<G, R, S> {
    pub fn new(glances: G, raid: R, system: S, md_name: Option<String>, fetch_timeout: Duration) -> Self {
        Self {
            glances: SourceCache::new(glances, fetch_timeout),
            raid: SourceCache::new(raid, fetch_timeout),
            system: SourceCache::new(system, fetch_timeout),
            md_name,
        }
    }

    /// Refresh every stale key in `needs`; the three sources run concurrently.
    /// Returns the number of fetches performed.
    pub async fn refresh(&mut self, needs: &[Need], now: Instant) -> usize {
        match self.begin_refresh(needs, now) {
            Some(batch) => {
                let results = batch.await;
                self.finish_refresh(results)
            }
            None => 0,
        }
    }

    /// Start fetching every stale key in `needs`, or `None` when all are fresh.
    ///
    /// Nothing is stored until the batch's output is passed to
    /// [`Telemetry::finish_refresh`]. Keep at most one batch in flight.
    pub fn begin_refresh(&self, needs: &[Need], now: Instant) -> Option<RefreshBatch<G, R, S>> {
        let mut glances_keys = Vec::new();
        let mut raid_keys = Vec::new();
        let mut system_keys = Vec::new();
        for need in needs {
            match *need {
                Need::Glances(key, ttl) => glances_keys.push((key, ttl)),
                Need::Raid(key, ttl) => raid_keys.push((key, ttl)),
                Need::System(key, ttl) => system_keys.push((key, ttl)),
            }
        }

        let glances_keys = self.glances.stale(&glances_keys, now);
        let raid_keys = self.raid.stale(&raid_keys, now);
        let system_keys = self.system.stale(&system_keys, now);
        if glances_keys.is_empty() && raid_keys.is_empty() && system_keys.is_empty() {
            return None;
        }

        let glances = self.glances.fetch_stale(glances_keys);
        let raid = self.raid.fetch_stale(raid_keys);
        let system = self.system.fetch_stale(system_keys);
        Some(
            async move {
                let (glances, raid, system) = tokio::join!(glances, raid, system);
                RefreshResults {
                    started_at: now,
                    glances,
                    raid,
                    system,
                }
            }
            .boxed(),
        )
    }

    /// Store a finished batch. Returns the number of fetches it performed.
    pub fn finish_refresh(&mut self, results: RefreshResults<G, R, S>) -> usize {
        let RefreshResults {
            started_at,
            glances,
            raid,
            system,
        } = results;
        self.glances.complete(glances, started_at)
            + self.raid.complete(raid, started_at)
            + self.system.complete(system, started_at)
    }

    /// Drop every cached value.
    pub fn invalidate_all(&mut self) {
        self.glances.invalidate(None);
        self.raid.invalidate(None);
        self.system.invalidate(None);
    }

    /// Owned copy of everything currently cached.
    pub fn capture(&self) -> ReadingsSnapshot {
        ReadingsSnapshot {
            captured_at: Utc::now(),
            cpu: self.cpu().cloned(),
            load: self.load().cloned(),
            mem: self.mem().cloned(),
            filesystems: self.filesystems().map(<[FsEntry]>::to_vec),
            networks: self.networks().map(<[NetEntry]>::to_vec),
            raid_arrays: self.raid_arrays().cloned(),
            disk_io: self.disk_io().map(<[DiskIoEntry]>::to_vec),
            smart: self.smart().cloned(),
            sensors: self.sensors().map(<[SensorEntry]>::to_vec),
            raid_raw: self.raid_raw().cloned(),
            md_name: self.md_name.clone(),
            ip_address: self.ip_address(),
            uptime_secs: self.uptime_secs(),
            power: self.power().cloned(),
            vc_cpu_temp: self.vc_cpu_temp(),
        }
    }
}

macro_rules! glances_value {
    ($self:ident, $variant:ident) => {
        match $self.glances.peek(&GlancesKey::$variant)? {
            GlancesValue::$variant(value) => Some(value),
            _ => None,
        }
    };
}

macro_rules! system_value {
    ($self:ident, $variant:ident, $key:ident) => {
        match $self.system.peek(&SystemKey::$key)? {
            SystemValue::$variant(value) => Some(value),
            _ => None,
        }
    };
}

impl<G: GlancesFeed, R: RaidFeed, S: SystemFeed> Readings for Telemetry<G, R, S> {
    fn cpu(&self) -> Option<&CpuStats> {
        glances_value!(self, Cpu)
    }

    fn load(&self) -> Option<&LoadStats> {
        glances_value!(self, Load)
    }

    fn mem(&self) -> Option<&MemStats> {
        glances_value!(self, Mem)
    }

    fn filesystems(&self) -> Option<&[FsEntry]> {
        glances_value!(self, Fs).map(Vec::as_slice)
    }

    fn networks(&self) -> Option<&[NetEntry]> {
        glances_value!(self, Network).map(Vec::as_slice)
    }

    fn raid_arrays(&self) -> Option<&RaidMap> {
        glances_value!(self, Raid)
    }

    fn disk_io(&self) -> Option<&[DiskIoEntry]> {
        glances_value!(self, DiskIo).map(Vec::as_slice)
    }

    fn smart(&self) -> Option<&SmartMap> {
        glances_value!(self, Smart)
    }

    fn sensors(&self) -> Option<&[SensorEntry]> {
        glances_value!(self, Sensors).map(Vec::as_slice)
    }

    fn raid_raw(&self) -> Option<&RaidRaw> {
        self.raid.peek(&RaidKey::Status)
    }

    fn md_name(&self) -> Option<&str> {
        self.md_name.as_deref()
    }

    fn ip_address(&self) -> Option<IpAddr> {
        system_value!(self, Ip, Ip).copied()
    }

    fn uptime_secs(&self) -> Option<f64> {
        system_value!(self, Uptime, Uptime).copied()
    }

    fn power(&self) -> Option<&PowerFlags> {
        system_value!(self, Power, PowerThrottled)
    }

    fn vc_cpu_temp(&self) -> Option<f64> {
        system_value!(self, CpuTemp, CpuTemp).copied()
    }
}

/// Telemetry frozen at one instant; used for one-shot reports and fixtures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingsSnapshot {
    pub captured_at: DateTime<Utc>,
    pub cpu: Option<CpuStats>,
    pub load: Option<LoadStats>,
    pub mem: Option<MemStats>,
    pub filesystems: Option<Vec<FsEntry>>,
    pub networks: Option<Vec<NetEntry>>,
    pub raid_arrays: Option<RaidMap>,
    pub disk_io: Option<Vec<DiskIoEntry>>,
    pub smart: Option<SmartMap>,
    pub sensors: Option<Vec<SensorEntry>>,
    pub raid_raw: Option<RaidRaw>,
    pub md_name: Option<String>,
    pub ip_address: Option<IpAddr>,
    pub uptime_secs: Option<f64>,
    pub power: Option<PowerFlags>,
    pub vc_cpu_temp: Option<f64>,
}

impl Readings for ReadingsSnapshot {
    fn cpu(&self) -> Option<&CpuStats> {
        self.cpu.as_ref()
    }

    fn load(&self) -> Option<&LoadStats> {
        self.load.as_ref()
    }

    fn mem(&self) -> Option<&MemStats> {
        self.mem.as_ref()
    }

    fn filesystems(&self) -> Option<&[FsEntry]> {
        self.filesystems.as_deref()
    }

    fn networks(&self) -> Option<&[NetEntry]> {
        self.networks.as_deref()
    }

    fn raid_arrays(&self) -> Option<&RaidMap> {
        self.raid_arrays.as_ref()
    }

    fn disk_io(&self) -> Option<&[DiskIoEntry]> {
        self.disk_io.as_deref()
    }

    fn smart(&self) -> Option<&SmartMap> {
        self.smart.as_ref()
    }

    fn sensors(&self) -> Option<&[SensorEntry]> {
        self.sensors.as_deref()
    }

    fn raid_raw(&self) -> Option<&RaidRaw> {
        self.raid_raw.as_ref()
    }

    fn md_name(&self) -> Option<&str> {
        self.md_name.as_deref()
    }

    fn ip_address(&self) -> Option<IpAddr> {
        self.ip_address
    }

    fn uptime_secs(&self) -> Option<f64> {
        self.uptime_secs
    }

    fn power(&self) -> Option<&PowerFlags> {
        self.power.as_ref()
    }

    fn vc_cpu_temp(&self) -> Option<f64> {
        self.vc_cpu_temp
    }
}
