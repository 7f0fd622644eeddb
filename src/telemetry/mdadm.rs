//! md RAID source backed by sysfs and /proc/mdstat.

use crate::error::{Result, StatusError};
use crate::telemetry::data::RaidRaw;
use crate::telemetry::traits::DataSource;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

lazy_static! {
    static ref MD_DEVICE: Regex = Regex::new(r"^(md\d+)").unwrap();
    static ref MDSTAT_ARRAY: Regex = Regex::new(r"^(md\d+)\s*:").unwrap();
    static ref PERCENT: Regex =
        Regex::new(r"(resync|check|recover|recovery|repair|reshape)\s*=\s*([\d.]+)%").unwrap();
    static ref FINISH: Regex = Regex::new(r"finish=([\d.]+)min").unwrap();
    static ref SPEED: Regex = Regex::new(r"speed=([\d.]+)K/sec").unwrap();
}

/// Keys served by [`MdadmSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RaidKey {
    /// Raw array state, sync action and sync progress
    Status,
}

/// Reads the state of one md array.
pub struct MdadmSource {
    md_name: String,
    sys_root: PathBuf,
    proc_root: PathBuf,
}

impl MdadmSource {
    /// Source for `md_name` using the real `/sys` and `/proc`.
    pub fn new(md_name: impl Into<String>) -> Self {
        Self::with_roots(md_name, "/sys", "/proc")
    }

    /// Source reading sysfs and procfs below alternate roots.
    pub fn with_roots(
        md_name: impl Into<String>,
        sys_root: impl Into<PathBuf>,
        proc_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            md_name: md_name.into(),
            sys_root: sys_root.into(),
            proc_root: proc_root.into(),
        }
    }

    pub fn md_name(&self) -> &str {
        &self.md_name
    }

    async fn read_attr(&self, attr: &str) -> Result<Option<String>> {
        let path = self
            .sys_root
            .join("block")
            .join(&self.md_name)
            .join("md")
            .join(attr);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text.trim().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl DataSource for MdadmSource {
    type Key = RaidKey;
    type Value = RaidRaw;

    fn name(&self) -> &'static str {
        "mdadm"
    }

    async fn fetch(&self, _key: &RaidKey) -> Result<RaidRaw> {
        let array_state = self.read_attr("array_state").await?;
        let sync_action = self.read_attr("sync_action").await?;
        if array_state.is_none() && sync_action.is_none() {
            return Err(StatusError::raid_error(format!(
                "{} has no md attributes in sysfs",
                self.md_name
            )));
        }

        let mut raw = RaidRaw {
            array_state,
            sync_action,
            ..Default::default()
        };

        let syncing = raw
            .sync_action
            .as_deref()
            .is_some_and(|action| !matches!(action, "idle" | "frozen"));
        if syncing {
            match tokio::fs::read_to_string(self.proc_root.join("mdstat")).await {
                Ok(mdstat) => {
                    let progress = parse_sync_progress(&mdstat, &self.md_name);
                    raw.progress = progress.percent;
                    raw.finish_min = progress.finish_min;
                    raw.speed_kps = progress.speed_kps;
                }
                Err(e) => debug!("mdstat unreadable, no sync progress: {}", e),
            }
        }

        Ok(raw)
    }
}

/// Sync progress figures parsed from /proc/mdstat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncProgress {
    pub percent: Option<f64>,
    pub finish_min: Option<f64>,
    pub speed_kps: Option<f64>,
}

/// Extract the progress lines belonging to `md_name` from /proc/mdstat.
pub fn parse_sync_progress(mdstat: &str, md_name: &str) -> SyncProgress {
    let Some(section) = array_section(mdstat, md_name) else {
        return SyncProgress::default();
    };

    let percent = PERCENT
        .captures(&section)
        .and_then(|caps| caps[2].parse().ok());
    let capture = |re: &Regex| re.captures(&section).and_then(|caps| caps[1].parse().ok());

    SyncProgress {
        percent,
        finish_min: capture(&FINISH),
        speed_kps: capture(&SPEED),
    }
}

/// Lines of /proc/mdstat from `md_name :` up to the next array header.
fn array_section(mdstat: &str, md_name: &str) -> Option<String> {
    let mut lines = mdstat.lines().skip_while(|line| {
        MDSTAT_ARRAY
            .captures(line)
            .map_or(true, |caps| &caps[1] != md_name)
    });
    let header = lines.next()?;
    let body = lines.take_while(|line| !MDSTAT_ARRAY.is_match(line) && !line.trim().is_empty());
    Some(std::iter::once(header).chain(body).collect::<Vec<_>>().join("\n"))
}

/// md device backing `mount` according to a /proc/mounts listing.
pub fn md_from_mounts(mounts: &str, mount: &str) -> Option<String> {
    mounts.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let dev = fields.next()?;
        let mnt = fields.next()?;
        if mnt != mount {
            return None;
        }
        let base = Path::new(dev).file_name()?.to_str()?;
        MD_DEVICE.captures(base).map(|caps| caps[1].to_string())
    })
}

/// First array listed in /proc/mdstat.
pub fn md_from_mdstat(mdstat: &str) -> Option<String> {
    mdstat
        .lines()
        .find_map(|line| MDSTAT_ARRAY.captures(line).map(|caps| caps[1].to_string()))
}

/// Locate the md device to monitor.
///
/// Preference order: the device mounted at `prefer_mount`, the first array
/// in mdstat, then the first `/dev/md<N>` node.
pub fn discover_md_device(prefer_mount: &str, proc_root: &Path, dev_root: &Path) -> Option<String> {
    if let Ok(mounts) = fs::read_to_string(proc_root.join("mounts")) {
        if let Some(name) = md_from_mounts(&mounts, prefer_mount) {
            return Some(name);
        }
    }

    if let Ok(mdstat) = fs::read_to_string(proc_root.join("mdstat")) {
        if let Some(name) = md_from_mdstat(&mdstat) {
            return Some(name);
        }
    }

    let mut nodes: Vec<String> = fs::read_dir(dev_root)
        .ok()?
        .filter_map(|entry| entry.ok()?.file_name().into_string().ok())
        .filter(|name| {
            name.strip_prefix("md")
                .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        })
        .collect();
    nodes.sort();
    nodes.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MDSTAT_RESYNC: &str = "\
Personalities : [raid1]
md1 : active raid1 sdc1[0] sdd1[1]
      976630464 blocks super 1.2 [2/2] [UU]
      [=>...................]  check =  9.1% (1/2) finish=300.0min speed=1000K/sec

md0 : active raid1 sdb1[1] sda1[0]
      3906885440 blocks super 1.2 [2/2] [UU]
      [====>................]  resync = 21.3% (832000000/3906885440) finish=312.5min speed=163840K/sec
      bitmap: 22/30 pages [88KB], 65536KB chunk

unused devices: <none>
";

    #[test]
    fn test_parse_progress_scoped_to_array() {
        let progress = parse_sync_progress(MDSTAT_RESYNC, "md0");
        assert_eq!(progress.percent, Some(21.3));
        assert_eq!(progress.finish_min, Some(312.5));
        assert_eq!(progress.speed_kps, Some(163840.0));

        let other = parse_sync_progress(MDSTAT_RESYNC, "md1");
        assert_eq!(other.percent, Some(9.1));
        assert_eq!(other.speed_kps, Some(1000.0));

        assert_eq!(parse_sync_progress(MDSTAT_RESYNC, "md7"), SyncProgress::default());
    }

    #[test]
    fn test_md_from_mounts() {
        let mounts = "/dev/mmcblk0p2 / ext4 rw 0 0\n/dev/md0p1 /mnt/storage ext4 rw 0 0\n";
        assert_eq!(md_from_mounts(mounts, "/mnt/storage"), Some("md0".to_string()));
        assert_eq!(md_from_mounts(mounts, "/"), None);
    }

    #[test]
    fn test_md_from_mdstat() {
        assert_eq!(md_from_mdstat(MDSTAT_RESYNC), Some("md1".to_string()));
        assert_eq!(md_from_mdstat("Personalities : []\nunused devices: <none>\n"), None);
    }

    #[test]
    fn test_discover_prefers_mount_then_mdstat_then_dev() {
        let proc_dir = tempfile::tempdir().unwrap();
        let dev_dir = tempfile::tempdir().unwrap();
        fs::write(dev_dir.path().join("md127"), "").unwrap();
        fs::write(dev_dir.path().join("mdraid"), "").unwrap();

        assert_eq!(
            discover_md_device("/mnt/storage", proc_dir.path(), dev_dir.path()),
            Some("md127".to_string())
        );

        fs::write(proc_dir.path().join("mdstat"), MDSTAT_RESYNC).unwrap();
        assert_eq!(
            discover_md_device("/mnt/storage", proc_dir.path(), dev_dir.path()),
            Some("md1".to_string())
        );

        fs::write(
            proc_dir.path().join("mounts"),
            "/dev/md0 /mnt/storage ext4 rw 0 0\n",
        )
        .unwrap();
        assert_eq!(
            discover_md_device("/mnt/storage", proc_dir.path(), dev_dir.path()),
            Some("md0".to_string())
        );
    }

    fn sysfs_fixture(array_state: &str, sync_action: &str) -> (tempfile::TempDir, tempfile::TempDir) {
        let sys = tempfile::tempdir().unwrap();
        let proc_dir = tempfile::tempdir().unwrap();
        let md = sys.path().join("block/md0/md");
        fs::create_dir_all(&md).unwrap();
        fs::write(md.join("array_state"), format!("{}\n", array_state)).unwrap();
        fs::write(md.join("sync_action"), format!("{}\n", sync_action)).unwrap();
        fs::write(proc_dir.path().join("mdstat"), MDSTAT_RESYNC).unwrap();
        (sys, proc_dir)
    }

    #[tokio::test]
    async fn test_fetch_idle_skips_progress() {
        let (sys, proc_dir) = sysfs_fixture("clean", "idle");
        let source = MdadmSource::with_roots("md0", sys.path(), proc_dir.path());
        let raw = source.fetch(&RaidKey::Status).await.unwrap();
        assert_eq!(raw.array_state.as_deref(), Some("clean"));
        assert_eq!(raw.sync_action.as_deref(), Some("idle"));
        assert_eq!(raw.progress, None);
    }

    #[tokio::test]
    async fn test_fetch_resync_reads_progress() {
        let (sys, proc_dir) = sysfs_fixture("active", "resync");
        let source = MdadmSource::with_roots("md0", sys.path(), proc_dir.path());
        let raw = source.fetch(&RaidKey::Status).await.unwrap();
        assert_eq!(raw.progress, Some(21.3));
        assert_eq!(raw.finish_min, Some(312.5));
    }

    #[tokio::test]
    async fn test_fetch_missing_array_fails() {
        let sys = tempfile::tempdir().unwrap();
        let source = MdadmSource::with_roots("md9", sys.path(), sys.path());
        assert!(source.fetch(&RaidKey::Status).await.is_err());
    }
}
