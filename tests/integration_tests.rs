use oled_status::alarms::{smart_fault_id, temp_critical_id, RAID_DEGRADED};
use oled_status::scheduler::now;
use oled_status::telemetry::glances::decode;
use oled_status::telemetry::{GlancesKey, GlancesValue, SystemKey, SystemValue};
use oled_status::{
    AlarmEngine, AlarmRules, Config, DataSource, MdadmSource, Need, PageContext, RaidHealth,
    Readings, Result, StatusError, StatusReport, SyncAction, Telemetry,
};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Glances stand-in replaying canned endpoint payloads.
struct CannedGlances {
    payloads: Vec<(GlancesKey, Value)>,
}

impl DataSource for CannedGlances {
    type Key = GlancesKey;
    type Value = GlancesValue;

    fn name(&self) -> &'static str {
        "canned-glances"
    }

    async fn fetch(&self, key: &GlancesKey) -> Result<GlancesValue> {
        let body = self
            .payloads
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, body)| body.clone())
            .ok_or_else(|| StatusError::parse_error("endpoint not canned"))?;
        decode(*key, body)
    }
}

struct NoSystem;

impl DataSource for NoSystem {
    type Key = SystemKey;
    type Value = SystemValue;

    fn name(&self) -> &'static str {
        "no-system"
    }

    async fn fetch(&self, _key: &SystemKey) -> Result<SystemValue> {
        Err(StatusError::command_error("vcgencmd not found"))
    }
}

fn write_md(sys: &Path, proc_dir: &Path, array_state: &str, sync_action: &str, mdstat: &str) {
    let md = sys.join("block/md0/md");
    fs::create_dir_all(&md).unwrap();
    fs::write(md.join("array_state"), format!("{}\n", array_state)).unwrap();
    fs::write(md.join("sync_action"), format!("{}\n", sync_action)).unwrap();
    fs::write(proc_dir.join("mdstat"), mdstat).unwrap();
}

fn canned_glances() -> CannedGlances {
    CannedGlances {
        payloads: vec![
            (
                GlancesKey::Smart,
                json!([
                    {
                        "DeviceName": "sda",
                        "194": {"name": "Temperature_Celsius", "raw": "63"},
                        "5": {"name": "Reallocated_Sector_Ct", "raw": "0"}
                    },
                    {
                        "DeviceName": "sdb",
                        "194": {"name": "Temperature_Celsius", "raw": "39"},
                        "5": {"name": "Reallocated_Sector_Ct", "raw": "8"}
                    }
                ]),
            ),
            (
                GlancesKey::Fs,
                json!([
                    {"device_name": "/dev/md0", "fs_type": "ext4", "mnt_point": "/mnt/storage",
                     "size": 4000, "used": 1000, "free": 3000, "percent": 25.0}
                ]),
            ),
        ],
    }
}

/// Load a partial config file and check it drives the alarm and page settings.
#[test]
fn test_config_file_drives_components() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("oled_status.toml");
    fs::write(
        &path,
        "raid_mount = \"/srv/array\"\ntemp_warn_celsius = 45.0\ntemp_critical_celsius = 55.0\nalarm_cooldown_secs = 60\n",
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.buzzer_pin, Config::default().buzzer_pin);

    let rules = AlarmRules::from_config(&config);
    assert_eq!(rules.cooldown, Duration::from_secs(60));
    assert_eq!(rules.temp_critical_celsius, 55.0);

    let ctx = PageContext::from_config(&config);
    assert_eq!(ctx.raid_mount, "/srv/array");
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "temp_warn_celsius = 70.0\ntemp_critical_celsius = 60.0\n").unwrap();
    assert!(Config::load(&path).unwrap().validate().is_err());

    fs::write(&path, "buzzer_pin = \"seventeen\"\n").unwrap();
    let err = Config::load(&path).unwrap_err();
    assert!(err.is_fatal());
}

/// Sysfs, mdstat and Glances fixtures flow through cache, interpreter and alarms.
#[tokio::test]
async fn test_degraded_array_end_to_end() {
    let sys = tempfile::tempdir().unwrap();
    let proc_dir = tempfile::tempdir().unwrap();
    write_md(sys.path(), proc_dir.path(), "degraded", "idle", "Personalities : [raid1]\n");

    let mut telemetry = Telemetry::new(
        canned_glances(),
        MdadmSource::with_roots("md0", sys.path(), proc_dir.path()),
        NoSystem,
        Some("md0".into()),
        Duration::from_secs(1),
    );
    telemetry
        .refresh(&Need::everything(Duration::from_secs(5)), now())
        .await;

    let status = telemetry.raid_status().unwrap();
    assert_eq!(status.health(), RaidHealth::Degraded);
    assert_eq!(telemetry.hottest_disk(), Some(63.0));
    assert!(telemetry.power().is_none());

    let mut engine = AlarmEngine::default();
    let mut fired: Vec<String> = engine
        .check(&telemetry, now())
        .into_iter()
        .map(|f| f.id)
        .collect();
    fired.sort();
    assert_eq!(
        fired,
        vec![
            RAID_DEGRADED.to_string(),
            smart_fault_id("sdb"),
            temp_critical_id("sda"),
        ]
    );
}

#[tokio::test]
async fn test_resync_report_json() {
    let sys = tempfile::tempdir().unwrap();
    let proc_dir = tempfile::tempdir().unwrap();
    write_md(
        sys.path(),
        proc_dir.path(),
        "active",
        "recover",
        "md0 : active raid1 sdb1[2] sda1[0]\n      [==>.....]  recovery = 12.5% (1/8) finish=95.0min speed=120000K/sec\n",
    );

    let mut telemetry = Telemetry::new(
        canned_glances(),
        MdadmSource::with_roots("md0", sys.path(), proc_dir.path()),
        NoSystem,
        Some("md0".into()),
        Duration::from_secs(1),
    );
    telemetry
        .refresh(&Need::everything(Duration::ZERO), now())
        .await;

    let report = StatusReport::build(
        telemetry.capture(),
        &AlarmRules::default(),
        &PageContext::default(),
    );
    assert_eq!(report.raid_health, Some(RaidHealth::Syncing(SyncAction::Recovery)));
    assert!(report.active_alarms.contains(&"raid_resync_start".to_string()));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["raid"]["progress"], json!(12.5));
    assert_eq!(json["raid"]["eta_minutes"], json!(95.0));
    assert_eq!(json["screens"][0]["title"], json!("Resyncing..."));
    assert_eq!(json["screens"][0]["lines"][2]["value"], json!("1h 35m"));
    assert_eq!(json["readings"]["md_name"], json!("md0"));
}
