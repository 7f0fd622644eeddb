//! Temperatures page: CPU and the first two data disks.

use super::{PageContext, Screen};
use crate::telemetry::{GlancesKey, Need, Readings, SystemKey};
use std::time::Duration;

const DISKS: [&str; 2] = ["sda", "sdb"];

pub fn needs() -> Vec<Need> {
    vec![
        Need::Glances(GlancesKey::Sensors, Duration::from_secs(5)),
        Need::System(SystemKey::CpuTemp, Duration::from_secs(5)),
        Need::Glances(GlancesKey::Smart, Duration::from_secs(10)),
    ]
}

pub fn compose(readings: &impl Readings, ctx: &PageContext) -> Screen {
    let mut screen = Screen::new("Temps").line("CPU:", ctx.temp(readings.cpu_temp()));
    for disk in DISKS {
        let temp = readings
            .smart()
            .and_then(|smart| smart.get(disk))
            .and_then(|d| d.temperature_c);
        screen = screen.line(format!("{}:", disk), ctx.temp(temp));
    }
    screen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::data::{SensorEntry, SmartDisk};
    use crate::telemetry::ReadingsSnapshot;

    #[test]
    fn test_cpu_and_disks() {
        let readings = ReadingsSnapshot {
            sensors: Some(vec![SensorEntry {
                label: "Core 0".into(),
                value: Some(47.0),
                unit: Some("C".into()),
            }]),
            vc_cpu_temp: Some(70.0),
            smart: Some(
                [("sdb".to_string(), SmartDisk {
                    temperature_c: Some(63.0),
                    ..Default::default()
                })]
                .into_iter()
                .collect(),
            ),
            ..Default::default()
        };

        let screen = compose(&readings, &PageContext::default());
        let values: Vec<&str> = screen.lines.iter().map(|l| l.value.as_str()).collect();
        assert_eq!(values, vec!["  47.0C", "N/A", "!!63.0C"]);
        assert_eq!(screen.lines[1].label, "sda:");
    }
}
