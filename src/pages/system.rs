//! System page: CPU load, memory and CPU temperature.

use super::format::{fmt_bytes, NA};
use super::{PageContext, Screen};
use crate::telemetry::{GlancesKey, Need, Readings, SystemKey};
use std::time::Duration;

pub fn needs() -> Vec<Need> {
    vec![
        Need::Glances(GlancesKey::Cpu, Duration::from_secs(2)),
        Need::Glances(GlancesKey::Load, Duration::from_secs(2)),
        Need::Glances(GlancesKey::Mem, Duration::from_secs(2)),
        Need::Glances(GlancesKey::Sensors, Duration::from_secs(5)),
        Need::System(SystemKey::CpuTemp, Duration::from_secs(5)),
    ]
}

pub fn compose(readings: &impl Readings, ctx: &PageContext) -> Screen {
    let cpu = match (readings.cpu(), readings.load()) {
        (Some(cpu), Some(load)) => format!("{:.0}% ({:.2})", cpu.total, load.min1),
        (Some(cpu), None) => format!("{:.0}%", cpu.total),
        (None, Some(load)) => format!("({:.2})", load.min1),
        (None, None) => NA.to_string(),
    };

    let mem = readings.mem().map_or_else(
        || NA.to_string(),
        |mem| format!("{:.0}% of {}", mem.percent, fmt_bytes(Some(mem.total))),
    );

    Screen::new("System")
        .line("CPU:", cpu)
        .line("Mem:", mem)
        .line("Temp:", ctx.temp(readings.cpu_temp()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::data::{CpuStats, LoadStats, MemStats};
    use crate::telemetry::ReadingsSnapshot;

    #[test]
    fn test_full_readings() {
        let readings = ReadingsSnapshot {
            cpu: Some(CpuStats { total: 23.4 }),
            load: Some(LoadStats {
                min1: 0.42,
                min5: 0.3,
                min15: 0.2,
            }),
            mem: Some(MemStats {
                total: 8 * 1024 * 1024 * 1024,
                percent: 37.0,
                ..Default::default()
            }),
            vc_cpu_temp: Some(52.0),
            ..Default::default()
        };

        let screen = compose(&readings, &PageContext::default());
        let values: Vec<&str> = screen.lines.iter().map(|l| l.value.as_str()).collect();
        assert_eq!(values, vec!["23% (0.42)", "37% of 8.0G", "! 52.0C"]);
    }

    #[test]
    fn test_partial_readings() {
        let readings = ReadingsSnapshot {
            cpu: Some(CpuStats { total: 5.0 }),
            ..Default::default()
        };
        let screen = compose(&readings, &PageContext::default());
        assert_eq!(screen.lines[0].value, "5%");
        assert_eq!(screen.lines[1].value, "N/A");
        assert_eq!(screen.lines[2].value, "N/A");
    }
}
