//! Network page: address, interface throughput and uptime.

use super::format::{fmt_rate, fmt_time, NA};
use super::{PageContext, Screen};
use crate::telemetry::{GlancesKey, Need, Readings, SystemKey};
use std::time::Duration;

pub fn needs() -> Vec<Need> {
    vec![
        Need::System(SystemKey::Ip, Duration::from_secs(30)),
        Need::Glances(GlancesKey::Network, Duration::from_secs(2)),
        Need::System(SystemKey::Uptime, Duration::from_secs(10)),
    ]
}

pub fn compose(readings: &impl Readings, ctx: &PageContext) -> Screen {
    let ip = readings
        .ip_address()
        .map_or_else(|| NA.to_string(), |ip| ip.to_string());

    let iface = readings
        .networks()
        .and_then(|nets| nets.iter().find(|n| n.interface_name == ctx.network_interface));
    let tx = fmt_rate(iface.map(|n| n.bytes_sent_rate_per_sec / 1024.0));
    let rx = fmt_rate(iface.map(|n| n.bytes_recv_rate_per_sec / 1024.0));

    Screen::new("Network")
        .line("IP:", ip)
        .line(format!("\u{25b2} {}", tx), format!("\u{25bc} {}", rx))
        .line("Uptime:", fmt_time(readings.uptime_secs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::data::NetEntry;
    use crate::telemetry::ReadingsSnapshot;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_configured_interface_only() {
        let readings = ReadingsSnapshot {
            ip_address: Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))),
            uptime_secs: Some(90_000.0),
            networks: Some(vec![
                NetEntry {
                    interface_name: "wlan0".into(),
                    bytes_sent_rate_per_sec: 999_999.0,
                    bytes_recv_rate_per_sec: 999_999.0,
                },
                NetEntry {
                    interface_name: "eth0".into(),
                    bytes_sent_rate_per_sec: 10_240.0,
                    bytes_recv_rate_per_sec: 2_097_152.0,
                },
            ]),
            ..Default::default()
        };

        let screen = compose(&readings, &PageContext::default());
        assert_eq!(screen.lines[0].value, "192.168.1.20");
        assert_eq!(screen.lines[1].label, "\u{25b2} 10K/s");
        assert_eq!(screen.lines[1].value, "\u{25bc} 2.0M/s");
        assert_eq!(screen.lines[2].value, "1d 1h");
    }

    #[test]
    fn test_missing_values() {
        let screen = compose(&ReadingsSnapshot::default(), &PageContext::default());
        assert_eq!(screen.lines[0].value, "N/A");
        assert_eq!(screen.lines[1].label, "\u{25b2} N/A");
        assert_eq!(screen.lines[2].value, "N/A");
    }
}
