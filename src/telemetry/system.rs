//! Host information source: IP address, uptime, and vcgencmd readings.

use crate::error::{Result, StatusError};
use crate::telemetry::data::PowerFlags;
use crate::telemetry::traits::DataSource;
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use sysinfo::System;
use tokio::net::UdpSocket;
use tokio::process::Command;

/// Keys served by [`SystemSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemKey {
    Ip,
    Uptime,
    PowerThrottled,
    CpuTemp,
}

impl SystemKey {
    pub const ALL: [SystemKey; 4] = [
        SystemKey::Ip,
        SystemKey::Uptime,
        SystemKey::PowerThrottled,
        SystemKey::CpuTemp,
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub enum SystemValue {
    Ip(IpAddr),
    /// Seconds since boot
    Uptime(f64),
    Power(PowerFlags),
    /// Celsius
    CpuTemp(f64),
}

/// Reads host facts that Glances does not report.
pub struct SystemSource {
    vcgencmd: PathBuf,
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new("vcgencmd")
    }
}

impl SystemSource {
    pub fn new(vcgencmd: impl Into<PathBuf>) -> Self {
        Self {
            vcgencmd: vcgencmd.into(),
        }
    }

    async fn vcgencmd(&self, arg: &str) -> Result<String> {
        let output = Command::new(&self.vcgencmd)
            .arg(arg)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                StatusError::command_error(format!("{} {}: {}", self.vcgencmd.display(), arg, e))
            })?;
        if !output.status.success() {
            return Err(StatusError::command_error(format!(
                "{} {} exited with {}",
                self.vcgencmd.display(),
                arg,
                output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl DataSource for SystemSource {
    type Key = SystemKey;
    type Value = SystemValue;

    fn name(&self) -> &'static str {
        "system"
    }

    async fn fetch(&self, key: &SystemKey) -> Result<SystemValue> {
        match key {
            SystemKey::Ip => primary_ipv4().await.map(SystemValue::Ip),
            SystemKey::Uptime => Ok(SystemValue::Uptime(System::uptime() as f64)),
            SystemKey::PowerThrottled => {
                let out = self.vcgencmd("get_throttled").await?;
                parse_throttled(&out).map(SystemValue::Power)
            }
            SystemKey::CpuTemp => {
                let out = self.vcgencmd("measure_temp").await?;
                parse_measure_temp(&out).map(SystemValue::CpuTemp)
            }
        }
    }
}

/// Address of the interface holding the default route.
///
/// Connecting a UDP socket sends nothing; it only makes the kernel pick a
/// source address.
async fn primary_ipv4() -> Result<IpAddr> {
    let socket = UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)).await?;
    socket.connect(("8.8.8.8", 80)).await?;
    Ok(socket.local_addr()?.ip())
}

/// Parse `throttled=0x50005`.
pub fn parse_throttled(output: &str) -> Result<PowerFlags> {
    let hex = output
        .trim()
        .strip_prefix("throttled=")
        .ok_or_else(|| StatusError::parse_error(format!("unexpected get_throttled output: {}", output)))?;
    let digits = hex.trim_start_matches("0x").trim_start_matches("0X");
    let value = u32::from_str_radix(digits, 16)
        .map_err(|e| StatusError::parse_error(format!("bad throttle value {}: {}", hex, e)))?;
    Ok(PowerFlags::from_bits(value, hex))
}

/// Parse `temp=47.8'C`.
pub fn parse_measure_temp(output: &str) -> Result<f64> {
    output
        .trim()
        .strip_prefix("temp=")
        .and_then(|rest| rest.split('\'').next())
        .and_then(|num| num.parse().ok())
        .ok_or_else(|| StatusError::parse_error(format!("unexpected measure_temp output: {}", output)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_throttled() {
        let flags = parse_throttled("throttled=0x50005\n").unwrap();
        assert!(flags.under_voltage);
        assert!(flags.throttled);
        assert_eq!(flags.raw, "0x50005");

        let clear = parse_throttled("throttled=0x0").unwrap();
        assert!(!clear.has_current_issue());

        assert!(parse_throttled("error=1").is_err());
        assert!(parse_throttled("throttled=0xZZ").is_err());
    }

    #[test]
    fn test_parse_measure_temp() {
        assert_eq!(parse_measure_temp("temp=47.8'C\n").unwrap(), 47.8);
        assert!(parse_measure_temp("temp=hot").is_err());
    }

    #[tokio::test]
    async fn test_absent_command_is_failure() {
        let source = SystemSource::new("/nonexistent/vcgencmd");
        assert!(source.fetch(&SystemKey::CpuTemp).await.is_err());
        assert!(source.fetch(&SystemKey::PowerThrottled).await.is_err());
    }
}
