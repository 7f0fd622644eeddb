//! Value formatters shared by the pages. Missing values render as `N/A`.

pub const NA: &str = "N/A";

/// Rate given in KiB/s.
pub fn fmt_rate(kibps: Option<f64>) -> String {
    let Some(k) = kibps.filter(|k| k.is_finite()) else {
        return NA.to_string();
    };
    if k < 1024.0 {
        format!("{:.0}K/s", k)
    } else if k < 1024.0 * 1024.0 {
        format!("{:.1}M/s", k / 1024.0)
    } else {
        format!("{:.1}G/s", k / (1024.0 * 1024.0))
    }
}

/// Compact duration: `Xd Yh`, `Xh Ym` or `Xm`.
pub fn fmt_time(seconds: Option<f64>) -> String {
    let Some(secs) = seconds.filter(|s| s.is_finite() && *s >= 0.0) else {
        return NA.to_string();
    };
    let minutes = secs as u64 / 60;
    let (hours, minutes) = (minutes / 60, minutes % 60);
    let (days, hours) = (hours / 24, hours % 24);

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Sync ETA given in minutes.
pub fn fmt_eta(minutes: Option<f64>) -> String {
    fmt_time(minutes.map(|m| m * 60.0))
}

/// Binary-prefixed size; whole numbers below MiB, one decimal above.
pub fn fmt_bytes(bytes: Option<u64>) -> String {
    const UNITS: [&str; 6] = ["B", "K", "M", "G", "T", "P"];
    let Some(bytes) = bytes else {
        return NA.to_string();
    };
    let mut n = bytes as f64;
    let mut unit = 0;
    while n >= 1024.0 && unit < UNITS.len() - 1 {
        n /= 1024.0;
        unit += 1;
    }
    if unit < 2 {
        format!("{:.0}{}", n, UNITS[unit])
    } else {
        format!("{:.1}{}", n, UNITS[unit])
    }
}

pub fn fmt_percent(percent: Option<f64>) -> String {
    match percent.filter(|p| p.is_finite()) {
        Some(p) => format!("{:.1}%", p),
        None => NA.to_string(),
    }
}

/// Temperature with a severity marker: `!!` at or above `critical`, `!` at or above `warn`.
pub fn fmt_temp(celsius: Option<f64>, warn: f64, critical: f64) -> String {
    let Some(t) = celsius.filter(|t| t.is_finite()) else {
        return NA.to_string();
    };
    let marker = if t >= critical {
        "!!"
    } else if t >= warn {
        "! "
    } else {
        "  "
    };
    format!("{}{:.1}C", marker, t)
}
