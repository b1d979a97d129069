//! Byte counts, rates, durations and usage bars.

use super::{Badge, Tone};

const KIB: f64 = 1024.0;
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Traffic counter as shown on the forward and user lists.
pub fn format_flow(bytes: u64) -> String {
    let value = bytes as f64;
    if bytes == 0 {
        "0 B".to_string()
    } else if value < KIB {
        format!("{bytes} B")
    } else if value < KIB * KIB {
        format!("{:.2} KB", value / KIB)
    } else if value < KIB * KIB * KIB {
        format!("{:.2} MB", value / (KIB * KIB))
    } else {
        format!("{:.2} GB", value / (KIB * KIB * KIB))
    }
}

/// Quota values are already in GB.
pub fn format_flow_gb(gigabytes: i64) -> String {
    format!("{gigabytes} GB")
}

/// Two decimals at most, trailing zeros dropped.
fn trim_decimals(value: f64) -> String {
    let fixed = format!("{value:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn format_scaled(value: f64, units: &[&str]) -> String {
    if value <= 0.0 || !value.is_finite() {
        return format!("0 {}", units[0]);
    }
    let exponent = (value.ln() / KIB.ln()).floor().clamp(0.0, (units.len() - 1) as f64);
    let scaled = value / KIB.powi(exponent as i32);
    format!("{} {}", trim_decimals(scaled), units[exponent as usize])
}

/// Node upload/download speed.
pub fn format_rate(bytes_per_second: f64) -> String {
    format_scaled(bytes_per_second, &["B/s", "KB/s", "MB/s", "GB/s", "TB/s"])
}

/// Node total traffic.
pub fn format_traffic(bytes: u64) -> String {
    format_scaled(bytes as f64, &["B", "KB", "MB", "GB", "TB"])
}

pub fn format_uptime(seconds: u64) -> String {
    if seconds == 0 {
        return "-".to_string();
    }
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;

    if days > 0 {
        format!("{days}天{hours}小时")
    } else if hours > 0 {
        format!("{hours}小时{minutes}分钟")
    } else {
        format!("{minutes}分钟")
    }
}

/// CPU and memory bar color.
pub fn progress_tone(percent: f64, offline: bool) -> Tone {
    if offline {
        Tone::Default
    } else if percent <= 50.0 {
        Tone::Success
    } else if percent <= 80.0 {
        Tone::Warning
    } else {
        Tone::Danger
    }
}

/// Account expiry badge. Anything within a week is a warning.
pub fn expire_status(exp_ms: i64, now_ms: i64) -> Badge {
    if exp_ms < now_ms {
        return Badge::new("已过期", Tone::Danger);
    }
    let remaining = exp_ms - now_ms;
    let days = remaining / DAY_MS + i64::from(remaining % DAY_MS != 0);
    if days <= 7 {
        Badge::new(format!("{days}天后过期"), Tone::Warning)
    } else {
        Badge::new("正常", Tone::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_uses_fixed_decimals() {
        assert_eq!(format_flow(0), "0 B");
        assert_eq!(format_flow(512), "512 B");
        assert_eq!(format_flow(1536), "1.50 KB");
        assert_eq!(format_flow(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_flow(3 * 1024 * 1024 * 1024), "3.00 GB");
        assert_eq!(format_flow_gb(100), "100 GB");
    }

    #[test]
    fn traffic_and_rate_trim_zeros() {
        assert_eq!(format_traffic(0), "0 B");
        assert_eq!(format_traffic(1024), "1 KB");
        assert_eq!(format_traffic(1536), "1.5 KB");
        assert_eq!(format_traffic(1024u64.pow(4) * 2), "2 TB");
        assert_eq!(format_traffic(1024u64.pow(5)), "1024 TB");
        assert_eq!(format_rate(0.0), "0 B/s");
        assert_eq!(format_rate(0.5), "0.5 B/s");
        assert_eq!(format_rate(1_258_291.2), "1.2 MB/s");
    }

    #[test]
    fn uptime_picks_two_largest_units() {
        assert_eq!(format_uptime(0), "-");
        assert_eq!(format_uptime(59), "0分钟");
        assert_eq!(format_uptime(3 * 3600 + 5 * 60), "3小时5分钟");
        assert_eq!(format_uptime(2 * 86_400 + 7 * 3600 + 59), "2天7小时");
    }

    #[test]
    fn progress_tone_bands() {
        assert_eq!(progress_tone(50.0, false), Tone::Success);
        assert_eq!(progress_tone(80.0, false), Tone::Warning);
        assert_eq!(progress_tone(80.1, false), Tone::Danger);
        assert_eq!(progress_tone(99.0, true), Tone::Default);
    }

    #[test]
    fn expiry_rounds_days_up() {
        let now = 1_700_000_000_000;
        assert_eq!(expire_status(now - 1, now), Badge::new("已过期", Tone::Danger));
        assert_eq!(
            expire_status(now + DAY_MS + 1, now),
            Badge::new("2天后过期", Tone::Warning)
        );
        assert_eq!(
            expire_status(now + 7 * DAY_MS, now),
            Badge::new("7天后过期", Tone::Warning)
        );
        assert_eq!(
            expire_status(now + 8 * DAY_MS, now),
            Badge::new("正常", Tone::Success)
        );
    }
}
