//! Formatting and parsing helpers shared by every page

use chrono::{DateTime, NaiveDate};

const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
const BIT_RATE_UNITS: [&str; 4] = ["bps", "Kbps", "Mbps", "Gbps"];

/// Format a byte count with 1024-based units and two decimals
///
/// `format_bandwidth(1536)` gives `"1.50 KB"`; zero is `"0 B"`.
#[must_use]
pub fn format_bandwidth(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < BYTE_UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }

    format!("{value:.2} {}", BYTE_UNITS.get(unit).copied().unwrap_or("TB"))
}

/// Format a link rate with 1000-based units and two decimals
#[must_use]
pub fn format_bits_per_second(bps: f64) -> String {
    if bps <= 0.0 || !bps.is_finite() {
        return "0 bps".to_string();
    }

    let mut value = bps;
    let mut unit = 0;
    while value >= 1000.0 && unit + 1 < BIT_RATE_UNITS.len() {
        value /= 1000.0;
        unit += 1;
    }

    format!(
        "{value:.2} {}",
        BIT_RATE_UNITS.get(unit).copied().unwrap_or("Gbps")
    )
}

/// Format an IDR amount without decimals using the locale's grouping
///
/// `id-ID` groups with dots (`Rp 1.500.000`); other locales group with
/// commas and use the ISO code (`IDR 1,500,000`).
#[must_use]
pub fn format_currency(amount: f64, locale: &str) -> String {
    let (prefix, separator) = if locale.eq_ignore_ascii_case("id-ID") || locale == "id" {
        ("Rp", '.')
    } else {
        ("IDR", ',')
    };

    let rounded = amount.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = rounded.abs() as u64;

    format!("{sign}{prefix} {}", group_thousands(whole, separator))
}

/// Insert a separator every three digits
#[must_use]
pub fn group_thousands(value: u64, separator: char) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(ch);
    }

    grouped
}

/// Format a date the way the back-office tables show it (`dd/mm/yyyy`)
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Format an uptime in seconds as `3d 4h 12m`
#[must_use]
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;

    match (days, hours) {
        (0, 0) => format!("{minutes}m"),
        (0, _) => format!("{hours}h {minutes}m"),
        _ => format!("{days}d {hours}h {minutes}m"),
    }
}

/// Parse a backend date: RFC 3339 timestamp or plain `YYYY-MM-DD`
#[must_use]
pub fn parse_record_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .or_else(|| {
            raw.get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        })
}
