//! Provides parsing and formatting helpers for byte sizes and durations.
//!
//! These are used to read human friendly values like `64m` or `15s` from the
//! [config](crate::config) and to render cache budgets in diagnostics.
use std::fmt::Write;
use std::time::Duration;

use anyhow::Context;

const KIB: u64 = 1024;
const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Formats a given size in bytes.
///
/// This function determines the ideal unit (ranging from bytes to petabytes) to provide
/// a concise representation.
///
/// # Examples
///
/// ```
/// assert_eq!(tiercache::fmt::format_size(0), "0 bytes");
/// assert_eq!(tiercache::fmt::format_size(1), "1 byte");
/// assert_eq!(tiercache::fmt::format_size(100), "100 bytes");
/// assert_eq!(tiercache::fmt::format_size(8_734), "8.53 KiB");
/// assert_eq!(tiercache::fmt::format_size(87_340), "85.3 KiB");
/// assert_eq!(tiercache::fmt::format_size(873_400), "853 KiB");
/// assert_eq!(tiercache::fmt::format_size(8_734_000), "8.33 MiB");
/// assert_eq!(tiercache::fmt::format_size(8_734_000_000), "8.13 GiB");
/// ```
pub fn format_size(size_in_bytes: usize) -> String {
    match size_in_bytes {
        1 => return "1 byte".to_owned(),
        n if n < 1024 => return format!("{} bytes", n),
        _ => (),
    }

    let mut magnitude = 0;
    let mut size = size_in_bytes as f64;
    while size >= 1024. && magnitude < 5 {
        size /= 1024.;
        magnitude += 1;
    }

    let mut result = if size <= 10. {
        format!("{:.2} ", size)
    } else if size <= 100. {
        format!("{:.1} ", size)
    } else {
        format!("{:.0} ", size)
    };

    result.push_str(match magnitude {
        0 => "Bytes",
        1 => "KiB",
        2 => "MiB",
        3 => "GiB",
        4 => "TiB",
        _ => "PiB",
    });

    result
}

/// Parses a size in bytes from a given string.
///
/// The string can have the following suffixes:
/// * **b** or **B**: the value is taken as is
/// * **k** or **K**: treats the value as KiB
/// * **m** or **M**: treats the value as MiB
/// * **g** or **G**: treats the value as GiB
/// * **t** or **T**: treats the value as TiB
///
/// Returns an **Err** for non-integer values, unknown suffixes or values which do not fit
/// into a `usize`.
///
/// # Examples
///
/// ```
/// assert_eq!(tiercache::fmt::parse_size("100").unwrap(), 100);
/// assert_eq!(tiercache::fmt::parse_size("100b").unwrap(), 100);
/// assert_eq!(tiercache::fmt::parse_size("8k").unwrap(), 8192);
/// assert_eq!(tiercache::fmt::parse_size("8m").unwrap(), 8 * 1024 * 1024);
/// assert_eq!(tiercache::fmt::parse_size("4 G").unwrap(), 4 * 1024 * 1024 * 1024);
///
/// assert_eq!(tiercache::fmt::parse_size("3 Y").is_err(), true);
/// assert_eq!(tiercache::fmt::parse_size("1.2g").is_err(), true);
/// assert_eq!(tiercache::fmt::parse_size("-1").is_err(), true);
/// ```
pub fn parse_size(str: impl AsRef<str>) -> anyhow::Result<usize> {
    lazy_static::lazy_static! {
        static ref NUMBER_AND_SUFFIX: regex::Regex =
            regex::Regex::new(r"^ *(\d+) *([bBkKmMgGtT]?) *$").unwrap();
    }

    let input = str.as_ref();
    let captures = NUMBER_AND_SUFFIX.captures(input).with_context(|| {
        format!(
            "Cannot parse '{}' into a size expression. \
             Expected a positive number and optionally 'b', 'k', 'm', 'g' or 't' as suffix.",
            input
        )
    })?;

    let factor = match &captures[2] {
        "k" | "K" => KIB,
        "m" | "M" => KIB.pow(2),
        "g" | "G" => KIB.pow(3),
        "t" | "T" => KIB.pow(4),
        _ => 1,
    };

    let bytes = scale(&captures[1], factor, input)?;
    usize::try_from(bytes).with_context(|| format!("The size '{}' is too large.", input))
}

/// Parses a duration from a given string.
///
/// The string can have the following suffixes:
/// * **ms** or **MS**: treats the value as milliseconds (also used if no suffix is given)
/// * **s** or **S**: treats the value as seconds
/// * **m** or **M**: treats the value as minutes
/// * **h** or **H**: treats the value as hours
/// * **d** or **D**: treats the value as days
///
/// # Examples
///
/// ```
/// # use std::time::Duration;
/// assert_eq!(tiercache::fmt::parse_duration("100 ms").unwrap(), Duration::from_millis(100));
/// assert_eq!(tiercache::fmt::parse_duration("250").unwrap(), Duration::from_millis(250));
/// assert_eq!(tiercache::fmt::parse_duration("12 s").unwrap(), Duration::from_secs(12));
/// assert_eq!(tiercache::fmt::parse_duration("3 M").unwrap(), Duration::from_secs(3 * 60));
/// assert_eq!(tiercache::fmt::parse_duration("5 d").unwrap(), Duration::from_secs(5 * 24 * 60 * 60));
///
/// assert_eq!(tiercache::fmt::parse_duration("3 Y").is_err(), true);
/// assert_eq!(tiercache::fmt::parse_duration("1.2s").is_err(), true);
/// ```
pub fn parse_duration(str: impl AsRef<str>) -> anyhow::Result<Duration> {
    lazy_static::lazy_static! {
        static ref NUMBER_AND_SUFFIX: regex::Regex =
            regex::Regex::new(r"^ *(\d+) *((ms|s|m|h|d|MS|S|M|H|D)?) *$").unwrap();
    }

    let input = str.as_ref();
    let captures = NUMBER_AND_SUFFIX.captures(input).with_context(|| {
        format!(
            "Cannot parse '{}' into a duration expression. \
             Expected a positive number and optionally 'ms', 's', 'm', 'h' or 'd' as suffix.",
            input
        )
    })?;

    match &captures[2] {
        "s" | "S" => Ok(Duration::from_secs(scale(&captures[1], 1, input)?)),
        "m" | "M" => Ok(Duration::from_secs(scale(&captures[1], MINUTE, input)?)),
        "h" | "H" => Ok(Duration::from_secs(scale(&captures[1], HOUR, input)?)),
        "d" | "D" => Ok(Duration::from_secs(scale(&captures[1], DAY, input)?)),
        _ => Ok(Duration::from_millis(scale(&captures[1], 1, input)?)),
    }
}

fn scale(digits: &str, factor: u64, input: &str) -> anyhow::Result<u64> {
    digits
        .parse::<u64>()
        .ok()
        .and_then(|number| number.checked_mul(factor))
        .with_context(|| format!("The value '{}' is out of range.", input))
}

/// Formats a duration into a string like "5d 3h 17m 2s 12ms".
///
/// # Examples
///
/// ```
/// # use std::time::Duration;
/// assert_eq!(tiercache::fmt::format_duration(Duration::from_millis(13)), "13ms");
/// assert_eq!(tiercache::fmt::format_duration(Duration::from_millis(62_013)), "1m 2s 13ms");
/// assert_eq!(tiercache::fmt::format_duration(Duration::from_secs(60 * 61)), "1h 1m");
/// assert_eq!(tiercache::fmt::format_duration(Duration::from_secs(24 * 60 * 60 + 59)), "1d 59s");
/// assert_eq!(tiercache::fmt::format_duration(Duration::ZERO), "0ms");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let units: [(u128, &str); 5] = [
        (1000 * DAY as u128, "d"),
        (1000 * HOUR as u128, "h"),
        (1000 * MINUTE as u128, "m"),
        (1000, "s"),
        (1, "ms"),
    ];

    let mut result = String::new();
    let mut value = duration.as_millis();
    for (millis, unit) in units {
        let amount = value / millis;
        if amount > 0 {
            if !result.is_empty() {
                result.push(' ');
            }
            let _ = write!(result, "{}{}", amount, unit);
            value %= millis;
        }
    }

    if result.is_empty() {
        result.push_str("0ms");
    }

    result
}

#[cfg(test)]
mod tests {
    use crate::fmt::{format_duration, parse_duration, parse_size};
    use std::time::Duration;

    #[test]
    fn overflowing_values_are_rejected() {
        assert!(parse_size("99999999999999999999999").is_err());
        assert!(parse_size("20000000000t").is_err());
        assert!(parse_duration("99999999999999999999d").is_err());
    }

    #[test]
    fn parsed_durations_format_back() {
        let ttl = parse_duration("90s").unwrap();
        assert_eq!(ttl, Duration::from_secs(90));
        assert_eq!(format_duration(ttl), "1m 30s");
    }
}
