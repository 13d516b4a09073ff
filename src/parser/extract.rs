//! Field extraction shared by the provider parsers.
//!
//! Both extractors are ordered lists of candidate matchers tried in sequence;
//! the first one that yields a value wins.

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{INVALID_DATE, NOT_AVAILABLE, TIMESTAMP_DISPLAY_FORMAT};

// Tried in order; the first capture group is the speed in km/h
static SPEED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"Vel\. actual \| Vel\. permitida:.*?\| (\d+) km/h",
        r"Vel\. Vehiculo: (\d+)",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("speed pattern must compile"))
    .collect()
});

static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})[/\-](\d{1,2})[/\-](\d{4})\s*(\d{1,2})?:?(\d{1,2})?:?(\d{1,2})?")
        .expect("day/month/year pattern must compile")
});

/// Recover a speed from a free-text description.
///
/// Returns `None` when no pattern matches; callers treat that as "no signal".
pub fn extract_speed(text: &str) -> Option<u32> {
    SPEED_PATTERNS.iter().find_map(|regex| {
        regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
    })
}

/// A date cell as it arrives from a source document
#[derive(Debug, Clone, PartialEq)]
pub enum DateValue {
    /// Spreadsheet serial number (days since the 1900 epoch, fraction = time of day)
    Serial(f64),
    Text(String),
    /// Already a structured date-time
    Native(NaiveDateTime),
}

/// Render a date cell for display, distinguishing absent from unparsable.
pub fn parse_timestamp(value: Option<&DateValue>) -> String {
    let Some(value) = value else {
        return NOT_AVAILABLE.to_string();
    };
    let parsed = match value {
        DateValue::Serial(serial) => decode_date_serial(*serial),
        DateValue::Text(text) => parse_date_text(text),
        DateValue::Native(dt) => Some(*dt),
    };
    match parsed {
        Some(dt) => format_timestamp(&dt),
        None => INVALID_DATE.to_string(),
    }
}

pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format(TIMESTAMP_DISPLAY_FORMAT).to_string()
}

/// Decode a spreadsheet date serial using the 1900 date system.
///
/// Serial 1 is 1900-01-01. The 1900 system counts a phantom 1900-02-29 as
/// serial 60, so serials above 60 are offset by one extra day; 60 itself
/// lands on 1900-03-01.
pub fn decode_date_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let mut days = serial.trunc() as i64;
    let mut seconds = ((serial - serial.trunc()) * 86_400.0).round() as i64;
    if seconds >= 86_400 {
        seconds = 0;
        days += 1;
    }
    let epoch = if days <= 60 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    let date = epoch.checked_add_signed(Duration::try_days(days)?)?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds as u32, 0)?;
    Some(date.and_time(time))
}

type DateMatcher = fn(&str) -> Option<Option<NaiveDateTime>>;

/// Strict positional match first, best-effort free-form second. A matcher
/// returns `None` when it does not apply and `Some(None)` when it applies but
/// the result falls outside the representable range, which ends the search.
const DATE_TEXT_MATCHERS: &[DateMatcher] = &[match_day_month_year, match_free_form];

pub fn parse_date_text(text: &str) -> Option<NaiveDateTime> {
    DATE_TEXT_MATCHERS.iter().find_map(|matcher| matcher(text)).flatten()
}

/// `DD/MM/YYYY [HH[:MM[:SS]]]`. Out-of-range parts roll forward the way a
/// calendar carry would, so `31/02/2024` lands on `02/03/2024` and hour 24
/// is midnight of the next day.
fn match_day_month_year(text: &str) -> Option<Option<NaiveDateTime>> {
    let caps = DAY_MONTH_YEAR.captures(text)?;
    let part = |idx: usize| -> i64 {
        caps.get(idx)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    let year = caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok());
    Some(year.and_then(|year| roll_forward(year, part(2) - 1, part(1) - 1, part(4), part(5), part(6))))
}

fn roll_forward(year: i32, months: i64, days: i64, hours: i64, minutes: i64, seconds: i64) -> Option<NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let month_shift = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    let month_start = if months >= 0 {
        start.checked_add_months(month_shift)?
    } else {
        start.checked_sub_months(month_shift)?
    };
    let offset = Duration::try_days(days)?
        .checked_add(&Duration::try_hours(hours)?)?
        .checked_add(&Duration::try_minutes(minutes)?)?
        .checked_add(&Duration::try_seconds(seconds)?)?;
    month_start.and_time(NaiveTime::MIN).checked_add_signed(offset)
}

// Best effort only: ISO-ish layouts and RFC 2822/3339. Offsets are dropped and
// the wall-clock time is kept as written.
fn match_free_form(text: &str) -> Option<Option<NaiveDateTime>> {
    const LAYOUTS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
    ];
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(Some(dt.naive_local()));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(Some(dt.naive_local()));
    }
    if let Some(dt) = LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
    {
        return Some(Some(dt));
    }
    ["%Y-%m-%d", "%Y/%m/%d"]
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(text, layout).ok())
        .map(|date| Some(date.and_time(NaiveTime::MIN)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_speed_from_current_vs_allowed_pattern() {
        assert_eq!(extract_speed("Vel. actual | Vel. permitida: 40 | 95 km/h"), Some(95));
    }

    #[test]
    fn test_speed_from_vehicle_speed_pattern() {
        assert_eq!(extract_speed("Exceso. Vel. Vehiculo: 63"), Some(63));
    }

    #[test]
    fn test_first_matching_pattern_wins() {
        let text = "Vel. actual | Vel. permitida: 60 | 88 km/h / Vel. Vehiculo: 70";
        assert_eq!(extract_speed(text), Some(88));
    }

    #[test]
    fn test_speed_not_found() {
        assert_eq!(extract_speed("Motor encendido"), None);
        assert_eq!(extract_speed(""), None);
    }

    #[test]
    fn test_speed_extraction_is_idempotent() {
        let text = "Vel. Vehiculo: 112";
        assert_eq!(extract_speed(text), extract_speed(text));
    }

    #[test]
    fn test_day_month_year_is_not_swapped() {
        let dt = parse_date_text("05/03/2024 14:30:00").unwrap();
        assert_eq!((dt.day(), dt.month(), dt.year()), (5, 3, 2024));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (14, 30, 0));
    }

    #[test]
    fn test_missing_time_defaults_to_midnight() {
        let dt = parse_date_text("7-11-2023").unwrap();
        assert_eq!((dt.day(), dt.month()), (7, 11));
        assert_eq!(dt.time(), NaiveTime::MIN);
    }

    #[test]
    fn test_out_of_range_parts_roll_forward() {
        assert_eq!(
            parse_timestamp(Some(&DateValue::Text("31/02/2024 10:00:00".into()))),
            "02/03/2024 10:00:00"
        );
        assert_eq!(
            parse_timestamp(Some(&DateValue::Text("05/03/2024 24:00:00".into()))),
            "06/03/2024 00:00:00"
        );
        assert_eq!(
            parse_timestamp(Some(&DateValue::Text("15/13/2023 08:61:00".into()))),
            "15/01/2024 09:01:00"
        );
        // Day and month zero step back into the previous month and year
        assert_eq!(parse_timestamp(Some(&DateValue::Text("00/00/2024".into()))), "30/11/2023 00:00:00");
    }

    #[test]
    fn test_free_form_fallback() {
        let dt = parse_date_text("2024-03-05T08:15:00").unwrap();
        assert_eq!((dt.day(), dt.month(), dt.hour()), (5, 3, 8));
        assert_eq!(parse_date_text("ayer por la tarde"), None);
    }

    #[test]
    fn test_serial_decoding() {
        // 45356.6041666 = 2024-03-05 14:30:00
        let dt = decode_date_serial(45356.604166666664).unwrap();
        assert_eq!(format_timestamp(&dt), "05/03/2024 14:30:00");
        assert_eq!(decode_date_serial(1.0).unwrap().date(), NaiveDate::from_ymd_opt(1900, 1, 1).unwrap());
        assert_eq!(decode_date_serial(61.0).unwrap().date(), NaiveDate::from_ymd_opt(1900, 3, 1).unwrap());
        assert!(decode_date_serial(-3.0).is_none());
        assert!(decode_date_serial(f64::NAN).is_none());
    }

    #[test]
    fn test_timestamp_sentinels() {
        assert_eq!(parse_timestamp(None), NOT_AVAILABLE);
        assert_eq!(parse_timestamp(Some(&DateValue::Text("sin fecha".into()))), INVALID_DATE);
    }

    #[test]
    fn test_native_value_used_directly() {
        let dt = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap().and_hms_opt(23, 5, 9).unwrap();
        assert_eq!(parse_timestamp(Some(&DateValue::Native(dt))), "01/12/2024 23:05:09");
    }
}
