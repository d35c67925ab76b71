// Best-effort conversions from raw CSV text.
//
// Every function here returns `None` instead of failing, so callers can treat
// unparseable cells as missing values.
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Tokens that a CSV export commonly uses for "no value".
const NA_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "null", "NULL", "None", "#N/A", "<NA>",
];

// `%.f` also matches a missing fraction.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

pub fn is_na(s: &str) -> bool {
    NA_TOKENS.contains(&s.trim())
}

/// Parse a finite float. Whitespace is trimmed; NaN and infinities are rejected.
pub fn parse_f64_safe(s: &str) -> Option<f64> {
    let s = s.trim();
    if is_na(s) {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a timestamp from the formats seen in typical CSV exports.
///
/// Date-only values resolve to midnight and `YYYY-MM` to the first of the
/// month. Values carrying an offset are converted to UTC and the offset is
/// dropped.
pub fn parse_datetime_safe(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if is_na(s) {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| year_month(s))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// `YYYY-MM` as the first day of that month.
fn year_month(s: &str) -> Option<NaiveDate> {
    let (year, month) = s.split_once('-')?;
    if year.len() != 4 || !(1..=2).contains(&month.len()) {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

/// Render a float the way a dataframe prints integral values: `10` not `10.0`.
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}
