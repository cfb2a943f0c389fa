use crate::schema::{PeriodKey, RawCell};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

/// Full calendar dates, tried in order. US month-first forms come after ISO,
/// and two-digit years are tried before four-digit ones.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d-%b-%y",
    "%d-%b-%Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// Month-only labels. Parsed with a day of `01` prepended.
const MONTH_FORMATS: &[&str] = &["%Y-%m", "%Y/%m", "%m/%Y", "%B %Y", "%B, %Y", "%b-%y", "%b-%Y"];

/// Keys are rendered with a four-digit year; anything outside this range is a
/// misread (e.g. `%Y` swallowing a day number).
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1000..=9999;

/// Characters dropped before numeric parsing: thousands separators, currency
/// symbols and percent signs.
const NUMERIC_NOISE: &[char] = &[',', '$', '€', '£', '¥', '%'];

/// Coerces a raw cell to a number. Unparseable, empty and non-finite values
/// become `None`.
pub fn parse_number(cell: &RawCell) -> Option<f64> {
    match cell {
        RawCell::Number(value) => value.is_finite().then_some(*value),
        RawCell::Text(text) => parse_numeric_text(text),
        RawCell::Null => None,
    }
}

/// Parses text like `"$1,200"`, `"45%"` or `" -3.5 "`. A percent sign is only
/// stripped, so `"45%"` yields `45.0`.
pub fn parse_numeric_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && !NUMERIC_NOISE.contains(c))
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Renders a period cell as the label it represents. Null cells give an empty label.
pub fn period_label(cell: &RawCell) -> String {
    match cell {
        RawCell::Text(text) => text.trim().to_string(),
        RawCell::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", *value as i64)
        }
        RawCell::Number(value) => value.to_string(),
        RawCell::Null => String::new(),
    }
}

/// Attempts to read a period label as a calendar date.
pub fn parse_period(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    parse_full_date(raw).or_else(|| parse_month_label(raw))
}

fn in_year_range(date: NaiveDate) -> Option<NaiveDate> {
    YEAR_RANGE.contains(&date.year()).then_some(date)
}

fn parse_full_date(raw: &str) -> Option<NaiveDate> {
    if let Some(date) = DateTime::parse_from_rfc3339(raw)
        .ok()
        .and_then(|timestamp| in_year_range(timestamp.date_naive()))
    {
        return Some(date);
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| {
            NaiveDate::parse_from_str(raw, format)
                .ok()
                .and_then(in_year_range)
        })
        .or_else(|| {
            DATETIME_FORMATS.iter().find_map(|format| {
                NaiveDateTime::parse_from_str(raw, format)
                    .ok()
                    .and_then(|timestamp| in_year_range(timestamp.date()))
            })
        })
}

fn parse_month_label(raw: &str) -> Option<NaiveDate> {
    let dated = format!("01 {}", raw);
    MONTH_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(&dated, &format!("%d {}", format))
            .ok()
            .and_then(in_year_range)
    })
}

/// Maps a raw period label to its canonical key: `YYYY-MM` when the label is a
/// recognizable date, otherwise the trimmed label itself.
pub fn normalize_period(raw: &str) -> PeriodKey {
    match parse_period(raw) {
        Some(date) => PeriodKey::from_date(date),
        None => PeriodKey::new(raw.trim()),
    }
}

/// Like [`normalize_period`], also reporting whether the label parsed as a date.
pub fn resolve_period(cell: &RawCell) -> (PeriodKey, bool) {
    let label = period_label(cell);
    match parse_period(&label) {
        Some(date) => (PeriodKey::from_date(date), true),
        None => (PeriodKey::new(label), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_strips_formatting() {
        assert_eq!(parse_numeric_text("$1,200"), Some(1200.0));
        assert_eq!(parse_numeric_text(" -3.5 "), Some(-3.5));
        assert_eq!(parse_numeric_text("45%"), Some(45.0));
        assert_eq!(parse_numeric_text("€2,500.75"), Some(2500.75));
        assert_eq!(parse_numeric_text("-$1,000"), Some(-1000.0));
        assert_eq!(parse_numeric_text("1 234"), Some(1234.0));
    }

    #[test]
    fn test_parse_number_rejects_garbage() {
        assert_eq!(parse_numeric_text(""), None);
        assert_eq!(parse_numeric_text("   "), None);
        assert_eq!(parse_numeric_text("n/a"), None);
        assert_eq!(parse_numeric_text("NaN"), None);
        assert_eq!(parse_numeric_text("inf"), None);
        assert_eq!(parse_number(&RawCell::Number(f64::NAN)), None);
        assert_eq!(parse_number(&RawCell::Null), None);
        assert_eq!(parse_number(&RawCell::Number(12.5)), Some(12.5));
    }

    #[test]
    fn test_normalize_iso_and_us_formats() {
        assert_eq!(normalize_period("2024-03-15").as_str(), "2024-03");
        assert_eq!(normalize_period("2024/03/01").as_str(), "2024-03");
        assert_eq!(normalize_period("2024-03").as_str(), "2024-03");
        assert_eq!(normalize_period("03/15/2024").as_str(), "2024-03");
        assert_eq!(normalize_period("3/5/2024").as_str(), "2024-03");
        assert_eq!(normalize_period("03/2024").as_str(), "2024-03");
        assert_eq!(normalize_period("2024-03-15T10:30:00Z").as_str(), "2024-03");
        assert_eq!(normalize_period("2024-03-15 00:00:00").as_str(), "2024-03");
    }

    #[test]
    fn test_normalize_month_names() {
        assert_eq!(normalize_period("March 2024").as_str(), "2024-03");
        assert_eq!(normalize_period("Mar 2024").as_str(), "2024-03");
        assert_eq!(normalize_period("March 15, 2024").as_str(), "2024-03");
        assert_eq!(normalize_period("15 March 2024").as_str(), "2024-03");
        assert_eq!(normalize_period("Mar-24").as_str(), "2024-03");
        assert_eq!(normalize_period("Mar-2024").as_str(), "2024-03");
        assert_eq!(normalize_period("15-Mar-24").as_str(), "2024-03");
        assert_eq!(
            normalize_period("2024-03-15"),
            normalize_period("March 2024")
        );
    }

    #[test]
    fn test_normalize_fallback_is_verbatim() {
        assert_eq!(normalize_period("Q1 FY24").as_str(), "Q1 FY24");
        assert_eq!(normalize_period("  Budget Total ").as_str(), "Budget Total");
        assert_eq!(normalize_period("2024-13").as_str(), "2024-13");
        assert_eq!(normalize_period("").as_str(), "");
    }

    #[test]
    fn test_resolve_period_cells() {
        assert_eq!(
            resolve_period(&RawCell::from("2024-01-31")),
            (PeriodKey::new("2024-01"), true)
        );
        assert_eq!(
            resolve_period(&RawCell::Number(2024.0)),
            (PeriodKey::new("2024"), false)
        );
        assert_eq!(resolve_period(&RawCell::Null), (PeriodKey::new(""), false));
    }
}
