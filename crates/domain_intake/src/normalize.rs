//! Field kinds and value normalization
//!
//! Every schema field declares a [`FieldKind`]. The kind decides how a raw
//! value is parsed into its canonical form, and therefore when two raw
//! values from different sources count as the same fact.
//!
//! | Kind      | Accepted input                                   | Canonical   |
//! |-----------|--------------------------------------------------|-------------|
//! | `Date`    | `2024-01-31`, `31/01/2024`, `2024/01/31`, `31.01.2024` | `2024-01-31` |
//! | `Time`    | `9:05`, `18:45`, `18:45:10`, `6:45 pm`           | `18:45`     |
//! | `Boolean` | yes/y/true/t/1, no/n/false/f/0                   | `yes`/`no`  |
//! | `Amount`  | `3000`, `3,000.50`, `CHF 3'000`, `$120`          | `3000.5`    |
//! | `Plate`   | `zh-223014`, `ZH 223014`                         | `ZH 223014` |
//! | `Text`    | anything non-empty                               | trimmed     |
//!
//! Text comparison ignores case and runs of whitespace but keeps diacritics,
//! so `Zürich` and `Zurich` are different facts.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Raw values that mean "no value" whichever source produced them
const PLACEHOLDERS: &[&str] = &["", "unknown", "not provided", "null", "n/a"];

const CURRENCY_CODES: &[&str] = &["CHF", "USD", "EUR", "GBP"];

/// Expected value shape of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Date,
    Time,
    Boolean,
    Amount,
    Plate,
}

impl FieldKind {
    /// Parses a raw value into its canonical rendering
    ///
    /// Returns `None` when the value does not have this kind's shape.
    pub fn canonicalize(&self, raw: &str) -> Option<String> {
        let value = collapse_whitespace(raw);
        if value.is_empty() {
            return None;
        }
        match self {
            FieldKind::Text => Some(value),
            FieldKind::Date => parse_date(&value).map(|d| d.format("%Y-%m-%d").to_string()),
            FieldKind::Time => parse_time(&value).map(|t| t.format("%H:%M").to_string()),
            FieldKind::Boolean => parse_boolean(&value).map(|b| String::from(if b { "yes" } else { "no" })),
            FieldKind::Amount => parse_amount(&value).map(|d| d.normalize().to_string()),
            FieldKind::Plate => canonical_plate(&value),
        }
    }

    /// Canonical form if the value parses, otherwise the whitespace-collapsed raw text
    ///
    /// Document extractors are not held to the field shape, so a value that
    /// does not parse is still kept as text rather than dropped.
    pub fn resolve(&self, raw: &str) -> String {
        self.canonicalize(raw).unwrap_or_else(|| collapse_whitespace(raw))
    }

    /// Key under which two raw values are compared
    pub fn comparison_key(&self, raw: &str) -> String {
        match self {
            FieldKind::Plate => self
                .canonicalize(raw)
                .map(|p| p.replace(' ', ""))
                .unwrap_or_else(|| collapse_whitespace(raw).to_lowercase()),
            _ => self.resolve(raw).to_lowercase(),
        }
    }

    /// Whether two raw values describe the same fact
    pub fn values_agree(&self, a: &str, b: &str) -> bool {
        self.comparison_key(a) == self.comparison_key(b)
    }

    /// Human-readable description of the accepted shape
    pub fn expected_shape(&self) -> &'static str {
        match self {
            FieldKind::Text => "free text",
            FieldKind::Date => "a date such as 2024-01-31 or 31/01/2024",
            FieldKind::Time => "a time such as 18:45",
            FieldKind::Boolean => "yes or no",
            FieldKind::Amount => "an amount such as 3000 or 3,000.50",
            FieldKind::Plate => "a licence plate such as ZH 223014",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Text => "text",
            FieldKind::Date => "date",
            FieldKind::Time => "time",
            FieldKind::Boolean => "boolean",
            FieldKind::Amount => "amount",
            FieldKind::Plate => "plate",
        };
        f.write_str(name)
    }
}

/// Returns true if the raw value is one of the "no value" placeholders
pub fn is_placeholder(raw: &str) -> bool {
    let lowered = collapse_whitespace(raw).to_lowercase();
    PLACEHOLDERS.contains(&lowered.as_str())
}

/// Trims and collapses internal whitespace runs to a single space
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    if value.contains(':') {
        return None;
    }
    let separator = ['-', '/', '.'].into_iter().find(|s| value.contains(*s))?;
    let parts: Vec<&str> = value.split(separator).collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    let (year, month, day) = if parts[0].len() == 4 {
        (parts[0], parts[1], parts[2])
    } else if parts[2].len() == 4 {
        (parts[2], parts[1], parts[0])
    } else {
        return None;
    };
    if month.len() > 2 || day.len() > 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    let lowered = value.to_lowercase();
    let (clock, meridiem) = if let Some(rest) = lowered.strip_suffix("pm") {
        (rest.trim(), Some(true))
    } else if let Some(rest) = lowered.strip_suffix("am") {
        (rest.trim(), Some(false))
    } else {
        (lowered.as_str(), None)
    };

    let parts: Vec<&str> = clock.split(':').collect();
    if !(2..=3).contains(&parts.len()) || parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    if parts[0].len() > 2 || parts[1..].iter().any(|p| p.len() != 2) {
        return None;
    }

    let mut hour: u32 = parts[0].parse().ok()?;
    let minute: u32 = parts[1].parse().ok()?;
    let second: u32 = match parts.get(2) {
        Some(s) => s.parse().ok()?,
        None => 0,
    };
    if let Some(pm) = meridiem {
        if hour == 0 || hour > 12 {
            return None;
        }
        hour %= 12;
        if pm {
            hour += 12;
        }
    }
    NaiveTime::from_hms_opt(hour, minute, second)
}

fn parse_boolean(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "yes" | "y" | "true" | "t" | "1" => Some(true),
        "no" | "n" | "false" | "f" | "0" => Some(false),
        _ => None,
    }
}

fn parse_amount(value: &str) -> Option<Decimal> {
    let mut cleaned = value.to_uppercase();
    for code in CURRENCY_CODES {
        cleaned = cleaned.replace(code, "");
    }
    let number: String = cleaned
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '\'' | ' '))
        .collect();
    if number.is_empty() || !commas_group_thousands(&number) {
        return None;
    }
    Decimal::from_str(&number.replace(',', "")).ok()
}

/// Commas may only separate groups of three digits ahead of the decimal point
fn commas_group_thousands(number: &str) -> bool {
    if let (Some(comma), Some(point)) = (number.rfind(','), number.rfind('.')) {
        if comma > point {
            return false;
        }
    }
    number.split(',').skip(1).all(|group| {
        let digits = group.split('.').next().unwrap_or_default();
        digits.len() == 3 && digits.chars().all(|c| c.is_ascii_digit())
    })
}

fn canonical_plate(value: &str) -> Option<String> {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_uppercase();
    if compact.is_empty() || !compact.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    let prefix_len = compact.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    let (prefix, rest) = compact.split_at(prefix_len);
    if !prefix.is_empty() && !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("{} {}", prefix, rest))
    } else {
        Some(compact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_date_formats_share_canonical_form() {
        for raw in ["2024-01-31", "31/01/2024", "2024/01/31", "31-01-2024", "31.01.2024"] {
            assert_eq!(FieldKind::Date.canonicalize(raw).as_deref(), Some("2024-01-31"), "{raw}");
        }
    }

    #[test]
    fn test_time_like_answer_is_not_a_date() {
        assert_eq!(FieldKind::Date.canonicalize("18:45"), None);
        assert_eq!(FieldKind::Date.canonicalize("2024-13-01"), None);
    }

    #[test]
    fn test_time_forms() {
        assert_eq!(FieldKind::Time.canonicalize("9:05").as_deref(), Some("09:05"));
        assert_eq!(FieldKind::Time.canonicalize("18:45:10").as_deref(), Some("18:45"));
        assert_eq!(FieldKind::Time.canonicalize("6:45 pm").as_deref(), Some("18:45"));
        assert_eq!(FieldKind::Time.canonicalize("25:00"), None);
        assert_eq!(FieldKind::Time.canonicalize("evening"), None);
    }

    #[test]
    fn test_amounts() {
        assert_eq!(FieldKind::Amount.canonicalize("3,000.50").as_deref(), Some("3000.5"));
        assert_eq!(FieldKind::Amount.canonicalize("CHF 3'000").as_deref(), Some("3000"));
        assert_eq!(FieldKind::Amount.canonicalize("lots"), None);
        assert_eq!(parse_amount("€ 1,250.75"), Some(dec!(1250.75)));
        assert_eq!(parse_amount("USD 99"), Some(dec!(99)));
    }

    #[test]
    fn test_ambiguous_separators_are_rejected() {
        assert_eq!(FieldKind::Amount.canonicalize("3.000,50"), None);
        assert_eq!(FieldKind::Amount.canonicalize("1,5"), None);
        assert_eq!(parse_amount("12,34,567"), None);
        assert_eq!(parse_amount("1,234,567.8"), Some(dec!(1234567.8)));
    }

    #[test]
    fn test_plates_ignore_spacing_and_case() {
        assert!(FieldKind::Plate.values_agree("zh-223014", "ZH 223014"));
        assert_eq!(FieldKind::Plate.canonicalize("zh223014").as_deref(), Some("ZH 223014"));
    }

    #[test]
    fn test_text_keeps_diacritics() {
        assert!(FieldKind::Text.values_agree("  Bellevue   Square ", "bellevue square"));
        assert!(!FieldKind::Text.values_agree("Zürich", "Zurich"));
    }

    #[test]
    fn test_placeholders() {
        assert!(is_placeholder("  Unknown "));
        assert!(is_placeholder("not provided"));
        assert!(is_placeholder(""));
        assert!(!is_placeholder("none"));
    }
}
