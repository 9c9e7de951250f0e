use std::fmt;

use time::{Date, Month};

use crate::error::ApiError;

/// Calendar month identifier in `YYYY-MM` form.
///
/// Budgets and reports are scoped at month granularity, and a stored date
/// belongs to a month exactly when its `YYYY-MM` rendering equals the key:
/// a string-prefix rule, not a date-range comparison. Every month comparison
/// in the system goes through this type (the Postgres store renders the same
/// rule as `to_char(.., 'YYYY-MM')`), so the aggregator and the evaluator
/// cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MonthKey(String);

impl MonthKey {
    /// Parses a strict `YYYY-MM` key.
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        let bytes = raw.as_bytes();
        let well_formed = bytes.len() == 7
            && bytes[..4].iter().all(u8::is_ascii_digit)
            && bytes[4] == b'-'
            && bytes[5..7].iter().all(u8::is_ascii_digit);
        if !well_formed {
            return Err(ApiError::Validation(
                "Invalid month format. Expected YYYY-MM".into(),
            ));
        }
        let month: u8 = raw[5..7]
            .parse()
            .map_err(|_| ApiError::Validation("Invalid month format. Expected YYYY-MM".into()))?;
        if !(1..=12).contains(&month) {
            return Err(ApiError::Validation(
                "Invalid month format. Expected YYYY-MM".into(),
            ));
        }
        Ok(Self(raw.to_owned()))
    }

    /// The month a calendar date falls in.
    pub fn of(date: Date) -> Self {
        Self(format!("{:04}-{:02}", date.year(), u8::from(date.month())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The prefix rule: does `date` render into this month?
    pub fn contains(&self, date: Date) -> bool {
        Self::of(date) == *self
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parses a transaction date in `YYYY-MM-DD` form.
pub fn parse_date(raw: &str) -> Result<Date, ApiError> {
    let parts: Vec<&str> = raw.split('-').collect();
    let parsed = match parts.as_slice() {
        [y, m, d] => calendar_date(y, m, d),
        _ => None,
    };
    parsed.ok_or_else(|| ApiError::Validation("Invalid date format. Expected YYYY-MM-DD".into()))
}

/// Parses a budget month given as `YYYY-MM` or a full date; the day component
/// is ignored and normalized to the first of the month.
pub fn parse_month_arg(raw: &str) -> Result<Date, ApiError> {
    let parts: Vec<&str> = raw.split('-').collect();
    let parsed = match parts.as_slice() {
        [y, m] => calendar_date(y, m, "1"),
        [y, m, _] => calendar_date(y, m, "1"),
        _ => None,
    };
    parsed.ok_or_else(|| ApiError::Validation("Invalid month format. Expected YYYY-MM".into()))
}

/// Renders a date as `YYYY-MM-DD` (the serialization contract for budget
/// months and transaction dates).
pub fn render_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

fn calendar_date(year: &str, month: &str, day: &str) -> Option<Date> {
    let year: i32 = year.parse().ok()?;
    let month: u8 = month.parse().ok()?;
    let day: u8 = day.parse().ok()?;
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn month_key_accepts_well_formed_keys() {
        assert_eq!(MonthKey::parse("2025-06").unwrap().as_str(), "2025-06");
        assert_eq!(MonthKey::parse("1999-12").unwrap().as_str(), "1999-12");
    }

    #[test]
    fn month_key_rejects_malformed_keys() {
        for raw in ["2025-13", "2025-00", "2025-6", "2025/06", "202506", "2025-06-01", ""] {
            assert!(MonthKey::parse(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn month_key_of_pads_components() {
        assert_eq!(MonthKey::of(date!(2025 - 06 - 15)).as_str(), "2025-06");
        assert_eq!(MonthKey::of(date!(999 - 01 - 01)).as_str(), "0999-01");
    }

    #[test]
    fn contains_is_the_prefix_rule() {
        let june = MonthKey::parse("2025-06").unwrap();
        assert!(june.contains(date!(2025 - 06 - 01)));
        assert!(june.contains(date!(2025 - 06 - 30)));
        assert!(!june.contains(date!(2025 - 07 - 01)));
        assert!(!june.contains(date!(2024 - 06 - 15)));
    }

    #[test]
    fn parse_month_arg_normalizes_day_to_first() {
        assert_eq!(parse_month_arg("2025-06").unwrap(), date!(2025 - 06 - 01));
        assert_eq!(parse_month_arg("2025-06-23").unwrap(), date!(2025 - 06 - 01));
    }

    #[test]
    fn parse_month_arg_rejects_garbage() {
        for raw in ["June 2025", "2025", "2025-13", ""] {
            assert!(parse_month_arg(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn parse_date_round_trips_through_render() {
        let d = parse_date("2025-06-05").unwrap();
        assert_eq!(render_date(d), "2025-06-05");
        assert!(parse_date("2025-02-30").is_err());
        assert!(parse_date("2025-06").is_err());
    }
}
