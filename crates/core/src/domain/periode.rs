//! Accounting months and the period resolver.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors when parsing or building accounting months.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    /// Not in `YYYY-MM` form.
    #[error("Invalid accounting month '{0}', expected YYYY-MM")]
    InvalidFormat(String),

    /// Month outside 1..=12 or year out of range.
    #[error("Accounting month out of range: {0}")]
    OutOfRange(String),
}

/// A target accounting month, persisted as `YYYY-MM`.
///
/// Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Overforingsperiode {
    year: i32,
    month: u32,
}

impl Overforingsperiode {
    /// Creates a month, validating the month number.
    ///
    /// # Errors
    ///
    /// Returns `PeriodError::OutOfRange` when the month is not 1..=12.
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) || !(1..=9999).contains(&year) {
            return Err(PeriodError::OutOfRange(format!("{year}-{month}")));
        }
        Ok(Self { year, month })
    }

    /// The month a date falls in.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Year component.
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Month component, 1..=12.
    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// First day of the month.
    #[must_use]
    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day of the month.
    #[must_use]
    pub fn last_day(self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or_else(|| self.first_day())
    }

    /// The following month.
    #[must_use]
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The preceding month.
    #[must_use]
    pub fn previous(self) -> Self {
        let date = self
            .first_day()
            .checked_sub_months(Months::new(1))
            .unwrap_or_else(|| self.first_day());
        Self::from_date(date)
    }
}

impl std::fmt::Display for Overforingsperiode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for Overforingsperiode {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .filter(|(y, m)| y.len() == 4 && m.len() == 2)
            .ok_or_else(|| PeriodError::InvalidFormat(s.to_string()))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| PeriodError::InvalidFormat(s.to_string()))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| PeriodError::InvalidFormat(s.to_string()))?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for Overforingsperiode {
    type Error = PeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Overforingsperiode> for String {
    fn from(value: Overforingsperiode) -> Self {
        value.to_string()
    }
}

/// Months resolved for one obligation period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMonths {
    /// Every month to generate, in order.
    pub months: Vec<Overforingsperiode>,
    /// True when the period's explicit end has been reached, so no later
    /// accrual run will add months to it.
    pub complete: bool,
}

/// Resolves the accounting months of a period.
///
/// `periode_til` is exclusive: it is the first day the decision no longer
/// applies, so a period ending 2023-03-01 covers January and February, and a
/// month is included only when at least one of its days is before the end.
/// Months after `latest_closed` are never produced, whether the period is
/// open-ended or not; without any closed month nothing is produced.
#[must_use]
pub fn resolve_months(
    periode_fra: NaiveDate,
    periode_til: Option<NaiveDate>,
    latest_closed: Option<Overforingsperiode>,
) -> ResolvedMonths {
    let start = Overforingsperiode::from_date(periode_fra);
    let explicit_last = periode_til
        .and_then(|til| til.pred_opt())
        .map(Overforingsperiode::from_date);

    let Some(cap) = latest_closed else {
        return ResolvedMonths {
            months: Vec::new(),
            complete: explicit_last.is_some_and(|last| last < start),
        };
    };

    let (last, complete) = match explicit_last {
        Some(last) if last <= cap => (last, true),
        Some(_) => (cap, false),
        None => (cap, false),
    };

    let mut months = Vec::new();
    let mut current = start;
    while current <= last {
        months.push(current);
        current = current.next();
    }

    ResolvedMonths { months, complete }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn month(s: &str) -> Overforingsperiode {
        Overforingsperiode::from_str(s).unwrap()
    }

    fn names(resolved: &ResolvedMonths) -> Vec<String> {
        resolved.months.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_end_is_exclusive_and_capped() {
        let resolved = resolve_months(
            date(2023, 1, 1),
            Some(date(2023, 3, 1)),
            Some(month("2023-02")),
        );
        assert_eq!(names(&resolved), vec!["2023-01", "2023-02"]);
        assert!(resolved.complete);
    }

    #[test]
    fn test_end_month_is_excluded_past_the_watermark() {
        let resolved = resolve_months(
            date(2023, 1, 1),
            Some(date(2023, 3, 1)),
            Some(month("2023-12")),
        );
        assert_eq!(names(&resolved), vec!["2023-01", "2023-02"]);
        assert!(resolved.complete);
    }

    #[test]
    fn test_open_ended_is_capped_at_latest_closed() {
        let resolved = resolve_months(date(2022, 11, 1), None, Some(month("2023-02")));
        assert_eq!(
            names(&resolved),
            vec!["2022-11", "2022-12", "2023-01", "2023-02"]
        );
        assert!(!resolved.complete);
    }

    #[test]
    fn test_explicit_end_past_watermark_is_not_complete() {
        let resolved = resolve_months(
            date(2023, 1, 1),
            Some(date(2024, 1, 1)),
            Some(month("2023-02")),
        );
        assert_eq!(names(&resolved), vec!["2023-01", "2023-02"]);
        assert!(!resolved.complete);
    }

    #[test]
    fn test_capped_end_before_start_gives_no_months() {
        let resolved = resolve_months(date(2023, 5, 1), None, Some(month("2023-02")));
        assert!(resolved.months.is_empty());
    }

    #[test]
    fn test_no_closed_period_gives_no_months() {
        let resolved = resolve_months(date(2023, 1, 1), Some(date(2023, 3, 1)), None);
        assert!(resolved.months.is_empty());
        assert!(!resolved.complete);
    }

    #[test]
    fn test_mid_month_end_includes_that_month() {
        let resolved = resolve_months(
            date(2023, 1, 15),
            Some(date(2023, 2, 15)),
            Some(month("2023-12")),
        );
        assert_eq!(names(&resolved), vec!["2023-01", "2023-02"]);
    }

    #[rstest]
    #[case("2023-01", "2023-01-01", "2023-01-31")]
    #[case("2024-02", "2024-02-01", "2024-02-29")]
    #[case("2023-12", "2023-12-01", "2023-12-31")]
    fn test_month_bounds(#[case] m: &str, #[case] first: &str, #[case] last: &str) {
        let m = month(m);
        assert_eq!(m.first_day().to_string(), first);
        assert_eq!(m.last_day().to_string(), last);
    }

    #[rstest]
    #[case("2023-1")]
    #[case("202301")]
    #[case("2023-13")]
    #[case("abcd-01")]
    fn test_invalid_months(#[case] s: &str) {
        assert!(Overforingsperiode::from_str(s).is_err());
    }

    #[test]
    fn test_next_and_previous_cross_year() {
        assert_eq!(month("2023-12").next(), month("2024-01"));
        assert_eq!(month("2024-01").previous(), month("2023-12"));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&month("2023-07")).unwrap();
        assert_eq!(json, "\"2023-07\"");
        let parsed: Overforingsperiode = serde_json::from_str("\"2023-07\"").unwrap();
        assert_eq!(parsed, month("2023-07"));
    }
}
