use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive calendar-day range used to bound matcher runs and queries.
/// Either end may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_end = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "..".into());
        write!(f, "{} to {}", fmt_end(self.from), fmt_end(self.to))
    }
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        DateRange { from, to }
    }

    pub fn bounded(from: NaiveDate, to: NaiveDate) -> Self {
        DateRange { from: Some(from), to: Some(to) }
    }

    pub fn open() -> Self {
        DateRange::default()
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        self.from.is_none_or(|f| date >= f) && self.to.is_none_or(|t| date <= t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn bounded_range_contains_inclusive_ends() {
        let range = DateRange::bounded(date(2025, 1, 1), date(2025, 12, 31));
        assert!(range.contains(date(2025, 6, 15)));
        assert!(range.contains(date(2025, 1, 1)));
        assert!(range.contains(date(2025, 12, 31)));
        assert!(!range.contains(date(2024, 12, 31)));
        assert!(!range.contains(date(2026, 1, 1)));
    }

    #[test]
    fn open_range_contains_everything() {
        assert!(DateRange::open().contains(date(1990, 1, 1)));
        assert!(DateRange::open().contains(date(2099, 12, 31)));
    }

    #[test]
    fn half_open_ranges() {
        let from_only = DateRange::new(Some(date(2025, 3, 1)), None);
        assert!(from_only.contains(date(2025, 3, 1)));
        assert!(!from_only.contains(date(2025, 2, 28)));

        let to_only = DateRange::new(None, Some(date(2025, 3, 31)));
        assert!(to_only.contains(date(2025, 3, 31)));
        assert!(!to_only.contains(date(2025, 4, 1)));
    }

    #[test]
    fn display_open_ends() {
        assert_eq!(DateRange::open().to_string(), ".. to ..");
        assert_eq!(
            DateRange::bounded(date(2025, 1, 1), date(2025, 1, 31)).to_string(),
            "2025-01-01 to 2025-01-31"
        );
    }
}
