//! Calendar day keys.
//!
//! The ledger names days `year-month-day` with 1-based month and day and no
//! zero padding (`2025-1-9`, not `2025-01-09`). That text is part of the
//! persisted key layout, so formatting and parsing live in one place.

use crate::error::LedgerError;
use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A calendar date used as the rollover boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Build a key from year, month (1-12) and day (1-31).
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The following calendar day.
    pub fn succ(&self) -> Self {
        self.plus_days(1)
    }

    /// The key `days` after this one. Saturates at the end of the calendar.
    pub fn plus_days(&self, days: u64) -> Self {
        Self(self.0.checked_add_days(Days::new(days)).unwrap_or(self.0))
    }

    /// The seven consecutive days starting at this key.
    pub fn week(&self) -> [DayKey; 7] {
        let mut days = [*self; 7];
        for (offset, day) in days.iter_mut().enumerate() {
            *day = self.plus_days(offset as u64);
        }
        days
    }

    /// The Monday on or before this day.
    pub fn week_start(&self) -> Self {
        let back = self.0.weekday().num_days_from_monday() as u64;
        Self(self.0.checked_sub_days(Days::new(back)).unwrap_or(self.0))
    }

    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    /// Noon UTC on this day, a safe instant for fixed clocks.
    pub fn noon_utc(&self) -> DateTime<Utc> {
        let naive = self.0.and_hms_opt(12, 0, 0).unwrap_or_default();
        Utc.from_utc_datetime(&naive)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.0.year(), self.0.month(), self.0.day())
    }
}

impl FromStr for DayKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::InvalidDateKey(s.to_string());

        let mut parts = s.trim().splitn(3, '-');
        let year: i32 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let month: u32 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let day: u32 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;

        Self::from_ymd(year, month, day).ok_or_else(invalid)
    }
}

impl Serialize for DayKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_has_no_zero_padding() {
        let key = DayKey::from_ymd(2025, 1, 9).unwrap();
        assert_eq!(key.to_string(), "2025-1-9");

        let key = DayKey::from_ymd(2024, 12, 31).unwrap();
        assert_eq!(key.to_string(), "2024-12-31");
    }

    #[test]
    fn test_parse_accepts_padded_and_unpadded() {
        let a: DayKey = "2025-1-9".parse().unwrap();
        let b: DayKey = "2025-01-09".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("2025-13-1".parse::<DayKey>().is_err());
        assert!("2025-2-30".parse::<DayKey>().is_err());
        assert!("yesterday".parse::<DayKey>().is_err());
        assert!("2025-1".parse::<DayKey>().is_err());
    }

    #[test]
    fn test_ordering_is_calendar_order() {
        // Lexical order would put "2025-1-10" before "2025-1-9".
        let ninth: DayKey = "2025-1-9".parse().unwrap();
        let tenth: DayKey = "2025-1-10".parse().unwrap();
        assert!(ninth < tenth);
    }

    #[test]
    fn test_week_crosses_month_and_year() {
        let start: DayKey = "2024-12-29".parse().unwrap();
        let week: Vec<String> = start.week().iter().map(|d| d.to_string()).collect();
        assert_eq!(
            week,
            vec![
                "2024-12-29",
                "2024-12-30",
                "2024-12-31",
                "2025-1-1",
                "2025-1-2",
                "2025-1-3",
                "2025-1-4"
            ]
        );
    }

    #[test]
    fn test_week_start_is_monday() {
        let thursday: DayKey = "2025-1-2".parse().unwrap();
        assert_eq!(thursday.week_start().to_string(), "2024-12-30");

        let monday: DayKey = "2024-12-30".parse().unwrap();
        assert_eq!(monday.week_start(), monday);
    }

    #[test]
    fn test_serde_as_string() {
        let key: DayKey = "2025-3-4".parse().unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"2025-3-4\"");
        let back: DayKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
