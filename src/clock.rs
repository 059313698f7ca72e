//! Wall-clock access for day keys and sample timestamps.
//!
//! Everything that asks "what day is it" goes through a [`Clock`] so the
//! rollover logic can be driven deterministically in tests and replays.

use crate::ledger::DayKey;
use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use std::sync::{Arc, Mutex};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// The calendar day the ledger should accumulate under right now.
    fn today(&self) -> DayKey;

    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// The system clock, reading the local zone or an explicit IANA zone.
#[derive(Debug, Clone, Default)]
pub struct SystemClock {
    timezone: Option<Tz>,
}

impl SystemClock {
    /// Clock using the host's local timezone.
    pub fn local() -> Self {
        Self { timezone: None }
    }

    /// Clock pinned to a named timezone.
    ///
    /// Unknown names fall back to local time.
    pub fn with_timezone(name: Option<&str>) -> Self {
        let timezone = name.and_then(|n| match n.parse::<Tz>() {
            Ok(tz) => Some(tz),
            Err(e) => {
                tracing::warn!("Unknown timezone {n:?} ({e}), using local time");
                None
            }
        });
        Self { timezone }
    }

    /// The configured zone, if any.
    pub fn timezone(&self) -> Option<Tz> {
        self.timezone
    }
}

impl Clock for SystemClock {
    fn today(&self) -> DayKey {
        match self.timezone {
            Some(tz) => DayKey::from_date(Utc::now().with_timezone(&tz).date_naive()),
            None => DayKey::from_date(Local::now().date_naive()),
        }
    }

    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A manually driven clock.
///
/// Day keys are derived from the held instant in UTC.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Clock fixed at noon UTC on the given day.
    pub fn at_day(day: DayKey) -> Self {
        Self::new(day.noon_utc())
    }

    /// Move the clock to a new instant.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = now;
    }

    /// Move the clock to noon UTC on the given day.
    pub fn set_day(&self, day: DayKey) {
        self.set(day.noon_utc());
    }

    fn current(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Clock for FixedClock {
    fn today(&self) -> DayKey {
        DayKey::from_date(self.current().date_naive())
    }

    fn now_millis(&self) -> i64 {
        self.current().timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_moves_between_days() {
        let day: DayKey = "2025-1-1".parse().unwrap();
        let clock = FixedClock::at_day(day);
        assert_eq!(clock.today().to_string(), "2025-1-1");

        clock.set_day(day.succ());
        assert_eq!(clock.today().to_string(), "2025-1-2");
    }

    #[test]
    fn test_unknown_timezone_falls_back_to_local() {
        let clock = SystemClock::with_timezone(Some("Mars/Olympus_Mons"));
        assert!(clock.timezone().is_none());

        let clock = SystemClock::with_timezone(Some("Europe/Berlin"));
        assert_eq!(clock.timezone(), Some(chrono_tz::Europe::Berlin));
    }
}
