//! Read-side queries over the ledger.

use crate::ledger::aggregator::Ledger;
use crate::ledger::DayKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current running totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub daily_distance: f64,
    pub daily_scrolls: i64,
    pub lifetime_distance: f64,
    pub lifetime_scrolls: i64,
    /// Day the daily totals are accumulating under, if anything was ever stored
    pub last_date_key: Option<String>,
}

/// Historical totals for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub day: DayKey,
    pub distance: f64,
    pub scrolls: i64,
}

/// Distance attributed to one app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppDistance {
    pub app_id: String,
    pub distance: f64,
}

/// Range a leaderboard covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardPeriod {
    Today,
    /// Seven days starting at the given day
    Week(DayKey),
}

impl Ledger {
    /// Read the running totals.
    pub fn totals(&self) -> LedgerTotals {
        let keys = &self.keys;
        let store = self.lock();
        LedgerTotals {
            daily_distance: store.read_f64(&keys.daily_distance(), 0.0),
            daily_scrolls: store.read_count(&keys.daily_scrolls(), 0),
            lifetime_distance: store.read_f64(&keys.lifetime_distance(), 0.0),
            lifetime_scrolls: store.read_count(&keys.lifetime_scrolls(), 0),
            last_date_key: store.read_string(&keys.last_date_key()),
        }
    }

    /// Historical totals for the seven days starting at `week_start`.
    ///
    /// Days with nothing recorded report zero.
    pub fn weekly(&self, week_start: DayKey) -> Vec<DailyTotal> {
        let keys = &self.keys;
        let store = self.lock();
        week_start
            .week()
            .into_iter()
            .map(|day| DailyTotal {
                day,
                distance: store.read_f64(&keys.day_distance(day), 0.0),
                scrolls: store.read_count(&keys.day_scrolls(day), 0),
            })
            .collect()
    }

    /// Per-app distance for the period, largest first.
    ///
    /// Apps with no positive distance are left out.
    pub fn leaderboard(&self, period: LeaderboardPeriod) -> Vec<AppDistance> {
        let days: Vec<DayKey> = match period {
            LeaderboardPeriod::Today => vec![self.clock.today()],
            LeaderboardPeriod::Week(start) => start.week().to_vec(),
        };

        let keys = &self.keys;
        let store = self.lock();
        let mut totals: HashMap<String, f64> = HashMap::new();

        for day in days {
            let prefix = keys.app_prefix(day);
            for key in store.keys_with_prefix(&prefix) {
                let distance = store.read_f64(&key, 0.0);
                if distance > 0.0 {
                    let app_id = key[prefix.len()..].to_string();
                    *totals.entry(app_id).or_insert(0.0) += distance;
                }
            }
        }

        let mut board: Vec<AppDistance> = totals
            .into_iter()
            .map(|(app_id, distance)| AppDistance { app_id, distance })
            .collect();
        board.sort_by(|a, b| {
            b.distance
                .total_cmp(&a.distance)
                .then_with(|| a.app_id.cmp(&b.app_id))
        });
        board
    }
}
