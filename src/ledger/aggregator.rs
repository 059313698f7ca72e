//! The aggregate ledger: folds samples into daily, lifetime and per-app totals.

use crate::clock::SharedClock;
use crate::collector::types::{DistanceSample, TEST_APP, UNKNOWN_APP};
use crate::error::LedgerError;
use crate::ledger::keys::LedgerKeys;
use crate::ledger::store::{KeyValueStore, WriteBatch};
use crate::ledger::DayKey;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

/// Running totals immediately after a fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldSummary {
    /// Day the sample was credited to
    pub day: DayKey,
    pub daily_distance: f64,
    pub daily_scrolls: i64,
    pub lifetime_distance: f64,
    pub lifetime_scrolls: i64,
    /// Day that was archived, if this fold crossed a date boundary
    pub rolled_over_from: Option<String>,
}

/// A trusted overwrite of the running totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreRequest {
    pub daily_distance: f64,
    pub daily_scrolls: i64,
    pub lifetime_distance: f64,
    pub lifetime_scrolls: i64,
    /// Day the daily totals belong to; today when omitted
    #[serde(default)]
    pub date_key: Option<DayKey>,
}

/// The durable ledger.
///
/// Every read-modify-write runs under one mutex, so concurrent callers see
/// folds applied one at a time. `fold` is not idempotent: replaying a sample
/// counts it again.
pub struct Ledger {
    store: Mutex<Box<dyn KeyValueStore>>,
    pub(crate) keys: LedgerKeys,
    pub(crate) clock: SharedClock,
    excluded_apps: Vec<String>,
}

impl Ledger {
    pub fn new(store: impl KeyValueStore + 'static, clock: SharedClock) -> Self {
        Self {
            store: Mutex::new(Box::new(store)),
            keys: LedgerKeys::default(),
            clock,
            excluded_apps: vec![UNKNOWN_APP.to_string(), TEST_APP.to_string()],
        }
    }

    /// Use a different key namespace.
    pub fn with_keys(mut self, keys: LedgerKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Replace the list of app ids that never receive per-app credit.
    ///
    /// The empty id is always excluded.
    pub fn with_excluded_apps(mut self, apps: impl IntoIterator<Item = String>) -> Self {
        self.excluded_apps = apps.into_iter().collect();
        self
    }

    pub fn keys(&self) -> &LedgerKeys {
        &self.keys
    }

    /// The day new samples are credited to.
    pub fn today(&self) -> DayKey {
        self.clock.today()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Box<dyn KeyValueStore>> {
        // The guarded store is rewritten whole on every commit, so a panic in
        // another holder leaves nothing half-applied in memory worth refusing.
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether an app id earns per-app distance.
    pub fn credits_app(&self, app_id: &str) -> bool {
        !app_id.is_empty() && !self.excluded_apps.iter().any(|a| a == app_id)
    }

    /// Fold one sample into the ledger and persist the result.
    pub fn fold(&self, sample: &DistanceSample) -> Result<FoldSummary, LedgerError> {
        if !sample.is_valid() {
            return Err(LedgerError::InvalidSample(format!(
                "distance {} is not a finite non-negative number",
                sample.distance_m
            )));
        }

        let keys = &self.keys;
        let mut store = self.lock();
        let today = self.clock.today();

        let last_label = store
            .read_string(&keys.last_date_key())
            .unwrap_or_else(|| today.to_string());
        let last_day = last_label.parse::<DayKey>().ok();

        let mut daily_distance = store.read_f64(&keys.daily_distance(), 0.0);
        let mut daily_scrolls = store.read_count(&keys.daily_scrolls(), 0);
        let lifetime_distance = store.read_f64(&keys.lifetime_distance(), 0.0);
        let lifetime_scrolls = store.read_count(&keys.lifetime_scrolls(), 0);

        let mut batch = WriteBatch::new();
        let mut rolled_over_from = None;

        if last_day != Some(today) {
            let previous = last_day.map(|d| d.to_string()).unwrap_or(last_label);
            tracing::info!(
                "Day rollover {previous} -> {today}: archiving {daily_distance}m ({daily_scrolls} scrolls)"
            );
            batch
                .put_f64(keys.day_distance(&previous), daily_distance)
                .put_count(keys.day_scrolls(&previous), daily_scrolls);
            daily_distance = 0.0;
            daily_scrolls = 0;
            rolled_over_from = Some(previous);
        }

        let daily_distance = daily_distance + sample.distance_m;
        let daily_scrolls = daily_scrolls.saturating_add(1);
        let lifetime_distance = lifetime_distance + sample.distance_m;
        let lifetime_scrolls = lifetime_scrolls.saturating_add(1);

        batch
            .put_f64(keys.daily_distance(), daily_distance)
            .put_count(keys.daily_scrolls(), daily_scrolls)
            .put_f64(keys.lifetime_distance(), lifetime_distance)
            .put_count(keys.lifetime_scrolls(), lifetime_scrolls)
            .put_str(keys.last_date_key(), today.to_string())
            .put_f64(keys.day_distance(today), daily_distance)
            .put_count(keys.day_scrolls(today), daily_scrolls);

        if self.credits_app(&sample.app_id) {
            let app_key = keys.app_distance(today, &sample.app_id);
            let existing = store.read_f64(&app_key, 0.0);
            batch.put_f64(app_key, existing + sample.distance_m);
        }

        if let Err(e) = store.commit(batch) {
            tracing::error!("Failed to persist {}m from {}: {e}", sample.distance_m, sample.app_id);
            return Err(e);
        }

        tracing::debug!(
            "Persisted: daily {daily_distance}m ({daily_scrolls} scrolls), lifetime {lifetime_distance}m ({lifetime_scrolls} scrolls)"
        );

        Ok(FoldSummary {
            day: today,
            daily_distance,
            daily_scrolls,
            lifetime_distance,
            lifetime_scrolls,
            rolled_over_from,
        })
    }

    /// Overwrite the running totals directly.
    ///
    /// Skips rollover entirely; the caller is responsible for consistency.
    /// Also mirrors the daily totals into the historical keys for the day.
    pub fn restore(&self, request: &RestoreRequest) -> Result<(), LedgerError> {
        for (name, value) in [
            ("daily_distance", request.daily_distance),
            ("lifetime_distance", request.lifetime_distance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(LedgerError::InvalidSample(format!("{name} = {value}")));
            }
        }
        for (name, count) in [
            ("daily_scrolls", request.daily_scrolls),
            ("lifetime_scrolls", request.lifetime_scrolls),
        ] {
            if count < 0 {
                return Err(LedgerError::InvalidSample(format!("{name} = {count}")));
            }
        }

        let keys = &self.keys;
        let day = request.date_key.unwrap_or_else(|| self.clock.today());

        let mut batch = WriteBatch::new();
        batch
            .put_f64(keys.daily_distance(), request.daily_distance)
            .put_count(keys.daily_scrolls(), request.daily_scrolls)
            .put_f64(keys.lifetime_distance(), request.lifetime_distance)
            .put_count(keys.lifetime_scrolls(), request.lifetime_scrolls)
            .put_str(keys.last_date_key(), day.to_string())
            .put_f64(keys.day_distance(day), request.daily_distance)
            .put_count(keys.day_scrolls(day), request.daily_scrolls);

        self.lock().commit(batch)?;
        tracing::info!(
            "Restored totals for {day}: daily {}m ({} scrolls), lifetime {}m ({} scrolls)",
            request.daily_distance,
            request.daily_scrolls,
            request.lifetime_distance,
            request.lifetime_scrolls
        );
        Ok(())
    }

    /// Add distance to an app's total for a day (today when `day` is `None`).
    ///
    /// Returns `false` without writing when the app id is empty or the
    /// distance is not positive.
    pub fn record_app_distance(
        &self,
        app_id: &str,
        distance_m: f64,
        day: Option<DayKey>,
    ) -> Result<bool, LedgerError> {
        if app_id.is_empty() || !distance_m.is_finite() || distance_m <= 0.0 {
            return Ok(false);
        }

        let day = day.unwrap_or_else(|| self.clock.today());
        let key = self.keys.app_distance(day, app_id);

        let mut store = self.lock();
        let existing = store.read_f64(&key, 0.0);
        let mut batch = WriteBatch::new();
        batch.put_f64(key, existing + distance_m);
        store.commit(batch)?;

        tracing::debug!("Saved app data: {app_id} += {distance_m}m for {day}");
        Ok(true)
    }
}
