//! Persisted key layout.

use std::fmt::Display;

/// Default namespace, the shared-preferences prefix the presentation layer reads.
pub const DEFAULT_NAMESPACE: &str = "flutter.";

/// Builds every key the ledger reads or writes under one namespace prefix.
#[derive(Debug, Clone)]
pub struct LedgerKeys {
    namespace: String,
}

impl LedgerKeys {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn key(&self, name: &str) -> String {
        format!("{}{name}", self.namespace)
    }

    pub fn daily_distance(&self) -> String {
        self.key("dailyDistance")
    }

    pub fn daily_scrolls(&self) -> String {
        self.key("dailyScrolls")
    }

    pub fn lifetime_distance(&self) -> String {
        self.key("lifetimeDistance")
    }

    pub fn lifetime_scrolls(&self) -> String {
        self.key("lifetimeScrolls")
    }

    pub fn last_date_key(&self) -> String {
        self.key("lastDateKey")
    }

    /// Historical distance snapshot for a day.
    pub fn day_distance(&self, day: impl Display) -> String {
        self.key(&format!("daily_{day}"))
    }

    /// Historical scroll-count snapshot for a day.
    pub fn day_scrolls(&self, day: impl Display) -> String {
        self.key(&format!("daily_scrolls_{day}"))
    }

    /// Prefix shared by every per-app key of a day.
    pub fn app_prefix(&self, day: impl Display) -> String {
        self.key(&format!("daily_app_{day}_"))
    }

    pub fn app_distance(&self, day: impl Display, app_id: &str) -> String {
        format!("{}{app_id}", self.app_prefix(day))
    }
}

impl Default for LedgerKeys {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}
