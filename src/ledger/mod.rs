//! The durable aggregate ledger.
//!
//! This module contains:
//! - Calendar day keys and the persisted key layout
//! - The key-value store abstraction with memory and file backends
//! - The fold/rollover engine and the read-side queries

pub mod aggregator;
pub mod day_key;
pub mod keys;
pub mod query;
pub mod store;

// Re-export commonly used types
pub use aggregator::{FoldSummary, Ledger, RestoreRequest};
pub use day_key::DayKey;
pub use keys::{LedgerKeys, DEFAULT_NAMESPACE};
pub use query::{AppDistance, DailyTotal, LeaderboardPeriod, LedgerTotals};
pub use store::{
    decode_f64, encode_f64, FileStore, KeyValueStore, MemoryStore, StoredValue, WriteBatch,
};
