//! Preference-style key-value storage behind the ledger.
//!
//! The persisted layout is shared with a presentation layer that only knows
//! integer-typed preferences, so doubles travel as their raw IEEE-754 bit
//! pattern reinterpreted as `i64` ([`encode_f64`] / [`decode_f64`]).

use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Reinterpret a double's bits as a signed 64-bit integer.
pub fn encode_f64(value: f64) -> i64 {
    value.to_bits() as i64
}

/// Inverse of [`encode_f64`]. Exact for every bit pattern.
pub fn decode_f64(bits: i64) -> f64 {
    f64::from_bits(bits as u64)
}

/// A single persisted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StoredValue {
    /// 64-bit integer; doubles are stored here as raw bits.
    Long(i64),
    /// Counter value.
    Int(i64),
    /// Native double, accepted on read for stores written by other tools.
    Double(f64),
    Str(String),
}

impl StoredValue {
    /// A double stored as raw bits.
    pub fn from_f64(value: f64) -> Self {
        StoredValue::Long(encode_f64(value))
    }

    /// Read as a double: raw bits, a native double, or a numeric string.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StoredValue::Long(bits) => Some(decode_f64(*bits)),
            StoredValue::Double(v) => Some(*v),
            StoredValue::Str(s) => s.trim().parse().ok(),
            StoredValue::Int(_) => None,
        }
    }

    /// Read as a counter: an int, a long, or a numeric string.
    pub fn as_count(&self) -> Option<i64> {
        match self {
            StoredValue::Int(v) | StoredValue::Long(v) => Some(*v),
            StoredValue::Str(s) => s.trim().parse().ok(),
            StoredValue::Double(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StoredValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// An ordered set of writes applied together by [`KeyValueStore::commit`].
///
/// Later puts to the same key win.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: Vec<(String, StoredValue)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: StoredValue) -> &mut Self {
        self.writes.push((key.into(), value));
        self
    }

    pub fn put_f64(&mut self, key: impl Into<String>, value: f64) -> &mut Self {
        self.put(key, StoredValue::from_f64(value))
    }

    pub fn put_count(&mut self, key: impl Into<String>, value: i64) -> &mut Self {
        self.put(key, StoredValue::Int(value))
    }

    pub fn put_str(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.put(key, StoredValue::Str(value.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn into_writes(self) -> Vec<(String, StoredValue)> {
        self.writes
    }
}

/// Durable key-value storage.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<StoredValue>;

    /// Every key currently stored.
    fn keys(&self) -> Vec<String>;

    /// Apply the batch and confirm it is durable before returning `Ok`.
    ///
    /// On error the in-memory view may already reflect the batch while the
    /// durable copy does not. Callers are told; nothing is rolled back.
    fn commit(&mut self, batch: WriteBatch) -> Result<(), LedgerError>;

    /// Read a double, falling back to `default` when absent or unreadable.
    fn read_f64(&self, key: &str, default: f64) -> f64 {
        match self.get(key) {
            Some(value) => value.as_f64().unwrap_or_else(|| {
                tracing::warn!("Unreadable double at {key}: {value:?}, using {default}");
                default
            }),
            None => default,
        }
    }

    /// Read a counter, falling back to `default` when absent or unreadable.
    fn read_count(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(value) => value.as_count().unwrap_or_else(|| {
                tracing::warn!("Unreadable count at {key}: {value:?}, using {default}");
                default
            }),
            None => default,
        }
    }

    fn read_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.keys()
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect()
    }
}

/// Volatile store, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<StoredValue> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<(), LedgerError> {
        for (key, value) in batch.into_writes() {
            self.values.insert(key, value);
        }
        Ok(())
    }
}

/// A JSON preference file, rewritten atomically on every commit.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, StoredValue>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let values = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)
                    .map_err(|e| LedgerError::Corrupt(format!("{}: {e}", path.display())))?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec_pretty(&self.values)?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<StoredValue> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<(), LedgerError> {
        for (key, value) in batch.into_writes() {
            self.values.insert(key, value);
        }
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_encoding_is_exact() {
        for value in [
            0.0,
            -0.0,
            1.0,
            0.0254,
            5.0,
            f64::MIN_POSITIVE,
            f64::MIN_POSITIVE / 4.0, // subnormal
            f64::MAX,
            f64::INFINITY,
            f64::from_bits(0x7ff8_0000_dead_beef), // NaN with payload
            123_456.789_012_345,
        ] {
            let back = decode_f64(encode_f64(value));
            assert_eq!(back.to_bits(), value.to_bits(), "value {value}");
        }
    }

    #[test]
    fn test_negative_zero_keeps_sign() {
        assert!(decode_f64(encode_f64(-0.0)).is_sign_negative());
    }

    #[test]
    fn test_tolerant_reads() {
        assert_eq!(StoredValue::from_f64(2.5).as_f64(), Some(2.5));
        assert_eq!(StoredValue::Double(1.5).as_f64(), Some(1.5));
        assert_eq!(StoredValue::Str(" 3.25 ".into()).as_f64(), Some(3.25));
        assert_eq!(StoredValue::Int(4).as_f64(), None);

        assert_eq!(StoredValue::Int(7).as_count(), Some(7));
        assert_eq!(StoredValue::Long(8).as_count(), Some(8));
        assert_eq!(StoredValue::Str("9".into()).as_count(), Some(9));
        assert_eq!(StoredValue::Double(1.0).as_count(), None);
    }

    #[test]
    fn test_read_defaults_on_mismatch() {
        let mut store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put_str("distance", "not a number");
        batch.put_f64("count", 1.0);
        store.commit(batch).unwrap();

        assert_eq!(store.read_f64("distance", 0.0), 0.0);
        assert_eq!(store.read_f64("missing", 1.5), 1.5);
        // Raw bits of 1.0 are a valid long, so a count read sees the bits.
        assert_eq!(store.read_count("count", 0), encode_f64(1.0));
    }

    #[test]
    fn test_later_put_wins() {
        let mut store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put_count("scrolls", 0).put_count("scrolls", 3);
        store.commit(batch).unwrap();
        assert_eq!(store.read_count("scrolls", 0), 3);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.json");

        let mut store = FileStore::open(&path).unwrap();
        let mut batch = WriteBatch::new();
        batch
            .put_f64("flutter.dailyDistance", 0.1 + 0.2)
            .put_count("flutter.dailyScrolls", 2)
            .put_str("flutter.lastDateKey", "2025-1-1");
        store.commit(batch).unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.read_f64("flutter.dailyDistance", 0.0).to_bits(),
            (0.1f64 + 0.2).to_bits()
        );
        assert_eq!(reopened.read_count("flutter.dailyScrolls", 0), 2);
        assert_eq!(
            reopened.read_string("flutter.lastDateKey").as_deref(),
            Some("2025-1-1")
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_store_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(&path, "{ not json").unwrap();

        let err = FileStore::open(&path).unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt(_)));
    }

    #[test]
    fn test_keys_with_prefix() {
        let mut store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch
            .put_f64("daily_app_2025-1-1_a", 1.0)
            .put_f64("daily_app_2025-1-11_b", 1.0)
            .put_f64("daily_2025-1-1", 1.0);
        store.commit(batch).unwrap();

        assert_eq!(
            store.keys_with_prefix("daily_app_2025-1-1_"),
            vec!["daily_app_2025-1-1_a".to_string()]
        );
    }
}
