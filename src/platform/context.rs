//! Connector context store
//!
//! Small key-value store the connector cursor lives in: the last successful
//! run timestamp and the list of record IDs already turned into alerts.
//! IDs are only ever appended.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

/// Key of the last success timestamp (unix milliseconds)
pub const LAST_SUCCESS_KEY: &str = "last_success_time";

/// Key of the JSON array of already processed IDs
pub const SEEN_IDS_KEY: &str = "seen_ids";

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Context store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Context value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Context value \"{key}\" is invalid: {value}")]
    InvalidValue { key: String, value: String },
}

pub trait ContextStore {
    fn get(&self, key: &str) -> Result<Option<String>, ContextError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), ContextError>;
}

// ============================================================================
// STORES
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemoryContextStore {
    values: HashMap<String, String>,
}

impl MemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContextStore for MemoryContextStore {
    fn get(&self, key: &str) -> Result<Option<String>, ContextError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), ContextError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// One JSON file per connector identity
#[derive(Debug)]
pub struct FileContextStore {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl FileContextStore {
    pub fn open(dir: &Path, identifier: &str) -> Result<Self, ContextError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", sanitize_identifier(identifier)));

        let values = if path.exists() {
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<HashMap<String, String>>(&content) {
                Ok(values) => {
                    log::debug!("Loaded {} context values from {:?}", values.len(), path);
                    values
                }
                Err(e) => {
                    log::warn!("Failed to parse context file {:?}: {} - starting empty", path, e);
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), ContextError> {
        let json = serde_json::to_string_pretty(&self.values)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ContextStore for FileContextStore {
    fn get(&self, key: &str) -> Result<Option<String>, ContextError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), ContextError> {
        self.values.insert(key.to_string(), value);
        self.save()
    }
}

fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

// ============================================================================
// CURSOR
// ============================================================================

pub fn read_seen_ids(store: &dyn ContextStore) -> Result<Vec<String>, ContextError> {
    match store.get(SEEN_IDS_KEY)? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(Vec::new()),
    }
}

pub fn write_seen_ids(store: &mut dyn ContextStore, ids: &[String]) -> Result<(), ContextError> {
    store.set(SEEN_IDS_KEY, serde_json::to_string(ids)?)
}

pub fn read_last_success(store: &dyn ContextStore) -> Result<Option<DateTime<Utc>>, ContextError> {
    let Some(raw) = store.get(LAST_SUCCESS_KEY)? else {
        return Ok(None);
    };

    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(Some)
        .ok_or(ContextError::InvalidValue { key: LAST_SUCCESS_KEY.to_string(), value: raw })
}

pub fn write_last_success(store: &mut dyn ContextStore, time: DateTime<Utc>) -> Result<(), ContextError> {
    store.set(LAST_SUCCESS_KEY, time.timestamp_millis().to_string())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_persists_between_opens() {
        let dir = tempdir().unwrap();
        {
            let mut store = FileContextStore::open(dir.path(), "Vectra QUX/Entities").unwrap();
            write_seen_ids(&mut store, &["a".to_string(), "b".to_string()]).unwrap();
            assert!(store.path().ends_with("Vectra_QUX_Entities.json"));
        }

        let store = FileContextStore::open(dir.path(), "Vectra QUX/Entities").unwrap();
        assert_eq!(read_seen_ids(&store).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_corrupted_file_starts_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let store = FileContextStore::open(dir.path(), "broken").unwrap();
        assert!(read_seen_ids(&store).unwrap().is_empty());
    }

    #[test]
    fn test_last_success_round_trip_ms() {
        let mut store = MemoryContextStore::new();
        assert!(read_last_success(&store).unwrap().is_none());

        let time = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        write_last_success(&mut store, time).unwrap();
        assert_eq!(read_last_success(&store).unwrap(), Some(time));
    }

    #[test]
    fn test_invalid_last_success_is_error() {
        let mut store = MemoryContextStore::new();
        store.set(LAST_SUCCESS_KEY, "yesterday".to_string()).unwrap();
        assert!(matches!(
            read_last_success(&store),
            Err(ContextError::InvalidValue { .. })
        ));
    }
}
