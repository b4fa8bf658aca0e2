//! Storage Module
//!
//! Durable string key/value storage with JSON documents under namespaced
//! keys. Every key loads independently: a corrupt value is logged and
//! replaced by that key's default.

mod preferences;

pub use preferences::Preferences;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};

/// Namespace shared by every durable key.
pub const KEY_PREFIX: &str = "achievement-tracker-";

/// Full storage key for a short key name.
pub fn storage_key(name: &str) -> String {
    format!("{KEY_PREFIX}{name}")
}

/// Browser-style local storage.
pub trait Storage {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

// == JSON helpers ==
/// Reads `name` as JSON. `Ok(None)` when absent.
///
/// Bare words written by older clients (`dark`, `true`) are accepted
/// as JSON strings when they do not parse on their own.
pub fn load_json<T: DeserializeOwned>(storage: &dyn Storage, name: &str) -> Result<Option<T>> {
    let Some(raw) = storage.get_item(&storage_key(name)) else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .or_else(|err| serde_json::from_value(serde_json::Value::String(raw.clone())).map_err(|_| err))
        .map(Some)
        .map_err(|e| SyncError::storage(name, e))
}

/// Reads `name`, substituting `default` when absent or corrupt.
pub fn load_or_default<T: DeserializeOwned>(storage: &dyn Storage, name: &str, default: T) -> T {
    match load_json(storage, name) {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(e) => {
            warn!(key = name, error = %e, "Corrupt stored value, using default");
            default
        }
    }
}

pub fn save_json<T: Serialize + ?Sized>(storage: &dyn Storage, name: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value).map_err(|e| SyncError::storage(name, e))?;
    storage.set_item(&storage_key(name), &raw)
}

// == Memory Storage ==
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}

// == File Storage ==
/// All keys in one JSON object file, rewritten on every change.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: RefCell<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Opens `path`. A missing file starts empty; an unreadable one is
    /// logged and also starts empty.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let items = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Corrupt storage file, starting empty");
                BTreeMap::new()
            }),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No storage file, starting empty");
                BTreeMap::new()
            }
        };
        Self {
            path,
            items: RefCell::new(items),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, key: &str) -> Result<()> {
        let raw = serde_json::to_string_pretty(&*self.items.borrow())
            .map_err(|e| SyncError::storage(key, e))?;
        fs::write(&self.path, raw).map_err(|e| SyncError::storage(key, e))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.flush(key)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        if self.items.borrow_mut().remove(key).is_some() {
            self.flush(key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_is_none() {
        let storage = MemoryStorage::new();
        let value: Option<Vec<String>> = load_json(&storage, "favorites").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_save_uses_prefixed_key() {
        let storage = MemoryStorage::new();
        save_json(&storage, "favorites", &vec!["g1"]).unwrap();

        assert_eq!(
            storage.get_item("achievement-tracker-favorites").as_deref(),
            Some(r#"["g1"]"#)
        );
    }

    #[test]
    fn test_corrupt_value_yields_default() {
        let storage = MemoryStorage::new();
        storage
            .set_item(&storage_key("favorites"), "{not json")
            .unwrap();

        let err = load_json::<Vec<String>>(&storage, "favorites").unwrap_err();
        assert!(matches!(err, SyncError::Storage { .. }));
        assert_eq!(
            load_or_default(&storage, "favorites", vec!["x".to_string()]),
            vec!["x".to_string()]
        );
    }

    #[test]
    fn test_bare_word_accepted_as_string() {
        let storage = MemoryStorage::new();
        storage.set_item(&storage_key("theme"), "contrast").unwrap();

        let theme: Option<String> = load_json(&storage, "theme").unwrap();
        assert_eq!(theme.as_deref(), Some("contrast"));
    }

    #[test]
    fn test_file_storage_persists_across_opens() {
        let path = std::env::temp_dir().join(format!(
            "catalog_sync_storage_{}_{}.json",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));

        let storage = FileStorage::open(&path);
        storage.set_item("a", "1").unwrap();
        storage.set_item("b", "2").unwrap();
        storage.remove_item("a").unwrap();

        let reopened = FileStorage::open(&path);
        assert_eq!(reopened.get_item("a"), None);
        assert_eq!(reopened.get_item("b").as_deref(), Some("2"));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let path = std::env::temp_dir().join(format!(
            "catalog_sync_corrupt_{}_{}.json",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        fs::write(&path, "[[[").unwrap();

        let storage = FileStorage::open(&path);
        assert_eq!(storage.get_item("anything"), None);

        let _ = fs::remove_file(&path);
    }
}
