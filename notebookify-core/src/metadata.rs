//! Metadata Store: folder-path key → remote folder ID, persisted as one flat
//! JSON object.
//!
//! Loaded fully at startup and written back fully after each mutation.
//! Unreadable or corrupted content loads as an empty map and is overwritten on
//! the next save. There is no cross-process locking.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::MetadataError;

/// Key holding the configured top-level folder ID in older metadata files.
pub const ROOT_FOLDER_KEY: &str = "root_folder_id";

#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl MetadataStore {
    /// Load the store from `path`. Never fails.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => {
                    debug!(path = %path.display(), entries = entries.len(), "[METADATA] Loaded metadata");
                    entries
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "[METADATA] Metadata file corrupted, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "[METADATA] No metadata file yet");
                BTreeMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "[METADATA] Metadata file unreadable, starting empty");
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    /// Cache key for a folder: `{parent_id_or_empty}/{folder_name}`.
    pub fn folder_key(parent_id: Option<&str>, name: &str) -> String {
        format!("{}/{}", parent_id.unwrap_or(""), name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace an entry and persist immediately. On a failed
    /// write the in-memory map is left as it was.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<(), MetadataError> {
        let mut next = self.entries.clone();
        next.insert(key.into(), value.into());
        write_entries(&self.path, &next)?;
        self.entries = next;
        Ok(())
    }

    /// Drop an entry and persist immediately. No-op when the key is absent.
    pub fn remove(&mut self, key: &str) -> Result<(), MetadataError> {
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        let mut next = self.entries.clone();
        next.remove(key);
        write_entries(&self.path, &next)?;
        self.entries = next;
        Ok(())
    }

    /// Write the whole map, replacing the file atomically.
    pub fn save(&self) -> Result<(), MetadataError> {
        write_entries(&self.path, &self.entries)
    }
}

fn write_entries(path: &Path, entries: &BTreeMap<String, String>) -> Result<(), MetadataError> {
    let json = serde_json::to_string_pretty(entries)?;
    let write_err = |source| MetadataError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(write_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
    tmp.write_all(json.as_bytes()).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    info!(path = %path.display(), entries = entries.len(), "[METADATA] Saved metadata");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_key_uses_empty_parent_for_root() {
        assert_eq!(MetadataStore::folder_key(None, "notebooks"), "/notebooks");
        assert_eq!(MetadataStore::folder_key(Some("abc"), "deep"), "abc/deep");
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::load(dir.path().join("absent.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn non_string_values_count_as_corrupted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        fs::write(&path, r#"{"a/b": 3}"#).unwrap();
        assert!(MetadataStore::load(&path).is_empty());
    }

    #[test]
    fn remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        let mut store = MetadataStore::load(&path);
        store.insert("/a", "id-a").unwrap();
        store.insert("/b", "id-b").unwrap();
        store.remove("/a").unwrap();

        let reloaded = MetadataStore::load(&path);
        assert_eq!(reloaded.get("/a"), None);
        assert_eq!(reloaded.get("/b"), Some("id-b"));
    }

    #[test]
    fn invalid_json_loads_empty_and_is_overwritten_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        fs::write(&path, "{ definitely not json").unwrap();

        let mut store = MetadataStore::load(&path);
        assert!(store.is_empty());
        store.insert("/reports", "F1").unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let parsed: BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.get("/reports").map(String::as_str), Some("F1"));
    }

    #[test]
    fn failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "file").unwrap();
        let path = dir.path().join("meta.json");

        let mut store = MetadataStore::load(&path);
        store.insert("/kept", "id-kept").unwrap();

        store.path = blocker.join("meta.json");
        assert!(store.insert("/new", "id-new").is_err());
        assert_eq!(store.get("/new"), None);
        assert!(store.remove("/kept").is_err());
        assert_eq!(store.get("/kept"), Some("id-kept"));
        assert_eq!(store.len(), 1);
    }
}
