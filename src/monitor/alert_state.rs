//! Per-volume alert memory and its durable JSON file.
//!
//! The file holds a single JSON object mapping mount location to the threshold
//! that volume last alerted at. Writes go to a sibling `.tmp` file which is
//! fsynced and then renamed over the target, so a reader (or a restart after
//! SIGKILL) only ever sees the previous or the next complete map.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{MonError, Result};

/// Highest alerted threshold per location. Absent means fully re-armed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertState {
    entries: BTreeMap<String, f64>,
}

impl AlertState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored threshold for a location, if any.
    #[must_use]
    pub fn get(&self, location: &str) -> Option<f64> {
        self.entries.get(location).copied()
    }

    /// Record a threshold. Non-positive values clear the entry instead, so the
    /// sentinel is never stored.
    pub fn set(&mut self, location: &str, threshold: f64) {
        if threshold > 0.0 {
            self.entries.insert(location.to_string(), threshold);
        } else {
            self.entries.remove(location);
        }
    }

    /// Drop a location's entry. Returns whether one existed.
    pub fn clear(&mut self, location: &str) -> bool {
        self.entries.remove(location).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn without_sentinels(mut self) -> Self {
        self.entries.retain(|_, t| t.is_finite() && *t > 0.0);
        self
    }
}

impl FromIterator<(String, f64)> for AlertState {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut state = Self::new();
        for (location, threshold) in iter {
            state.set(&location, threshold);
        }
        state
    }
}

/// File-backed store for [`AlertState`].
#[derive(Debug, Clone)]
pub struct AlertStateStore {
    path: PathBuf,
}

impl AlertStateStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted map. `Ok(None)` when the file does not exist;
    /// malformed content is an error so the caller can report it before
    /// falling back to an empty map.
    pub fn load(&self) -> Result<Option<AlertState>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(MonError::io(&self.path, error)),
        };
        let state: AlertState = serde_json::from_str(&raw)?;
        Ok(Some(state.without_sentinels()))
    }

    /// Load, treating a missing or unreadable file as an empty map. The
    /// swallowed error (if any) is returned alongside for logging.
    pub fn load_or_empty(&self) -> (AlertState, Option<MonError>) {
        match self.load() {
            Ok(state) => (state.unwrap_or_default(), None),
            Err(error) => (AlertState::new(), Some(error)),
        }
    }

    /// Replace the file with the full map, atomically.
    pub fn persist(&self, state: &AlertState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        write_atomic(&self.path, json.as_bytes())
            .map_err(|source| MonError::io(&self.path, source))
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    // A leftover tmp entry (crash debris or a planted link) is unlinked, never
    // opened; the fresh file is created exclusively and must not be a symlink.
    if let Err(error) = fs::remove_file(&tmp_path)
        && error.kind() != io::ErrorKind::NotFound
    {
        return Err(error);
    }

    let result = (|| {
        {
            let mut opts = OpenOptions::new();
            opts.write(true).create_new(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt as _;
                opts.mode(0o644).custom_flags(nix::fcntl::OFlag::O_NOFOLLOW.bits());
            }
            let mut file = opts.open(&tmp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> AlertStateStore {
        AlertStateStore::new(dir.path().join("system-monitor.json"))
    }

    #[test]
    fn set_never_stores_sentinel() {
        let mut state = AlertState::new();
        state.set("/data", 0.95);
        assert_eq!(state.get("/data"), Some(0.95));
        state.set("/data", 0.0);
        assert_eq!(state.get("/data"), None);
        assert!(state.is_empty());
    }

    #[test]
    fn clear_reports_presence() {
        let mut state = AlertState::new();
        assert!(!state.clear("/data"));
        state.set("/data", 0.9);
        assert!(state.clear("/data"));
        assert!(state.is_empty());
    }

    #[test]
    fn load_missing_returns_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        assert!(store.load().expect("load should succeed").is_none());
        let (state, err) = store.load_or_empty();
        assert!(state.is_empty());
        assert!(err.is_none());
    }

    #[test]
    fn persist_and_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let state: AlertState = [("/data".to_string(), 0.95), ("/".to_string(), 0.8)]
            .into_iter()
            .collect();
        store.persist(&state).expect("persist should succeed");
        let loaded = store.load().expect("load").expect("present");
        assert_eq!(loaded, state);
    }

    #[test]
    fn file_is_plain_location_to_threshold_object() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let state: AlertState = [("/data".to_string(), 0.95)].into_iter().collect();
        store.persist(&state).expect("persist");
        let raw = fs::read_to_string(store.path()).expect("read");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value, serde_json::json!({"/data": 0.95}));
    }

    #[test]
    fn empty_state_persists_as_empty_object() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        store.persist(&AlertState::new()).expect("persist");
        assert_eq!(fs::read_to_string(store.path()).expect("read"), "{}");
    }

    #[test]
    fn corrupt_file_falls_back_to_empty_with_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        fs::write(store.path(), "{not-json").expect("write corrupt");
        assert!(matches!(
            store.load(),
            Err(MonError::Serialization { .. })
        ));
        let (state, err) = store.load_or_empty();
        assert!(state.is_empty());
        assert_eq!(err.expect("error reported").code(), "DM-2101");
    }

    #[test]
    fn wrong_shape_is_treated_as_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        fs::write(store.path(), r#"["/data", 0.95]"#).expect("write");
        let (state, err) = store.load_or_empty();
        assert!(state.is_empty());
        assert!(err.is_some());
    }

    #[test]
    fn load_drops_zero_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"/data": 0.9, "/boot": 0}"#).expect("write");
        let loaded = store.load().expect("load").expect("present");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("/data"), Some(0.9));
    }

    #[test]
    fn persist_replaces_whole_object() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let first: AlertState = [("/a".to_string(), 0.9), ("/b".to_string(), 0.8)]
            .into_iter()
            .collect();
        store.persist(&first).expect("persist first");
        let second: AlertState = [("/b".to_string(), 0.95)].into_iter().collect();
        store.persist(&second).expect("persist second");
        assert_eq!(store.load().expect("load").expect("present"), second);
    }

    #[test]
    fn persist_creates_parent_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("state").join("alerts.json");
        let store = AlertStateStore::new(path.clone());
        store.persist(&AlertState::new()).expect("persist");
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn persist_replaces_planted_tmp_symlink_without_touching_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let victim = dir.path().join("victim.conf");
        fs::write(&victim, "precious").expect("write victim");
        std::os::unix::fs::symlink(&victim, store.path().with_extension("json.tmp"))
            .expect("plant symlink");

        let state: AlertState = [("/data".to_string(), 0.95)].into_iter().collect();
        store.persist(&state).expect("persist should succeed");

        assert_eq!(fs::read_to_string(&victim).expect("read victim"), "precious");
        assert_eq!(store.load().expect("load").expect("present"), state);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn persist_recovers_from_stale_tmp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        fs::write(store.path().with_extension("json.tmp"), "{half").expect("write stale");
        store.persist(&AlertState::new()).expect("persist");
        assert_eq!(fs::read_to_string(store.path()).expect("read"), "{}");
    }

    #[test]
    fn persist_into_unwritable_location_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a dir").expect("write");
        let store = AlertStateStore::new(blocker.join("state.json"));
        let err = store.persist(&AlertState::new()).expect_err("should fail");
        assert_eq!(err.code(), "DM-3002");
    }
}
