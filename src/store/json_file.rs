//! JSON file backend for the state document.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{PersistedState, StateStore, StoreError};

/// Stores the state document as pretty-printed JSON at a fixed path.
///
/// Saves go to a sibling `*.tmp` file that is flushed and then renamed over
/// the target, so the document on disk is always a complete snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name: OsString = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("database.json"));
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Move an undecodable document out of the way so a fresh one can be
    /// written without destroying it.
    fn quarantine(&self, reason: &str) -> Result<(), StoreError> {
        let backup = self.sibling(".corrupt");
        log::warn!(
            "State document {} is unreadable ({}); moving it to {}",
            self.path.display(),
            reason,
            backup.display()
        );
        fs::rename(&self.path, &backup).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            message: format!("{}; backup failed: {}", reason, e),
        })
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<PersistedState>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        match serde_json::from_str::<PersistedState>(&content) {
            Ok(state) => Ok(Some(state.normalize())),
            Err(e) => {
                self.quarantine(&e.to_string())?;
                Ok(None)
            }
        }
    }

    fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }

        let content = serde_json::to_vec_pretty(state)?;
        let tmp = self.sibling(".tmp");

        let mut file = File::create(&tmp).map_err(|e| self.io_error(e))?;
        file.write_all(&content).map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;
        drop(file);

        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(self.io_error(e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affinity::profiles::{Fingerprint, VoiceProfile};

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("database.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_preserves_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/state/database.json"));

        let mut state = PersistedState::new(72.0);
        let fp = Fingerprint::from_audio(b"voice sample");
        state
            .voice_profiles
            .insert(fp.clone(), VoiceProfile::first_detection(&fp, chrono::Utc::now()));
        state
            .emotional_memory
            .insert("mood".to_string(), serde_json::json!({"streak": 3}));

        store.save(&state).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");
        let store = JsonFileStore::new(&path);

        store.save(&PersistedState::new(50.0)).unwrap();
        store.save(&PersistedState::new(51.0)).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["database.json".to_string()]);
        assert_eq!(store.load().unwrap().unwrap().love_level, 51.0);
    }

    #[test]
    fn test_corrupt_document_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");
        fs::write(&path, "{\"love_level\": ").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(store.load().unwrap().is_none());
        assert!(!path.exists());

        let backup = dir.path().join("database.json.corrupt");
        assert_eq!(fs::read_to_string(backup).unwrap(), "{\"love_level\": ");
    }

    #[test]
    fn test_save_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let store = JsonFileStore::new(blocker.join("database.json"));
        let err = store.save(&PersistedState::new(50.0)).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
