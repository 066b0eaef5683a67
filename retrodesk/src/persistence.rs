use crate::error::PersistenceError;
use crate::history::SessionHistory;
use crate::session::PersistedSession;
use crate::windows::{AppType, Geometry};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

const SESSION_KEY: &str = "session";
const HISTORY_KEY: &str = "history";
const WINDOWS_KEY: &str = "windows";

/// Durable string key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// One JSON file per key in a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The platform data directory, e.g. `~/.local/share/retrodesk`.
    pub fn open_default() -> Result<Self, PersistenceError> {
        let proj_dirs =
            ProjectDirs::from("com", "retrodesk", "retrodesk").ok_or(PersistenceError::NoDataDir)?;
        Self::new(proj_dirs.data_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.path(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)?;
        fs::rename(staging, path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        match fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// Typed access to the desktop's persisted state.
///
/// Loads never fail: missing or unreadable values are logged and replaced by
/// defaults. Saves return their error so the caller can decide whether the
/// user needs to hear about it.
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::default())
    }

    fn try_load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PersistenceError> {
        match self.store.get(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_load(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("ignoring stored {}: {}", key, e);
                None
            }
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(value)?;
        self.store.set(key, &json)
    }

    pub fn load_session(&self) -> Option<PersistedSession> {
        self.load(SESSION_KEY)
    }

    pub fn save_session(&self, session: &PersistedSession) -> Result<(), PersistenceError> {
        self.save(SESSION_KEY, session)
    }

    pub fn load_history(&self) -> SessionHistory {
        self.load(HISTORY_KEY).unwrap_or_default()
    }

    pub fn save_history(&self, history: &SessionHistory) -> Result<(), PersistenceError> {
        self.save(HISTORY_KEY, history)
    }

    pub fn load_geometry(&self) -> BTreeMap<AppType, Geometry> {
        self.load(WINDOWS_KEY).unwrap_or_default()
    }

    pub fn save_geometry(
        &self,
        geometry: &BTreeMap<AppType, Geometry>,
    ) -> Result<(), PersistenceError> {
        self.save(WINDOWS_KEY, geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use retrodesk_ipc::Phase;

    fn session() -> PersistedSession {
        PersistedSession {
            seconds_remaining: 812,
            phase: Phase::ShortBreak,
            cycles_completed: 2,
            selected_task_id: Some(4),
        }
    }

    #[test]
    fn missing_values_load_as_defaults() {
        let persistence = Persistence::in_memory();
        assert_eq!(persistence.load_session(), None);
        assert_eq!(persistence.load_history(), SessionHistory::default());
        assert!(persistence.load_geometry().is_empty());
    }

    #[test]
    fn corrupt_values_fall_back_to_defaults() {
        let store = MemoryStore::default();
        store.set(SESSION_KEY, "{not json").unwrap();
        store.set(HISTORY_KEY, "42").unwrap();
        let persistence = Persistence::new(store);

        assert_eq!(persistence.load_session(), None);
        assert!(persistence.load_history().days().is_empty());
    }

    #[test]
    fn session_and_geometry_are_restored() {
        let persistence = Persistence::in_memory();
        let mut geometry = BTreeMap::new();
        geometry.insert(AppType::Tasks, Geometry::new(3, 4, 40, 12));

        persistence.save_session(&session()).unwrap();
        persistence.save_geometry(&geometry).unwrap();

        assert_eq!(persistence.load_session(), Some(session()));
        assert_eq!(persistence.load_geometry(), geometry);
    }

    /// Reads nothing back and refuses every write.
    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, PersistenceError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), PersistenceError> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into())
        }

        fn remove(&self, _key: &str) -> Result<(), PersistenceError> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into())
        }
    }

    #[test]
    fn failed_writes_are_reported_and_loads_stay_usable() {
        let persistence = Persistence::new(FailingStore);

        assert!(matches!(
            persistence.save_session(&session()),
            Err(PersistenceError::Io(_))
        ));
        assert!(persistence.save_history(&SessionHistory::default()).is_err());
        assert_eq!(persistence.load_session(), None);
        assert!(persistence.load_geometry().is_empty());
    }

    #[test]
    fn file_store_writes_one_document_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("data")).unwrap();
        let persistence = Persistence::new(store.clone());

        let mut history = SessionHistory::default();
        history.record_focus(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), 25);
        persistence.save_history(&history).unwrap();

        assert!(store.dir().join("history.json").exists());
        assert!(!store.dir().join("history.json.tmp").exists());
        assert_eq!(persistence.load_history(), history);

        store.remove(HISTORY_KEY).unwrap();
        store.remove(HISTORY_KEY).unwrap();
        assert_eq!(store.get(HISTORY_KEY).unwrap(), None);
    }

    #[test]
    fn geometry_is_keyed_by_app_name() {
        let persistence = Persistence::in_memory();
        let mut geometry = BTreeMap::new();
        geometry.insert(AppType::Timer, Geometry::new(1, 2, 30, 8));
        persistence.save_geometry(&geometry).unwrap();

        let raw = persistence.store.get(WINDOWS_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["timer"]["width"], 30);
    }
}
