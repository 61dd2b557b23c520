//! Persistence for the simulation document.
//!
//! The whole [`SimulationState`] is read and written in one piece. Loading
//! never fails: an absent or unreadable document yields the default state.

use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use tracing::info;
use tracing::warn;

use super::state::SimulationState;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to write state file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Backing storage for the simulation document.
pub trait Store: Send {
    /// Load the current document, falling back to defaults.
    fn load(&self) -> SimulationState;

    /// Replace the stored document.
    fn save(&mut self, state: &SimulationState) -> Result<(), StoreError>;
}

/// Parse a stored document, filling in any lights it lacks.
fn parse_document(source: &str, contents: &str) -> SimulationState {
    match serde_json::from_str::<SimulationState>(contents) {
        Ok(mut state) => {
            let added = state.fill_missing_lights();
            if !added.is_empty() {
                warn!("{} is missing lights {:?}, adding them switched off", source, added);
            }
            state
        }
        Err(e) => {
            warn!("{} is malformed, falling back to default state: {}", source, e);
            SimulationState::default()
        }
    }
}

/// Stores the document as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Store for FileStore {
    fn load(&self) -> SimulationState {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => parse_document(&self.path.display().to_string(), &contents),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(
                    "No state file at {}, starting from default state",
                    self.path.display()
                );
                SimulationState::default()
            }
            Err(e) => {
                warn!(
                    "Failed to read state file {}, falling back to default state: {}",
                    self.path.display(),
                    e
                );
                SimulationState::default()
            }
        }
    }

    fn save(&mut self, state: &SimulationState) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(state)?;

        // Write beside the target and rename so readers never see a partial file
        let temp = self.temp_path();
        std::fs::write(&temp, contents).map_err(|e| StoreError::Io(temp.clone(), e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| StoreError::Io(self.path.clone(), e))?;
        Ok(())
    }
}

/// Keeps the serialized document in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    document: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing serialized document.
    pub fn from_document(document: impl Into<String>) -> Self {
        Self {
            document: Some(document.into()),
        }
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }
}

impl Store for MemoryStore {
    fn load(&self) -> SimulationState {
        match &self.document {
            Some(contents) => parse_document("in-memory state", contents),
            None => SimulationState::default(),
        }
    }

    fn save(&mut self, state: &SimulationState) -> Result<(), StoreError> {
        self.document = Some(serde_json::to_string(state)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_absent_file_loads_default() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("data.json"));
        assert_eq!(store.load(), SimulationState::default());
    }

    #[test]
    fn test_corrupt_file_loads_default() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = FileStore::new(&path);
        assert_eq!(store.load(), SimulationState::default());
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.json");
        let mut store = FileStore::new(&path);

        let mut state = SimulationState::default();
        state.lights.get_mut(&2).unwrap().switch(true, 100);
        state.humidity.update(51.3, 100);
        store.save(&state).unwrap();

        assert_eq!(store.load(), state);
        assert!(!temp_dir.path().join("data.json.tmp").exists());

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["lights"]["2"]["activeSince"], 100);
    }

    #[test]
    fn test_save_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = FileStore::new(temp_dir.path().join("data.json"));

        let mut state = SimulationState::default();
        state.gas_sensor.set(true, 1);
        store.save(&state).unwrap();
        store.save(&SimulationState::default()).unwrap();

        assert_eq!(store.load(), SimulationState::default());
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = FileStore::new(temp_dir.path().join("missing").join("data.json"));
        let err = store.save(&SimulationState::default()).unwrap_err();
        assert!(matches!(err, StoreError::Io(..)));
    }

    #[test]
    fn test_legacy_document_with_missing_lights() {
        let store = MemoryStore::from_document(
            r#"{
                "lights": {"1": {"state": true, "timerStart": 5, "history": []}},
                "motionSensorStatic": {"state": false, "history": []},
                "gasSensor": {"state": false, "history": []},
                "motionSensorDynamic": {"state": false, "history": []},
                "temperature": {"current": 21.5, "history": []},
                "humidity": {"current": 40.0, "history": []}
            }"#,
        );

        let state = store.load();
        assert_eq!(state.lights.len(), 6);
        assert_eq!(state.lights[&1].active_since, Some(5));
        assert_eq!(state.temperature.current, 21.5);
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        assert!(store.document().is_none());
        assert_eq!(store.load(), SimulationState::default());

        let mut state = SimulationState::default();
        state.temperature.update(23.4, 9);
        store.save(&state).unwrap();
        assert_eq!(store.load(), state);

        let corrupt = MemoryStore::from_document("[]");
        assert_eq!(corrupt.load(), SimulationState::default());
    }
}
