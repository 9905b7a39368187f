use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::{debug, warn};

use super::codec::ValueMap;
use super::controller::{FormController, FormResult, read_lock, write_lock};

const DRAFT_KEY_PREFIX: &str = "form_";

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("draft storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("draft serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("draft backend failed: {0}")]
    Backend(String),
}

/// Repository the draft store persists into. Keys are already namespaced.
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, DraftError>;
    fn set(&self, key: &str, value: &str) -> Result<(), DraftError>;
    /// Removing an absent key succeeds.
    fn remove(&self, key: &str) -> Result<(), DraftError>;
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<BTreeMap<String, String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, DraftError> {
        let state = match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(state.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DraftError> {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DraftError> {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.remove(key);
        Ok(())
    }
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, DraftError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(DraftError::Backend(format!("unsupported draft key `{key}`")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, DraftError> {
        match std::fs::read_to_string(self.path_for(key)?) {
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DraftError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(path, value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DraftError> {
        match std::fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

/// Best-effort draft persistence. Failures are logged and never returned.
#[derive(Clone)]
pub struct DraftStore {
    backend: Arc<dyn KeyValueStore>,
}

impl Debug for DraftStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftStore").finish_non_exhaustive()
    }
}

impl Default for DraftStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl DraftStore {
    pub fn new(backend: impl KeyValueStore) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(InMemoryStore::new())
    }

    pub fn key(form_id: &str) -> String {
        format!("{DRAFT_KEY_PREFIX}{form_id}")
    }

    pub fn save(&self, form_id: &str, values: &ValueMap) {
        let result = serde_json::to_string(values)
            .map_err(DraftError::from)
            .and_then(|json| self.backend.set(&Self::key(form_id), &json));
        match result {
            Ok(()) => debug!(form_id, fields = values.len(), "draft saved"),
            Err(error) => warn!(form_id, %error, "failed to save form draft"),
        }
    }

    pub fn load(&self, form_id: &str) -> Option<ValueMap> {
        let raw = match self.backend.get(&Self::key(form_id)) {
            Ok(raw) => raw?,
            Err(error) => {
                warn!(form_id, %error, "failed to read form draft");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(values) => Some(values),
            Err(error) => {
                warn!(form_id, %error, "discarding unparseable form draft");
                None
            }
        }
    }

    pub fn remove(&self, form_id: &str) {
        if let Err(error) = self.backend.remove(&Self::key(form_id)) {
            warn!(form_id, %error, "failed to remove form draft");
        }
    }
}

impl FormController {
    pub fn save_draft(&self) -> FormResult<()> {
        let values = read_lock(&self.state, "saving draft")?.current.clone();
        self.drafts.save(self.form_id(), &values);
        Ok(())
    }

    /// Replaces `current` with the stored draft, if any. `original` is kept.
    pub fn load_draft(&self) -> FormResult<bool> {
        let Some(draft) = self.drafts.load(self.form_id()) else {
            return Ok(false);
        };
        write_lock(&self.state, "loading draft into form")?.replace_current(draft);
        debug!(form_id = %self.form_id(), "draft loaded");
        self.schedule_autosave()?;
        self.notify()?;
        Ok(true)
    }

    pub fn clear_draft(&self) {
        self.drafts.remove(self.form_id());
    }
}
