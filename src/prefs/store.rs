//! Key-value backends and the typed preference store on top of them

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Storage key for the contrast mode
pub const CONTRAST_KEY: &str = "contrastMode";
/// Storage key for the text scale
pub const TEXT_SIZE_KEY: &str = "textSize";

/// Errors from a preference backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("preference file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("preference file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("preference store lock poisoned")]
    Poisoned,
}

/// Display contrast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContrastMode {
    Dark,
    #[default]
    Light,
}

impl ContrastMode {
    /// The other mode
    pub fn toggled(self) -> Self {
        match self {
            ContrastMode::Dark => ContrastMode::Light,
            ContrastMode::Light => ContrastMode::Dark,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContrastMode::Dark => "dark",
            ContrastMode::Light => "light",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "dark" => Some(ContrastMode::Dark),
            "light" => Some(ContrastMode::Light),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContrastMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted user preferences
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preferences {
    pub contrast: ContrastMode,
    /// Multiplier over the base font size
    pub text_scale: f64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            contrast: ContrastMode::Light,
            text_scale: 1.0,
        }
    }
}

/// String-keyed persistent storage
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-memory backend; clones share the same map
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything stored so far
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .lock()
            .map(|values| values.clone())
            .unwrap_or_default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON file backend. The whole map is rewritten through a temp file and a
/// rename on every `set`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`. A missing or unparseable file is an empty
    /// store; the next `set` overwrites a bad file.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let values: BTreeMap<String, String> = match std::fs::read(path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(values) => values,
                Err(e) => {
                    warn!(?path, error = %e, "preference file is corrupt, starting from defaults");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(?path, entries = values.len(), "preference file opened");

        Ok(Self {
            path: path.to_owned(),
            values,
        })
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&self.values)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let previous = self.values.insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush() {
            match previous {
                Some(old) => self.values.insert(key.to_string(), old),
                None => self.values.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

/// Typed view over a backend: read once at startup, written on every change
pub struct PreferenceStore {
    backend: Box<dyn KeyValueStore>,
    current: Preferences,
}

impl PreferenceStore {
    /// Load preferences, falling back to defaults for missing or invalid
    /// values. `scale_bounds` clamps a stored scale that is out of range.
    pub fn load(backend: Box<dyn KeyValueStore>, scale_bounds: (f64, f64)) -> Self {
        let mut current = Preferences::default();

        match backend.get(CONTRAST_KEY) {
            Ok(Some(raw)) => match ContrastMode::parse(&raw) {
                Some(mode) => current.contrast = mode,
                None => warn!(value = %raw, "ignoring invalid stored contrast mode"),
            },
            Ok(None) => {}
            Err(e) => warn!(?e, "failed to read contrast mode"),
        }

        match backend.get(TEXT_SIZE_KEY) {
            Ok(Some(raw)) => match raw.trim().parse::<f64>() {
                Ok(scale) if scale.is_finite() && scale > 0.0 => {
                    current.text_scale = scale.clamp(scale_bounds.0, scale_bounds.1);
                }
                _ => warn!(value = %raw, "ignoring invalid stored text size"),
            },
            Ok(None) => {}
            Err(e) => warn!(?e, "failed to read text size"),
        }

        debug!(?current, "preferences loaded");

        Self { backend, current }
    }

    pub fn preferences(&self) -> Preferences {
        self.current
    }

    pub fn set_contrast(&mut self, mode: ContrastMode) -> Result<(), StoreError> {
        self.current.contrast = mode;
        self.backend.set(CONTRAST_KEY, mode.as_str())
    }

    pub fn set_text_scale(&mut self, scale: f64) -> Result<(), StoreError> {
        self.current.text_scale = scale;
        self.backend.set(TEXT_SIZE_KEY, &scale.to_string())
    }
}
