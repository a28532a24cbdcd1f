//! Configuration lookup for drivers
//!
//! Drivers read firmware paths and tunables through [`ConfigStore`]. Stores
//! can be chained; the environment store is consulted first when a chain is
//! built with [`ChainedConfig::with_env`]. Keys are case-insensitive.
//!
//! Every store can also hand out paths under a managed directory, used for
//! firmware staleness sidecars.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{Result, TunerError};

/// Environment variable overriding the managed directory
pub const DATA_DIR_ENV: &str = "TUNER_DATA_DIR";

/// Prefix checked before the bare key by [`EnvConfig`]
pub const ENV_PREFIX: &str = "TUNER_";

/// Source of configuration strings
pub trait ConfigStore {
    /// Look up a string value
    fn get_string(&self, key: &str) -> Option<String>;

    /// Directory for files this store manages
    fn storage_dir(&self) -> Option<PathBuf> {
        default_storage_dir()
    }

    /// Path of `name` inside the managed directory, creating the directory
    fn get_file(&self, name: &str) -> Result<PathBuf> {
        let dir = self.storage_dir().ok_or_else(|| {
            TunerError::NotFound("no managed storage directory available".to_string())
        })?;
        std::fs::create_dir_all(&dir)?;
        Ok(dir.join(name))
    }
}

/// Typed lookups available on every store
pub trait ConfigExt: ConfigStore {
    /// Parse a value, falling back to `default` when missing or malformed
    fn get_number<T: FromStr>(&self, key: &str, default: T) -> T {
        match self.get_string(key) {
            Some(raw) => match raw.trim().parse() {
                Ok(value) => value,
                Err(_) => {
                    warn!("config value {}={:?} is not a number; using default", key, raw);
                    default
                }
            },
            None => default,
        }
    }

    /// Look up a required value
    fn require_string(&self, key: &str) -> Result<String> {
        self.get_string(key)
            .ok_or_else(|| TunerError::NotFound(format!("configuration key {key} not set")))
    }
}

impl<C: ConfigStore + ?Sized> ConfigExt for C {}

/// Default managed directory
///
/// `TUNER_DATA_DIR`, then `$XDG_DATA_HOME/tuner`, then the platform data
/// directory, then `~/.tuner`.
pub fn default_storage_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return Some(PathBuf::from(dir));
        }
    }

    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        let path = PathBuf::from(xdg_data);
        if path.is_absolute() {
            return Some(path.join("tuner"));
        }
    }

    dirs::data_dir()
        .map(|d| d.join("tuner"))
        .or_else(|| dirs::home_dir().map(|h| h.join(".tuner")))
}

/// In-memory store, optionally loaded from a JSON object
#[derive(Debug, Clone, Default)]
pub struct MapConfig {
    entries: HashMap<String, String>,
    storage_dir: Option<PathBuf>,
}

impl MapConfig {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a flat JSON object of strings, numbers and booleans
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| TunerError::InvalidArgument(format!("config is not valid JSON: {e}")))?;
        let object = value.as_object().ok_or_else(|| {
            TunerError::InvalidArgument("config must be a JSON object".to_string())
        })?;

        let mut config = Self::new();
        for (key, value) in object {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(TunerError::InvalidArgument(format!(
                        "config key {key} has unsupported value {other}"
                    )))
                }
            };
            config.set(key, text);
        }
        Ok(config)
    }

    /// Load a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        debug!("loaded {} config entries from {}", config.len(), path.display());
        Ok(config)
    }

    /// Insert or replace a value
    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .insert(key.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Use `dir` as the managed directory instead of the default
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ConfigStore for MapConfig {
    fn get_string(&self, key: &str) -> Option<String> {
        self.entries.get(&key.to_ascii_lowercase()).cloned()
    }

    fn storage_dir(&self) -> Option<PathBuf> {
        self.storage_dir.clone().or_else(default_storage_dir)
    }
}

/// Reads `TUNER_<KEY>`, then `<KEY>`, from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfig;

impl ConfigStore for EnvConfig {
    fn get_string(&self, key: &str) -> Option<String> {
        let upper = key.to_ascii_uppercase();
        std::env::var(format!("{ENV_PREFIX}{upper}"))
            .or_else(|_| std::env::var(&upper))
            .ok()
    }
}

/// Ordered chain of stores; the first store with a value wins
#[derive(Default)]
pub struct ChainedConfig {
    stores: Vec<Box<dyn ConfigStore + Send + Sync>>,
    storage_dir: Option<PathBuf>,
}

impl ChainedConfig {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a chain whose first store is the environment
    pub fn with_env() -> Self {
        Self::new().push(EnvConfig)
    }

    /// Append a store; stores are consulted in the order they were pushed
    pub fn push(mut self, store: impl ConfigStore + Send + Sync + 'static) -> Self {
        self.stores.push(Box::new(store));
        self
    }

    /// Use `dir` as the managed directory for the whole chain
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }
}

impl std::fmt::Debug for ChainedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainedConfig")
            .field("stores", &self.stores.len())
            .field("storage_dir", &self.storage_dir)
            .finish()
    }
}

impl ConfigStore for ChainedConfig {
    fn get_string(&self, key: &str) -> Option<String> {
        self.stores.iter().find_map(|store| store.get_string(key))
    }

    fn storage_dir(&self) -> Option<PathBuf> {
        self.storage_dir.clone().or_else(|| {
            self.stores
                .iter()
                .find_map(|store| store.storage_dir())
        })
    }
}

impl<C: ConfigStore + ?Sized> ConfigStore for &C {
    fn get_string(&self, key: &str) -> Option<String> {
        (**self).get_string(key)
    }

    fn storage_dir(&self) -> Option<PathBuf> {
        (**self).storage_dir()
    }

    fn get_file(&self, name: &str) -> Result<PathBuf> {
        (**self).get_file(name)
    }
}
