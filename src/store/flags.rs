use async_trait::async_trait;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use super::{Error, ErrorCode};

/// Raw value of a remote flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FlagValue {
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

/// Capabilities required from a remote configuration service.
#[async_trait]
pub trait FlagSource: Send + Sync {
    /// Fetches the remote values and makes them visible to the lookups.
    ///
    /// If the previous successful fetch happened less than `min_fetch_interval`
    /// ago the remote is not contacted and `false` is returned.
    async fn fetch_and_activate(&self, min_fetch_interval: Duration) -> Result<bool, Error>;

    fn bool_value(&self, key: &str) -> Option<bool>;

    fn string_value(&self, key: &str) -> Option<String>;
}

/// Activated values and fetch throttling shared by the flag sources.
#[derive(Default)]
struct ActiveFlags {
    values: RwLock<HashMap<String, FlagValue>>,
    last_fetch: Mutex<Option<Instant>>,
}

impl ActiveFlags {
    fn is_throttled(&self, min_fetch_interval: Duration) -> bool {
        let last_fetch = self.last_fetch.lock().unwrap_or_else(PoisonError::into_inner);
        last_fetch.is_some_and(|at| at.elapsed() < min_fetch_interval)
    }

    fn activate(&self, values: HashMap<String, FlagValue>) {
        trace!("activating {} flags", values.len());
        *self.values.write().unwrap_or_else(PoisonError::into_inner) = values;
        *self.last_fetch.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    fn get(&self, key: &str) -> Option<FlagValue> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

/// In process flag source, remote values are set with [`MemoryFlagSource::set_remote`].
#[derive(Default)]
pub struct MemoryFlagSource {
    remote: Mutex<HashMap<String, FlagValue>>,
    failure: Mutex<Option<Error>>,
    active: ActiveFlags,
}

impl MemoryFlagSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value on the remote side, it becomes visible after the next fetch.
    pub fn set_remote(&self, key: &str, value: FlagValue) {
        self.remote
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value);
    }

    /// Makes the next fetch fail with `error`.
    pub fn fail_next(&self, error: Error) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }
}

#[async_trait]
impl FlagSource for MemoryFlagSource {
    async fn fetch_and_activate(&self, min_fetch_interval: Duration) -> Result<bool, Error> {
        if let Some(error) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(error);
        }

        if self.active.is_throttled(min_fetch_interval) {
            debug!("flag fetch throttled");
            return Ok(false);
        }

        let values = self
            .remote
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.active.activate(values);
        Ok(true)
    }

    fn bool_value(&self, key: &str) -> Option<bool> {
        self.active.get(key).map(|v| v.as_bool())
    }

    fn string_value(&self, key: &str) -> Option<String> {
        self.active.get(key).map(|v| v.as_string())
    }
}

/// Flag source reading a JSON object (`{"flag": value, ...}`) from a local file.
pub struct FileFlagSource {
    path: PathBuf,
    active: ActiveFlags,
}

impl FileFlagSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            active: ActiveFlags::default(),
        }
    }
}

#[async_trait]
impl FlagSource for FileFlagSource {
    async fn fetch_and_activate(&self, min_fetch_interval: Duration) -> Result<bool, Error> {
        if self.active.is_throttled(min_fetch_interval) {
            debug!("flag fetch throttled");
            return Ok(false);
        }

        let raw = tokio::fs::read(&self.path).await?;
        let values: HashMap<String, FlagValue> = serde_json::from_slice(&raw).map_err(|e| {
            Error::new(
                ErrorCode::InvalidArgument,
                format!("bad flag file `{}`: {e}", self.path.display()),
            )
        })?;

        self.active.activate(values);
        Ok(true)
    }

    fn bool_value(&self, key: &str) -> Option<bool> {
        self.active.get(key).map(|v| v.as_bool())
    }

    fn string_value(&self, key: &str) -> Option<String> {
        self.active.get(key).map(|v| v.as_string())
    }
}
