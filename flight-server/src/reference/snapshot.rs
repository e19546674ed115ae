//! Reference tables persisted as JSON files.

use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::client::{AirlineDto, AirportDto};
use super::error::ReferenceError;

/// Snapshots older than this are ignored on load.
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Raw airport and airline records, as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTables {
    #[serde(default)]
    pub airports: Vec<AirportDto>,
    #[serde(default)]
    pub airlines: Vec<AirlineDto>,
}

impl ReferenceTables {
    /// Read an undated `{airports, airlines}` file.
    pub fn read(path: &Path) -> Result<Self, ReferenceError> {
        read_json(path)
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub path: PathBuf,
    pub max_age: Duration,
}

impl SnapshotConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_age: DEFAULT_MAX_AGE,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self::new("reference_snapshot.json")
    }
}

/// On-disk envelope: the payload plus when it was written.
#[derive(Serialize, Deserialize)]
struct Dated<T> {
    written_at: DateTime<Utc>,
    body: T,
}

/// A dated JSON file holding one `T`, readable until it is `max_age` old.
#[derive(Debug)]
pub struct SnapshotFile<T> {
    config: SnapshotConfig,
    _body: PhantomData<fn() -> T>,
}

impl<T> Clone for SnapshotFile<T> {
    fn clone(&self) -> Self {
        Self::new(self.config.clone())
    }
}

/// Reference tables kept across restarts.
pub type ReferenceSnapshot = SnapshotFile<ReferenceTables>;

impl<T> SnapshotFile<T> {
    pub fn new(config: SnapshotConfig) -> Self {
        Self {
            config,
            _body: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }
}

impl<T: Serialize + DeserializeOwned> SnapshotFile<T> {
    /// The stored payload, if the file exists, decodes and is young enough.
    pub fn load(&self) -> Option<T> {
        self.load_at(Utc::now())
    }

    fn load_at(&self, now: DateTime<Utc>) -> Option<T> {
        let dated: Dated<T> = match read_json(&self.config.path) {
            Ok(dated) => dated,
            Err(e) => {
                debug!(error = %e, "no usable snapshot");
                return None;
            }
        };

        let age = (now - dated.written_at).to_std().unwrap_or(Duration::ZERO);
        (age < self.config.max_age).then_some(dated.body)
    }

    /// Replace the file with `body`, stamped now.
    pub fn save(&self, body: &T) -> Result<(), ReferenceError> {
        let path = &self.config.path;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        }

        let dated = Dated {
            written_at: Utc::now(),
            body,
        };
        let bytes = serde_json::to_vec_pretty(&dated).map_err(|e| format_error(path, e))?;
        fs::write(path, bytes).map_err(|e| io_error(path, e))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ReferenceError> {
    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| format_error(path, e))
}

fn io_error(path: &Path, source: io::Error) -> ReferenceError {
    ReferenceError::SnapshotIo {
        path: path.to_path_buf(),
        source,
    }
}

fn format_error(path: &Path, source: serde_json::Error) -> ReferenceError {
    ReferenceError::SnapshotFormat {
        path: path.to_path_buf(),
        source,
    }
}
