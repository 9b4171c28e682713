//! Date-partitioned storage for food and exercise entries.
//!
//! A [`Store`] is an explicit handle: callers construct one from the
//! [`Capabilities`] of the platform they run on and pass it wherever entries
//! are read or written. The concrete [`Backend`] is picked once, on the first
//! [`Store::open`], and every backend honours the same contract.

mod kv;
mod sqlite;

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{
    Entry, EntryKind, ExerciseEntry, FoodEntry, NewExerciseEntry, NewFoodEntry,
};

pub use kv::KvBackend;
pub use sqlite::SqliteBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// File-backed SQLite in the app's data directory.
    NativeSql,
    /// In-process SQLite that lives as long as the store.
    ResidentSql,
    /// JSON arrays in a flat key-value store.
    KeyValue,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::NativeSql => "native-sqlite",
            BackendKind::ResidentSql => "resident-sqlite",
            BackendKind::KeyValue => "key-value",
        })
    }
}

/// The operation contract every storage backend implements.
///
/// `update_*` reports [`StoreError::NotFound`] when no row has the id;
/// `delete` returns `false` instead. Lists are ordered by `time`, then `id`.
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn insert_food(&self, entry: &NewFoodEntry) -> Result<i64, StoreError>;

    async fn insert_exercise(&self, entry: &NewExerciseEntry) -> Result<i64, StoreError>;

    async fn update_food(&self, entry: &FoodEntry) -> Result<(), StoreError>;

    async fn update_exercise(&self, entry: &ExerciseEntry) -> Result<(), StoreError>;

    async fn delete(&self, kind: EntryKind, id: i64) -> Result<bool, StoreError>;

    async fn foods_by_date(&self, date: &str) -> Result<Vec<FoodEntry>, StoreError>;

    async fn exercises_by_date(&self, date: &str) -> Result<Vec<ExerciseEntry>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvLocation {
    /// One file per key inside this directory.
    Dir(PathBuf),
    Memory,
}

/// What the host platform offers for persistence, in probe order.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub native: Option<PathBuf>,
    pub relational: bool,
    pub key_value: Option<KvLocation>,
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Upper bound for any single store operation.
    pub timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

struct Inner {
    capabilities: Capabilities,
    options: StoreOptions,
    backend: OnceCell<Box<dyn Backend>>,
}

impl Store {
    #[must_use]
    pub fn new(capabilities: Capabilities, options: StoreOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                capabilities,
                options,
                backend: OnceCell::new(),
            }),
        }
    }

    /// A store that is already open on `backend`; `open` becomes a no-op.
    #[must_use]
    pub fn with_backend(backend: Box<dyn Backend>, options: StoreOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                capabilities: Capabilities::default(),
                options,
                backend: OnceCell::new_with(Some(backend)),
            }),
        }
    }

    /// Select and initialise the backend. Safe to call repeatedly and
    /// concurrently; only the first call probes.
    pub async fn open(&self) -> Result<BackendKind, StoreError> {
        let backend = self
            .inner
            .backend
            .get_or_try_init(|| probe(&self.inner.capabilities))
            .await?;
        Ok(backend.kind())
    }

    #[must_use]
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.inner.backend.get().map(|b| b.kind())
    }

    fn backend(&self) -> Result<&dyn Backend, StoreError> {
        self.inner
            .backend
            .get()
            .map(|b| &**b)
            .ok_or(StoreError::NotOpen)
    }

    /// Run `op` under the store timeout. SQLite work still queued when the
    /// timeout fires is rolled back; a key-value write is dropped unless its
    /// final rename had already started.
    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let limit = self.inner.options.timeout;
        tokio::time::timeout(limit, op)
            .await
            .map_err(|_| StoreError::Timeout(limit))?
    }

    pub async fn insert_food(&self, entry: &NewFoodEntry) -> Result<i64, StoreError> {
        let backend = self.backend()?;
        let id = self.bounded(backend.insert_food(entry)).await?;
        debug!(id, date = %entry.date, "food entry inserted");
        Ok(id)
    }

    pub async fn insert_exercise(&self, entry: &NewExerciseEntry) -> Result<i64, StoreError> {
        let backend = self.backend()?;
        let id = self.bounded(backend.insert_exercise(entry)).await?;
        debug!(id, date = %entry.date, "exercise entry inserted");
        Ok(id)
    }

    pub async fn update_food(&self, entry: &FoodEntry) -> Result<(), StoreError> {
        let backend = self.backend()?;
        self.bounded(backend.update_food(entry)).await?;
        debug!(id = entry.id, "food entry updated");
        Ok(())
    }

    pub async fn update_exercise(&self, entry: &ExerciseEntry) -> Result<(), StoreError> {
        let backend = self.backend()?;
        self.bounded(backend.update_exercise(entry)).await?;
        debug!(id = entry.id, "exercise entry updated");
        Ok(())
    }

    /// Returns whether a row was removed. A missing id is not an error.
    pub async fn delete(&self, kind: EntryKind, id: i64) -> Result<bool, StoreError> {
        let backend = self.backend()?;
        let removed = self.bounded(backend.delete(kind, id)).await?;
        debug!(%kind, id, removed, "entry deleted");
        Ok(removed)
    }

    pub async fn foods_by_date(&self, date: &str) -> Result<Vec<FoodEntry>, StoreError> {
        let backend = self.backend()?;
        self.bounded(backend.foods_by_date(date)).await
    }

    pub async fn exercises_by_date(&self, date: &str) -> Result<Vec<ExerciseEntry>, StoreError> {
        let backend = self.backend()?;
        self.bounded(backend.exercises_by_date(date)).await
    }

    pub async fn list_by_date(&self, kind: EntryKind, date: &str) -> Result<Vec<Entry>, StoreError> {
        Ok(match kind {
            EntryKind::Food => self
                .foods_by_date(date)
                .await?
                .into_iter()
                .map(Entry::Food)
                .collect(),
            EntryKind::Exercise => self
                .exercises_by_date(date)
                .await?
                .into_iter()
                .map(Entry::Exercise)
                .collect(),
        })
    }
}

async fn probe(capabilities: &Capabilities) -> Result<Box<dyn Backend>, StoreError> {
    if let Some(path) = &capabilities.native {
        match SqliteBackend::open(path.clone()).await {
            Ok(backend) => {
                info!(path = %path.display(), "using native SQLite store");
                return Ok(Box::new(backend));
            }
            Err(error) => warn!(error = %error, "native SQLite store unavailable"),
        }
    }

    if capabilities.relational {
        match SqliteBackend::open_in_memory().await {
            Ok(backend) => {
                info!("using resident SQLite store");
                return Ok(Box::new(backend));
            }
            Err(error) => warn!(error = %error, "resident SQLite store unavailable"),
        }
    }

    if let Some(location) = &capabilities.key_value {
        match KvBackend::open(location.clone()).await {
            Ok(backend) => {
                info!(?location, "using key-value store");
                return Ok(Box::new(backend));
            }
            Err(error) => warn!(error = %error, "key-value store unavailable"),
        }
    }

    Err(StoreError::Unavailable(
        "neither an SQL engine nor a key-value store could be opened".to_string(),
    ))
}
