use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use super::{Backend, BackendKind, KvLocation};
use crate::error::StoreError;
use crate::models::{
    EntryKind, ExerciseEntry, FoodEntry, NewExerciseEntry, NewFoodEntry,
};

/// Flat key-value storage: each table is one JSON array under its own key,
/// and every operation reads and rewrites the whole array.
pub struct KvBackend {
    medium: Mutex<Medium>,
}

enum Medium {
    Dir(PathBuf),
    Memory(HashMap<String, String>),
}

impl Medium {
    async fn get(&self, key: &str) -> std::io::Result<Option<String>> {
        match self {
            Medium::Dir(dir) => match tokio::fs::read_to_string(dir.join(format!("{key}.json"))).await {
                Ok(raw) => Ok(Some(raw)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e),
            },
            Medium::Memory(map) => Ok(map.get(key).cloned()),
        }
    }

    async fn set(&mut self, key: &str, value: String) -> std::io::Result<()> {
        match self {
            Medium::Dir(dir) => {
                // Write then rename so a crash never leaves half an array behind.
                let tmp = dir.join(format!("{key}.json.tmp"));
                tokio::fs::write(&tmp, value).await?;
                tokio::fs::rename(&tmp, dir.join(format!("{key}.json"))).await
            }
            Medium::Memory(map) => {
                map.insert(key.to_string(), value);
                Ok(())
            }
        }
    }
}

/// Access to the fields the key-value backend filters and sorts on.
trait Record: Serialize + DeserializeOwned + Clone + Send {
    const KIND: EntryKind;

    fn id(&self) -> i64;
    fn date(&self) -> &str;
    fn time(&self) -> &str;
}

impl Record for FoodEntry {
    const KIND: EntryKind = EntryKind::Food;

    fn id(&self) -> i64 {
        self.id
    }

    fn date(&self) -> &str {
        &self.date
    }

    fn time(&self) -> &str {
        &self.time
    }
}

impl Record for ExerciseEntry {
    const KIND: EntryKind = EntryKind::Exercise;

    fn id(&self) -> i64 {
        self.id
    }

    fn date(&self) -> &str {
        &self.date
    }

    fn time(&self) -> &str {
        &self.time
    }
}

fn sequence_key(kind: EntryKind) -> String {
    format!("{}_seq", kind.table())
}

impl KvBackend {
    pub async fn open(location: KvLocation) -> Result<Self, StoreError> {
        let mut medium = match location {
            KvLocation::Dir(dir) => {
                tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                    StoreError::Unavailable(format!(
                        "Failed to create key-value directory {}: {e}",
                        dir.display()
                    ))
                })?;
                Medium::Dir(dir)
            }
            KvLocation::Memory => Medium::Memory(HashMap::new()),
        };

        for kind in [EntryKind::Food, EntryKind::Exercise] {
            let existing = medium
                .get(kind.table())
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            if existing.is_none() {
                medium
                    .set(kind.table(), "[]".to_string())
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            }
        }

        Ok(Self {
            medium: Mutex::new(medium),
        })
    }

    async fn load<T: Record>(
        medium: &Medium,
        fail: fn(String) -> StoreError,
    ) -> Result<Vec<T>, StoreError> {
        let raw = medium
            .get(T::KIND.table())
            .await
            .map_err(|e| fail(e.to_string()))?;
        match raw {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                fail(format!("corrupt '{}' array: {e}", T::KIND.table()))
            }),
        }
    }

    async fn save<T: Record>(medium: &mut Medium, records: &[T]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(records).map_err(StoreError::write)?;
        medium
            .set(T::KIND.table(), raw)
            .await
            .map_err(StoreError::write)
    }

    /// Ids come from a per-table counter so a deleted id is never handed out again.
    async fn next_id<T: Record>(medium: &mut Medium, records: &[T]) -> Result<i64, StoreError> {
        let key = sequence_key(T::KIND);
        let stored = medium
            .get(&key)
            .await
            .map_err(StoreError::write)?
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(0);
        let highest = records.iter().map(Record::id).max().unwrap_or(0);
        let id = stored.max(highest) + 1;
        medium
            .set(&key, id.to_string())
            .await
            .map_err(StoreError::write)?;
        Ok(id)
    }

    async fn insert<T: Record>(&self, make: impl FnOnce(i64) -> T + Send) -> Result<i64, StoreError> {
        let mut medium = self.medium.lock().await;
        let mut records: Vec<T> = Self::load(&medium, StoreError::Write).await?;
        let id = Self::next_id(&mut medium, &records).await?;
        records.push(make(id));
        Self::save(&mut medium, &records).await?;
        Ok(id)
    }

    async fn update<T: Record>(&self, entry: &T) -> Result<(), StoreError> {
        let mut medium = self.medium.lock().await;
        let mut records: Vec<T> = Self::load(&medium, StoreError::Write).await?;
        let slot = records
            .iter_mut()
            .find(|r| r.id() == entry.id())
            .ok_or(StoreError::NotFound {
                kind: T::KIND,
                id: entry.id(),
            })?;
        *slot = entry.clone();
        Self::save(&mut medium, &records).await
    }

    async fn remove<T: Record>(&self, id: i64) -> Result<bool, StoreError> {
        let mut medium = self.medium.lock().await;
        let mut records: Vec<T> = Self::load(&medium, StoreError::Write).await?;
        let before = records.len();
        records.retain(|r| r.id() != id);
        if records.len() == before {
            return Ok(false);
        }
        Self::save(&mut medium, &records).await?;
        Ok(true)
    }

    async fn list<T: Record>(&self, date: &str) -> Result<Vec<T>, StoreError> {
        let medium = self.medium.lock().await;
        let mut records: Vec<T> = Self::load(&medium, StoreError::Read).await?;
        records.retain(|r| r.date() == date);
        records.sort_by(|a, b| a.time().cmp(b.time()).then(a.id().cmp(&b.id())));
        Ok(records)
    }
}

#[async_trait]
impl Backend for KvBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::KeyValue
    }

    async fn insert_food(&self, entry: &NewFoodEntry) -> Result<i64, StoreError> {
        let entry = entry.clone();
        self.insert(move |id| entry.with_id(id)).await
    }

    async fn insert_exercise(&self, entry: &NewExerciseEntry) -> Result<i64, StoreError> {
        let entry = entry.clone();
        self.insert(move |id| entry.with_id(id)).await
    }

    async fn update_food(&self, entry: &FoodEntry) -> Result<(), StoreError> {
        self.update(entry).await
    }

    async fn update_exercise(&self, entry: &ExerciseEntry) -> Result<(), StoreError> {
        self.update(entry).await
    }

    async fn delete(&self, kind: EntryKind, id: i64) -> Result<bool, StoreError> {
        match kind {
            EntryKind::Food => self.remove::<FoodEntry>(id).await,
            EntryKind::Exercise => self.remove::<ExerciseEntry>(id).await,
        }
    }

    async fn foods_by_date(&self, date: &str) -> Result<Vec<FoodEntry>, StoreError> {
        self.list(date).await
    }

    async fn exercises_by_date(&self, date: &str) -> Result<Vec<ExerciseEntry>, StoreError> {
        self.list(date).await
    }
}
