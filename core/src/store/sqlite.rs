use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{Connection, params};

use super::{Backend, BackendKind};
use crate::error::StoreError;
use crate::models::{
    EntryKind, ExerciseEntry, FoodEntry, NewExerciseEntry, NewFoodEntry,
};

pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    kind: BackendKind,
}

impl SqliteBackend {
    pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
        let conn = tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!(
                        "Failed to create database directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
            let conn = Connection::open(&path).map_err(|e| {
                StoreError::Unavailable(format!(
                    "Failed to open database {}: {e}",
                    path.display()
                ))
            })?;
            migrate(&conn).map_err(|e| {
                StoreError::Unavailable(format!(
                    "Failed to initialise database {}: {e}",
                    path.display()
                ))
            })?;
            Ok::<_, StoreError>(conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))??;

        Ok(Self::from_connection(conn, BackendKind::NativeSql))
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        migrate(&conn).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self::from_connection(conn, BackendKind::ResidentSql))
    }

    fn from_connection(conn: Connection, kind: BackendKind) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            kind,
        }
    }

    /// Run `f` inside a transaction on the blocking pool. Failures of the
    /// pool or a poisoned lock surface through `fail`.
    ///
    /// If the caller stops waiting (a store timeout drops this future), the
    /// transaction is rolled back instead of committed.
    async fn with_conn<T, F>(&self, fail: fn(String) -> StoreError, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let abandoned = Arc::new(AtomicBool::new(false));
        let _guard = AbandonOnDrop(Arc::clone(&abandoned));

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| fail("database connection lock poisoned".to_string()))?;
            if abandoned.load(Ordering::Acquire) {
                return Err(fail(ABANDONED.to_string()));
            }
            let tx = conn.unchecked_transaction().map_err(|e| fail(e.to_string()))?;
            let out = f(&tx)?;
            if abandoned.load(Ordering::Acquire) {
                // Dropping `tx` rolls back.
                return Err(fail(ABANDONED.to_string()));
            }
            tx.commit().map_err(|e| fail(e.to_string()))?;
            Ok(out)
        })
        .await
        .map_err(|e| fail(e.to_string()))?
    }
}

const ABANDONED: &str = "operation abandoned after the caller timed out";

/// Flags the blocking half of an operation once its caller has gone away.
struct AbandonOnDrop(Arc<AtomicBool>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS foods (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mealType TEXT,
                name TEXT,
                time TEXT,
                note TEXT,
                image TEXT,
                date TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_foods_date ON foods(date);

            PRAGMA user_version = 1;",
        )?;
    }

    if version < 2 {
        // Exercise log
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS exercises (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                exerciseType TEXT,
                name TEXT,
                duration TEXT,
                calories TEXT,
                time TEXT,
                note TEXT,
                image TEXT,
                date TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_exercises_date ON exercises(date);

            PRAGMA user_version = 2;",
        )?;
    }

    Ok(())
}

// --- Row mapping helpers ---

fn parse_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// Expects columns:
// 0: id, 1: mealType, 2: name, 3: time, 4: note, 5: image, 6: date
fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodEntry> {
    Ok(FoodEntry {
        id: row.get(0)?,
        meal_type: parse_column(row, 1)?,
        name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        time: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        note: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        image: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        date: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
    })
}

// Expects columns:
// 0: id, 1: exerciseType, 2: name, 3: duration, 4: calories, 5: time,
// 6: note, 7: image, 8: date
fn exercise_from_row(row: &rusqlite::Row) -> rusqlite::Result<ExerciseEntry> {
    Ok(ExerciseEntry {
        id: row.get(0)?,
        exercise_type: parse_column(row, 1)?,
        name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        duration: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        calories: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        time: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        note: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        image: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        date: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
    })
}

#[async_trait]
impl Backend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    // --- Foods ---

    async fn insert_food(&self, entry: &NewFoodEntry) -> Result<i64, StoreError> {
        let entry = entry.clone();
        self.with_conn(StoreError::Write, move |conn| {
            conn.execute(
                "INSERT INTO foods (mealType, name, time, note, image, date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.meal_type.as_str(),
                    entry.name,
                    entry.time,
                    entry.note,
                    entry.image,
                    entry.date,
                ],
            )
            .map_err(StoreError::write)?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn update_food(&self, entry: &FoodEntry) -> Result<(), StoreError> {
        let entry = entry.clone();
        self.with_conn(StoreError::Write, move |conn| {
            let rows = conn
                .execute(
                    "UPDATE foods SET mealType = ?1, name = ?2, time = ?3, note = ?4, image = ?5, date = ?6
                     WHERE id = ?7",
                    params![
                        entry.meal_type.as_str(),
                        entry.name,
                        entry.time,
                        entry.note,
                        entry.image,
                        entry.date,
                        entry.id,
                    ],
                )
                .map_err(StoreError::write)?;
            if rows == 0 {
                return Err(StoreError::NotFound {
                    kind: EntryKind::Food,
                    id: entry.id,
                });
            }
            Ok(())
        })
        .await
    }

    async fn foods_by_date(&self, date: &str) -> Result<Vec<FoodEntry>, StoreError> {
        let date = date.to_string();
        self.with_conn(StoreError::Read, move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, mealType, name, time, note, image, date
                     FROM foods
                     WHERE date = ?1
                     ORDER BY time ASC, id ASC",
                )
                .map_err(StoreError::read)?;
            let foods = stmt
                .query_map(params![date], food_from_row)
                .map_err(StoreError::read)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(StoreError::read)?;
            Ok(foods)
        })
        .await
    }

    // --- Exercises ---

    async fn insert_exercise(&self, entry: &NewExerciseEntry) -> Result<i64, StoreError> {
        let entry = entry.clone();
        self.with_conn(StoreError::Write, move |conn| {
            conn.execute(
                "INSERT INTO exercises (exerciseType, name, duration, calories, time, note, image, date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.exercise_type.as_str(),
                    entry.name,
                    entry.duration,
                    entry.calories,
                    entry.time,
                    entry.note,
                    entry.image,
                    entry.date,
                ],
            )
            .map_err(StoreError::write)?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn update_exercise(&self, entry: &ExerciseEntry) -> Result<(), StoreError> {
        let entry = entry.clone();
        self.with_conn(StoreError::Write, move |conn| {
            let rows = conn
                .execute(
                    "UPDATE exercises SET exerciseType = ?1, name = ?2, duration = ?3, calories = ?4,
                            time = ?5, note = ?6, image = ?7, date = ?8
                     WHERE id = ?9",
                    params![
                        entry.exercise_type.as_str(),
                        entry.name,
                        entry.duration,
                        entry.calories,
                        entry.time,
                        entry.note,
                        entry.image,
                        entry.date,
                        entry.id,
                    ],
                )
                .map_err(StoreError::write)?;
            if rows == 0 {
                return Err(StoreError::NotFound {
                    kind: EntryKind::Exercise,
                    id: entry.id,
                });
            }
            Ok(())
        })
        .await
    }

    async fn exercises_by_date(&self, date: &str) -> Result<Vec<ExerciseEntry>, StoreError> {
        let date = date.to_string();
        self.with_conn(StoreError::Read, move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, exerciseType, name, duration, calories, time, note, image, date
                     FROM exercises
                     WHERE date = ?1
                     ORDER BY time ASC, id ASC",
                )
                .map_err(StoreError::read)?;
            let exercises = stmt
                .query_map(params![date], exercise_from_row)
                .map_err(StoreError::read)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(StoreError::read)?;
            Ok(exercises)
        })
        .await
    }

    async fn delete(&self, kind: EntryKind, id: i64) -> Result<bool, StoreError> {
        self.with_conn(StoreError::Write, move |conn| {
            let rows = conn
                .execute(
                    &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
                    params![id],
                )
                .map_err(StoreError::write)?;
            Ok(rows > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MealType;
    use crate::store::{Store, StoreOptions};
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample_food() -> NewFoodEntry {
        NewFoodEntry {
            meal_type: MealType::Lunch,
            name: "Noodle soup".to_string(),
            time: "12:30".to_string(),
            note: String::new(),
            image: String::new(),
            date: "2024-06-15".to_string(),
        }
    }

    #[tokio::test]
    async fn test_reopen_keeps_existing_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("foodlog.db");

        let db = SqliteBackend::open(path.clone()).await.unwrap();
        assert_eq!(db.kind(), BackendKind::NativeSql);
        let id = db.insert_food(&sample_food()).await.unwrap();
        drop(db);

        // Table creation on open is create-if-absent.
        let db = SqliteBackend::open(path).await.unwrap();
        let foods = db.foods_by_date("2024-06-15").await.unwrap();
        assert_eq!(foods.len(), 1);
        assert_eq!(foods[0].id, id);
        assert_eq!(foods[0].name, "Noodle soup");
    }

    #[tokio::test]
    async fn test_migrate_sets_user_version() {
        let db = SqliteBackend::open_in_memory().await.unwrap();
        assert_eq!(db.kind(), BackendKind::ResidentSql);
        let version = db
            .with_conn(StoreError::Read, |conn| {
                conn.pragma_query_value(None, "user_version", |row| row.get::<_, i64>(0))
                    .map_err(StoreError::read)
            })
            .await
            .unwrap();
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn test_upgrade_from_food_only_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foodlog.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE foods (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    mealType TEXT, name TEXT, time TEXT, note TEXT, image TEXT, date TEXT
                );
                INSERT INTO foods (mealType, name, time, note, image, date)
                VALUES ('snack', 'Apple', '15:00', NULL, NULL, '2024-01-01');
                PRAGMA user_version = 1;",
            )
            .unwrap();
        }

        let db = SqliteBackend::open(path).await.unwrap();
        let foods = db.foods_by_date("2024-01-01").await.unwrap();
        assert_eq!(foods.len(), 1);
        // NULL note/image read back as empty strings.
        assert_eq!(foods[0].note, "");
        assert_eq!(foods[0].image, "");
        assert!(db.exercises_by_date("2024-01-01").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_meal_type_is_read_error() {
        let db = SqliteBackend::open_in_memory().await.unwrap();
        db.with_conn(StoreError::Write, |conn| {
            conn.execute(
                "INSERT INTO foods (mealType, name, time, note, image, date)
                 VALUES ('brunch', 'Eggs', '11:00', '', '', '2024-01-01')",
                [],
            )
            .map_err(StoreError::write)?;
            Ok(())
        })
        .await
        .unwrap();
        assert!(matches!(
            db.foods_by_date("2024-01-01").await,
            Err(StoreError::Read(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timed_out_insert_is_rolled_back() {
        let db = SqliteBackend::open_in_memory().await.unwrap();
        let conn = Arc::clone(&db.conn);
        let store = Store::with_backend(
            Box::new(db),
            StoreOptions {
                timeout: Duration::from_millis(50),
            },
        );

        // Hold the connection so the insert is still queued when the caller gives up.
        let (locked_tx, locked_rx) = mpsc::channel();
        let holder = std::thread::spawn(move || {
            let _lock = conn.lock().unwrap();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(300));
        });
        locked_rx.recv().unwrap();

        let result = store.insert_food(&sample_food()).await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));

        tokio::task::spawn_blocking(move || holder.join().unwrap())
            .await
            .unwrap();
        // Give the queued blocking task time to run and roll back.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store.foods_by_date("2024-06-15").await.unwrap().is_empty());
    }
}
