//! Durable store of accepted few-shot examples.
//!
//! One JSON array in one file. Reads always hit the file so every request
//! sees the latest accepted examples. Writes run behind an async mutex and
//! land via write-to-temp-then-rename, so a reader never observes a
//! half-written artifact and concurrent writers cannot drop each other's
//! entries.

use crate::domain::entities::{normalize_question, Example, RecordOutcome, SkipReason};
use crate::domain::error::{AppError, Result};
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_STORE_PATH: &str = "data/prompt/fewshots.json";

fn persistence_err(msg: impl Into<String>) -> AppError {
    AppError::PersistenceError(msg.into())
}

pub struct ExampleStore {
    path: PathBuf,
    write_gate: Mutex<()>,
}

impl ExampleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_gate: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current durable state. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<Example>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let bytes = fs::read(&self.path).map_err(|e| {
            persistence_err(format!("Failed to read store {}: {e}", self.path.display()))
        })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            persistence_err(format!("Failed to parse store {}: {e}", self.path.display()))
        })
    }

    /// Insert or replace under the normalized-question key.
    ///
    /// The read-modify-write runs under the write gate, so two concurrent
    /// upserts with different questions both survive. An entry whose stored
    /// SQL already matches is left untouched; otherwise last-write-wins.
    /// An unreadable artifact fails the upsert and the file stays as it was.
    pub async fn upsert(&self, question: &str, sql: &str) -> Result<RecordOutcome> {
        let _guard = self.write_gate.lock().await;

        let mut examples = self.load()?;

        let key = normalize_question(question);
        match examples
            .iter_mut()
            .find(|example| normalize_question(&example.question) == key)
        {
            Some(existing) => {
                if existing.sql == sql {
                    info!(question = %key, "Example already stored, skipping write");
                    return Ok(RecordOutcome::Skipped(SkipReason::Duplicate));
                }
                existing.sql = sql.to_string();
                existing.created_at = Some(chrono::Utc::now());
            }
            None => {
                examples.push(Example::new(question.trim().to_string(), sql.to_string()));
            }
        }

        self.persist(&examples)?;
        info!(question = %key, total = examples.len(), "Example stored");
        Ok(RecordOutcome::Accepted)
    }

    fn persist(&self, examples: &[Example]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(examples)
            .map_err(|e| persistence_err(format!("Failed to serialize store: {e}")))?;
        atomic_write_bytes(&self.path, &bytes)
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| persistence_err(format!("Failed to create dir {}: {e}", path.display())))?;
    Ok(())
}

pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }

    let tmp_path = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
    {
        let mut file = fs::File::create(&tmp_path).map_err(|e| {
            persistence_err(format!(
                "Failed to create temp file {}: {e}",
                tmp_path.display()
            ))
        })?;
        file.write_all(bytes).map_err(|e| {
            persistence_err(format!(
                "Failed to write temp file {}: {e}",
                tmp_path.display()
            ))
        })?;
        file.sync_all().ok();
    }

    replace_file(&tmp_path, path)
}

// Rename replaces the destination in one atomic step, so a reader sees
// either the old artifact or the new one, never a missing file.
#[cfg(not(windows))]
fn replace_file(tmp_path: &Path, path: &Path) -> Result<()> {
    fs::rename(tmp_path, path).map_err(|e| {
        persistence_err(format!(
            "Failed to rename temp file {} to {}: {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}

// Rename over an existing file is not atomic on Windows; move the old
// file aside, swap the new one in, then drop the parked copy.
#[cfg(windows)]
fn replace_file(tmp_path: &Path, path: &Path) -> Result<()> {
    if path.exists() {
        let backup = path.with_extension(format!("bak-{}", Uuid::new_v4()));
        fs::rename(path, &backup).map_err(|e| {
            persistence_err(format!(
                "Failed to move existing file {} to {}: {e}",
                path.display(),
                backup.display()
            ))
        })?;

        fs::rename(tmp_path, path).map_err(|e| {
            persistence_err(format!(
                "Failed to rename temp file {} to {}: {e}",
                tmp_path.display(),
                path.display()
            ))
        })?;

        let _ = fs::remove_file(&backup);
        Ok(())
    } else {
        fs::rename(tmp_path, path).map_err(|e| {
            persistence_err(format!(
                "Failed to rename temp file {} to {}: {e}",
                tmp_path.display(),
                path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn create_store_dir() -> PathBuf {
        std::env::temp_dir().join(format!("fewshots-test-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = create_store_dir();
        let store = ExampleStore::new(dir.join("fewshots.json"));

        assert_eq!(store.load().unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn test_upsert_appends_and_round_trips() {
        let dir = create_store_dir();
        let store = ExampleStore::new(dir.join("fewshots.json"));

        store
            .upsert("How many users?", "SELECT COUNT(*) FROM users")
            .await
            .unwrap();
        store
            .upsert("Top city?", "SELECT city FROM sales ORDER BY total DESC LIMIT 1")
            .await
            .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].question, "How many users?");
        assert_eq!(loaded[1].sql, "SELECT city FROM sales ORDER BY total DESC LIMIT 1");

        // Reload through a second handle sees the identical sequence.
        let reloaded = ExampleStore::new(dir.join("fewshots.json")).load().unwrap();
        assert_eq!(reloaded, loaded);

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_same_normalized_question_replaces_sql() {
        let dir = create_store_dir();
        let store = ExampleStore::new(dir.join("fewshots.json"));

        store
            .upsert("count txns", "SELECT COUNT(*) FROM txns")
            .await
            .unwrap();
        let outcome = store
            .upsert("  Count Txns  ", "SELECT COUNT(id) FROM txns")
            .await
            .unwrap();

        assert_eq!(outcome, RecordOutcome::Accepted);
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].sql, "SELECT COUNT(id) FROM txns");

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_identical_pair_is_skipped_as_duplicate() {
        let dir = create_store_dir();
        let store = ExampleStore::new(dir.join("fewshots.json"));

        store
            .upsert("count txns", "SELECT COUNT(*) FROM txns")
            .await
            .unwrap();
        let outcome = store
            .upsert("count txns", "SELECT COUNT(*) FROM txns")
            .await
            .unwrap();

        assert_eq!(outcome, RecordOutcome::Skipped(SkipReason::Duplicate));
        assert_eq!(store.load().unwrap().len(), 1);

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_concurrent_different_questions_both_survive() {
        let dir = create_store_dir();
        let store = Arc::new(ExampleStore::new(dir.join("fewshots.json")));

        let first = {
            let store = store.clone();
            tokio::spawn(async move { store.upsert("q one", "SELECT 1").await })
        };
        let second = {
            let store = store.clone();
            tokio::spawn(async move { store.upsert("q two", "SELECT 2").await })
        };

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_corrupt_store_fails_upsert_and_keeps_file() {
        let dir = create_store_dir();
        let path = dir.join("fewshots.json");
        fs::create_dir_all(&dir).unwrap();
        // Two stored entries followed by trailing garbage: unreadable, but
        // the bytes must survive a failed upsert untouched.
        let original: &[u8] =
            br#"[{"question":"q one","sql":"SELECT 1"},{"question":"q two","sql":"SELECT 2"}] oops"#;
        fs::write(&path, original).unwrap();

        let store = ExampleStore::new(path.clone());
        assert!(matches!(store.load(), Err(AppError::PersistenceError(_))));

        let result = store.upsert("q three", "SELECT 3").await;

        assert!(matches!(result, Err(AppError::PersistenceError(_))));
        assert_eq!(fs::read(&path).unwrap(), original);

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reader_never_sees_missing_store_during_overwrites() {
        let dir = create_store_dir();
        let store = Arc::new(ExampleStore::new(dir.join("fewshots.json")));
        store.upsert("seed", "SELECT 0").await.unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..20 {
                    store
                        .upsert(&format!("q {i}"), &format!("SELECT {i}"))
                        .await
                        .unwrap();
                }
            })
        };

        // The seed entry is on disk, so every load during the rewrites
        // must find a non-empty store.
        for _ in 0..50 {
            let loaded = store.load().unwrap();
            assert!(!loaded.is_empty());
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_writes_leave_no_temp_files() {
        let dir = create_store_dir();
        let store = ExampleStore::new(dir.join("fewshots.json"));

        store.upsert("q one", "SELECT 1").await.unwrap();
        store.upsert("q two", "SELECT 2").await.unwrap();

        let names: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["fewshots.json".to_string()]);

        let _ = fs::remove_dir_all(dir);
    }
}
