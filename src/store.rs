use crate::dialog::CallMeta;
use crate::error::AppError;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// One completed intake, immutable once written.  Field names match the JSON
/// shape in the store file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedRecord {
    pub id: String,
    pub name: String,
    pub job: String,
    pub phone: String,
    pub call_sid: String,
    pub account_sid: String,
    pub timestamp: String,
    pub call_status: String,
    pub from_city: String,
    pub from_state: String,
    pub from_country: String,
}

impl CompletedRecord {
    /// Build a record from resolved answers plus pass-through call metadata.
    /// The id is the creation instant in Unix milliseconds; collisions within
    /// the same millisecond are an accepted limitation.
    pub fn new(name: String, job: String, meta: &CallMeta) -> Self {
        let now = OffsetDateTime::now_utc();
        let millis = now.unix_timestamp_nanos() / 1_000_000;
        let timestamp = now
            .format(&Rfc3339)
            .unwrap_or_else(|_| millis.to_string());
        Self {
            id: millis.to_string(),
            name,
            job,
            phone: meta.from.clone(),
            call_sid: meta.call_sid.clone(),
            account_sid: meta.account_sid.clone(),
            timestamp,
            call_status: meta.call_status.clone(),
            from_city: meta.from_city.clone(),
            from_state: meta.from_state.clone(),
            from_country: meta.from_country.clone(),
        }
    }
}

/// Append-only store backed by a single JSON array on disk.
///
/// Appends are read-whole / push / write-whole, so they are serialized behind
/// a mutex; the rewrite is not an atomic append and concurrent writers from
/// separate processes could still lose updates.
pub struct UserStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl UserStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("users.json"),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn append(&self, record: CompletedRecord) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all().await?;
        records.push(record);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                error!(error=%e, "failed to create data directory");
                AppError("failed to create data directory")
            })?;
        }
        let json = serde_json::to_vec_pretty(&records).map_err(|e| {
            error!(error=%e, "failed to serialize user records");
            AppError("failed to serialize user records")
        })?;
        fs::write(&self.path, json).await.map_err(|e| {
            error!(error=%e, path=?self.path, "failed to write user store");
            AppError("failed to write user store")
        })?;
        debug!(path=?self.path, count = records.len(), "user store updated");
        Ok(())
    }

    pub async fn all(&self) -> Result<Vec<CompletedRecord>, AppError> {
        self.read_all().await
    }

    pub async fn get(&self, id: &str) -> Result<Option<CompletedRecord>, AppError> {
        let records = self.read_all().await?;
        Ok(records.into_iter().find(|r| r.id == id))
    }

    /// Drop every stored record.  Returns how many were removed.
    pub async fn clear(&self) -> Result<usize, AppError> {
        let _guard = self.write_lock.lock().await;
        let count = self.read_all().await?.len();
        let empty: Vec<CompletedRecord> = vec![];
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                error!(error=%e, "failed to create data directory");
                AppError("failed to create data directory")
            })?;
        }
        let json = serde_json::to_vec_pretty(&empty).map_err(|e| {
            error!(error=%e, "failed to serialize empty user store");
            AppError("failed to serialize empty user store")
        })?;
        fs::write(&self.path, json).await.map_err(|e| {
            error!(error=%e, path=?self.path, "failed to clear user store");
            AppError("failed to clear user store")
        })?;
        Ok(count)
    }

    // Missing file means no records yet; corrupt JSON is an error rather than
    // a reason to clobber whatever is on disk.
    async fn read_all(&self) -> Result<Vec<CompletedRecord>, AppError> {
        match fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                error!(error=%e, path=?self.path, "user store holds invalid JSON");
                AppError("user store holds invalid JSON")
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(vec![]),
            Err(e) => {
                error!(error=%e, path=?self.path, "failed to read user store");
                Err(AppError("failed to read user store"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_meta() -> CallMeta {
        CallMeta {
            from: "+15550100".to_string(),
            call_sid: "CA123".to_string(),
            account_sid: "AC456".to_string(),
            call_status: "in-progress".to_string(),
            from_city: "Austin".to_string(),
            from_state: "TX".to_string(),
            from_country: "US".to_string(),
        }
    }

    #[tokio::test]
    async fn append_creates_file_and_accumulates() {
        let dir = TempDir::new().unwrap();
        let store = UserStore::new(dir.path());

        let first = CompletedRecord::new("Alice".to_string(), "Engineer".to_string(), &sample_meta());
        store.append(first.clone()).await.expect("first append");
        let mut second =
            CompletedRecord::new("Bob".to_string(), "Baker".to_string(), &sample_meta());
        second.id = format!("{}-b", second.id);
        store.append(second.clone()).await.expect("second append");

        let records = store.all().await.expect("read back");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Alice");
        assert_eq!(records[1].job, "Baker");
    }

    #[tokio::test]
    async fn get_finds_by_id_and_misses_cleanly() {
        let dir = TempDir::new().unwrap();
        let store = UserStore::new(dir.path());
        let record =
            CompletedRecord::new("Alice".to_string(), "Engineer".to_string(), &sample_meta());
        let id = record.id.clone();
        store.append(record).await.unwrap();

        assert_eq!(store.get(&id).await.unwrap().map(|r| r.name), Some("Alice".to_string()));
        assert_eq!(store.get("no-such-id").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_reports_count_and_empties() {
        let dir = TempDir::new().unwrap();
        let store = UserStore::new(dir.path());
        let record =
            CompletedRecord::new("Alice".to_string(), "Engineer".to_string(), &sample_meta());
        store.append(record).await.unwrap();

        assert_eq!(store.clear().await.unwrap(), 1);
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = UserStore::new(dir.path());
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_surfaces_an_error_without_clobbering() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, b"not json").unwrap();
        let store = UserStore::new(dir.path());

        let record =
            CompletedRecord::new("Alice".to_string(), "Engineer".to_string(), &sample_meta());
        assert!(store.append(record).await.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"not json");
    }

    #[test]
    fn record_serializes_camel_case() {
        let record =
            CompletedRecord::new("Alice".to_string(), "Engineer".to_string(), &sample_meta());
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"callSid\":\"CA123\""));
        assert!(json.contains("\"fromCity\":\"Austin\""));
        assert!(json.contains("\"callStatus\":\"in-progress\""));
    }
}
