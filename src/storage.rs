use crate::error::{PortalError, PortalResult};
use crate::json_file;
use crate::user_models::FileRecord;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Ordered list of file records, persisted whole to `files.json` on every change.
/// Insertion order is display order.
pub struct FileRegistry {
    path: PathBuf,
    records: RwLock<Vec<FileRecord>>,
}

impl FileRegistry {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = Self::load(&path)?;

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn load(path: &Path) -> Result<Vec<FileRecord>> {
        json_file::load_or_default(path)
    }

    pub fn save(&self, records: &[FileRecord]) -> Result<()> {
        json_file::save_atomic(&self.path, records).context("Failed to save file registry")
    }

    pub async fn record_upload(
        &self,
        name: String,
        uploader: &str,
        storage_key: Uuid,
        size: u64,
    ) -> Result<FileRecord> {
        let mut records = self.records.write().await;
        let record = FileRecord::new(name, uploader.to_string(), storage_key, size);

        records.push(record.clone());
        if let Err(e) = self.save(&records) {
            records.pop();
            return Err(e);
        }

        Ok(record)
    }

    pub async fn list_for(&self, username: &str) -> Vec<FileRecord> {
        let records = self.records.read().await;
        records
            .iter()
            .filter(|r| r.uploaded_by == username)
            .cloned()
            .collect()
    }

    pub async fn find_for(&self, id: Uuid, username: &str) -> Option<FileRecord> {
        let records = self.records.read().await;
        records
            .iter()
            .find(|r| r.id == id && r.uploaded_by == username)
            .cloned()
    }

    /// Overwrites the record's downloader fields; earlier downloads are not kept.
    pub async fn record_download(&self, id: Uuid, downloader: &str) -> PortalResult<FileRecord> {
        let mut records = self.records.write().await;

        let index = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| PortalError::FileNotFound(id.to_string()))?;

        let previous = records[index].clone();
        records[index].stamp_download(downloader);

        if let Err(e) = self.save(&records) {
            records[index] = previous;
            return Err(e.into());
        }

        Ok(records[index].clone())
    }
}
