use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Credential entry stored under its username in `users.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(password_hash: String) -> Self {
        Self {
            password_hash,
            created_at: Utc::now(),
        }
    }
}

/// Metadata for one uploaded blob and its most recent download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    /// Original filename, kept for display only.
    pub name: String,
    /// Name of the blob inside the upload directory.
    pub storage_key: Uuid,
    pub size: u64,
    pub upload_date: DateTime<Utc>,
    pub uploaded_by: String,
    pub downloaded_by: Option<String>,
    pub download_date: Option<DateTime<Utc>>,
}

impl FileRecord {
    pub fn new(name: String, uploaded_by: String, storage_key: Uuid, size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            storage_key,
            size,
            upload_date: Utc::now(),
            uploaded_by,
            downloaded_by: None,
            download_date: None,
        }
    }

    pub fn stamp_download(&mut self, downloader: &str) {
        self.downloaded_by = Some(downloader.to_string());
        self.download_date = Some(Utc::now());
    }
}
