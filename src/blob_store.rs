use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::fs;
use uuid::Uuid;

use crate::error::{PortalError, PortalResult};
use crate::user_models::FileRecord;

/// Upload directory. Blobs are keyed by a random UUID; the original filename lives
/// only in the registry, so two uploads of the same name never collide.
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create upload directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub async fn put(&self, bytes: &[u8]) -> Result<Uuid> {
        let key = Uuid::new_v4();
        let path = self.path_for(key);
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(key)
    }

    pub async fn read(&self, record: &FileRecord) -> PortalResult<Vec<u8>> {
        let path = self.path_for(record.storage_key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(PortalError::BlobMissing(record.name.clone()))
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to read {}", path.display()))
                .into()),
        }
    }

    fn path_for(&self, key: Uuid) -> PathBuf {
        self.dir.join(key.to_string())
    }
}
