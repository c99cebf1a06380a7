//! Internal file-sharing portal.
//!
//! Users register or log in, then upload files and download them again. Credentials
//! and file metadata live in two whole-document JSON files under the configured data
//! directory; uploaded blobs live next to them in `uploaded_files/`.

pub mod blob_store;
pub mod config;
pub mod error;
pub mod json_file;
pub mod models;
pub mod routes;
pub mod session;
pub mod storage;
pub mod user_models;
pub mod user_storage;

use std::sync::Arc;

use anyhow::Result;
use blob_store::BlobStore;
use config::Config;
use session::SessionStore;
use storage::FileRegistry;
use user_storage::CredentialStore;

pub struct AppState {
    pub users: CredentialStore,
    pub files: FileRegistry,
    pub blobs: BlobStore,
    pub sessions: SessionStore,
}

impl AppState {
    /// Opens every store under `config.data_dir`, creating the upload directory
    /// if it does not exist yet.
    pub async fn open(config: &Config) -> Result<Arc<Self>> {
        let users = CredentialStore::open(config.users_path(), config.bcrypt_cost)?;
        let files = FileRegistry::open(config.files_path())?;
        let blobs = BlobStore::open(config.upload_dir()).await?;

        Ok(Arc::new(Self {
            users,
            files,
            blobs,
            sessions: SessionStore::new(),
        }))
    }
}
