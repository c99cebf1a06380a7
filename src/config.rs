use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const USERS_FILE: &str = "users.json";
const FILES_FILE: &str = "files.json";
const UPLOAD_DIR: &str = "uploaded_files";

const DEFAULT_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Server configuration, read from `PORTAL_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    /// Directory holding `users.json`, `files.json` and `uploaded_files/`.
    pub data_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let addr = env::var("PORTAL_ADDR")
            .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
            .parse()
            .context("PORTAL_ADDR is not a valid socket address")?;

        let data_dir = env::var("PORTAL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let max_upload_bytes = env::var("PORTAL_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let bcrypt_cost = env::var("PORTAL_BCRYPT_COST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(bcrypt::DEFAULT_COST);

        Ok(Self {
            addr,
            data_dir,
            max_upload_bytes,
            bcrypt_cost,
        })
    }

    /// Configuration rooted at `data_dir` with the cheapest bcrypt cost. Meant for tests.
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            data_dir: data_dir.as_ref().to_path_buf(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            bcrypt_cost: 4,
        }
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join(USERS_FILE)
    }

    pub fn files_path(&self) -> PathBuf {
        self.data_dir.join(FILES_FILE)
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join(UPLOAD_DIR)
    }
}
