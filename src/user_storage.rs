use crate::error::{PortalError, PortalResult};
use crate::json_file;
use crate::user_models::User;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

pub type Users = BTreeMap<String, User>;

/// bcrypt only reads this many bytes of a password.
const MAX_PASSWORD_BYTES: usize = 72;

/// Username → credential map, persisted whole to `users.json` on every change.
pub struct CredentialStore {
    path: PathBuf,
    bcrypt_cost: u32,
    users: RwLock<Users>,
}

impl CredentialStore {
    pub fn open(path: impl Into<PathBuf>, bcrypt_cost: u32) -> Result<Self> {
        let path = path.into();
        let users = Self::load(&path)?;

        Ok(Self {
            path,
            bcrypt_cost,
            users: RwLock::new(users),
        })
    }

    /// Reads every user from disk. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Users> {
        json_file::load_or_default(path)
    }

    pub fn save(&self, users: &Users) -> Result<()> {
        json_file::save_atomic(&self.path, users).context("Failed to save users")
    }

    pub async fn register(&self, username: &str, password: &str) -> PortalResult<()> {
        if username.is_empty() {
            return Err(PortalError::InvalidInput("Username cannot be empty".into()));
        }
        if password.is_empty() {
            return Err(PortalError::InvalidInput("Password cannot be empty".into()));
        }
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(PortalError::InvalidInput(format!(
                "Password cannot be longer than {} bytes",
                MAX_PASSWORD_BYTES
            )));
        }

        if self.users.read().await.contains_key(username) {
            return Err(PortalError::UsernameTaken);
        }

        // Hashing is slow; no lock is held while it runs.
        let password_hash =
            bcrypt::hash(password, self.bcrypt_cost).context("Failed to hash password")?;

        let mut users = self.users.write().await;

        if users.contains_key(username) {
            return Err(PortalError::UsernameTaken);
        }

        users.insert(username.to_string(), User::new(password_hash));
        if let Err(e) = self.save(&users) {
            users.remove(username);
            return Err(e.into());
        }

        Ok(())
    }

    /// Exact match only: no trimming, no case folding.
    pub async fn authenticate(&self, username: &str, password: &str) -> PortalResult<()> {
        // bcrypt ignores everything past 72 bytes, so such a password can never be an exact match.
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(PortalError::InvalidCredentials);
        }

        let password_hash = self
            .users
            .read()
            .await
            .get(username)
            .map(|user| user.password_hash.clone())
            .ok_or(PortalError::InvalidCredentials)?;

        let valid =
            bcrypt::verify(password, &password_hash).context("Failed to verify password")?;

        if valid {
            Ok(())
        } else {
            Err(PortalError::InvalidCredentials)
        }
    }
}
