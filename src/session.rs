//! Bearer-token sessions.
//!
//! A successful register or login creates a [`Session`] and hands out its token.
//! Handlers that need an identity take `Session` as an extractor argument; requests
//! without a valid token never reach them.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::{error::PortalError, AppState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: Uuid,
    pub username: String,
}

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, username: &str) -> Session {
        let session = Session {
            token: Uuid::new_v4(),
            username: username.to_string(),
        };

        self.sessions
            .write()
            .await
            .insert(session.token, session.clone());
        session
    }

    pub async fn get(&self, token: Uuid) -> Option<Session> {
        self.sessions.read().await.get(&token).cloned()
    }

    /// Returns the removed session, if the token was live.
    pub async fn end(&self, token: Uuid) -> Option<Session> {
        self.sessions.write().await.remove(&token)
    }
}

fn bearer_token(parts: &Parts) -> Option<Uuid> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?;
    Uuid::parse_str(token.trim()).ok()
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = PortalError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let operation = operation_name(parts);

        let Some(token) = bearer_token(parts) else {
            warn!("Rejected {} {}: no session token", parts.method, parts.uri.path());
            return Err(PortalError::Unauthorized(operation));
        };

        match state.sessions.get(token).await {
            Some(session) => Ok(session),
            None => {
                warn!("Rejected {} {}: unknown session", parts.method, parts.uri.path());
                Err(PortalError::Unauthorized(operation))
            }
        }
    }
}

fn operation_name(parts: &Parts) -> &'static str {
    let path = parts.uri.path();
    if path == "/logout" {
        "log out"
    } else if path.ends_with("/download") {
        "download files"
    } else if parts.method == axum::http::Method::POST {
        "upload files"
    } else {
        "view files"
    }
}
