//! HTTP surface of the portal.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{PortalError, PortalResult};
use crate::models::{
    AuthResponse, CredentialsRequest, FileListResponse, HomeResponse, MessageResponse,
};
use crate::session::Session;
use crate::AppState;

const PORTAL_TITLE: &str = "Employee Database Portal";

pub fn create_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health_check))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/files", post(upload_files).get(list_files))
        .route("/files/:id/download", get(download_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn home() -> Json<HomeResponse> {
    Json(HomeResponse {
        title: PORTAL_TITLE.to_string(),
        message: "Please register or login to continue.".to_string(),
    })
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "file-portal"
    }))
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CredentialsRequest>,
) -> PortalResult<(StatusCode, Json<AuthResponse>)> {
    if let Err(e) = state.users.register(&payload.username, &payload.password).await {
        warn!("Registration for '{}' refused: {}", payload.username, e);
        return Err(e);
    }

    let session = state.sessions.create(&payload.username).await;
    info!("Registered new user '{}'", session.username);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            username: session.username,
            token: session.token,
            message: "Registration successful!".to_string(),
        }),
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CredentialsRequest>,
) -> PortalResult<Json<AuthResponse>> {
    if let Err(e) = state
        .users
        .authenticate(&payload.username, &payload.password)
        .await
    {
        warn!("Login failed for '{}'", payload.username);
        return Err(e);
    }

    let session = state.sessions.create(&payload.username).await;
    info!("User '{}' logged in", session.username);

    Ok(Json(AuthResponse {
        message: format!("Welcome {}!", session.username),
        username: session.username,
        token: session.token,
    }))
}

async fn logout(State(state): State<Arc<AppState>>, session: Session) -> Json<MessageResponse> {
    state.sessions.end(session.token).await;
    info!("User '{}' logged out", session.username);

    Json(MessageResponse {
        message: "You have logged out successfully!".to_string(),
    })
}

async fn upload_files(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut multipart: Multipart,
) -> PortalResult<(StatusCode, Json<FileListResponse>)> {
    let mut uploaded = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PortalError::InvalidInput(format!("Malformed upload: {}", e.body_text())))?
    {
        // Plain form fields, and file inputs left empty, carry no filename and are not uploads.
        let Some(name) = field
            .file_name()
            .filter(|n| !n.is_empty())
            .map(str::to_string)
        else {
            continue;
        };

        let bytes = field
            .bytes()
            .await
            .map_err(|e| PortalError::InvalidInput(format!("Malformed upload: {}", e.body_text())))?;

        let storage_key = state.blobs.put(&bytes).await?;
        let record = state
            .files
            .record_upload(name, &session.username, storage_key, bytes.len() as u64)
            .await?;

        info!(
            "User '{}' uploaded '{}' ({} bytes) as {}",
            session.username, record.name, record.size, record.storage_key
        );
        uploaded.push(record);
    }

    if uploaded.is_empty() {
        return Err(PortalError::InvalidInput("No files provided".to_string()));
    }

    Ok((StatusCode::CREATED, Json(FileListResponse { files: uploaded })))
}

async fn list_files(State(state): State<Arc<AppState>>, session: Session) -> Json<FileListResponse> {
    let files = state.files.list_for(&session.username).await;
    Json(FileListResponse { files })
}

async fn download_file(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<Uuid>,
) -> PortalResult<impl IntoResponse> {
    let record = state
        .files
        .find_for(id, &session.username)
        .await
        .ok_or_else(|| PortalError::FileNotFound(id.to_string()))?;

    let bytes = state.blobs.read(&record).await?;
    let record = state.files.record_download(record.id, &session.username).await?;
    info!("User '{}' downloaded '{}'", session.username, record.name);

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&record.name)),
        ],
        bytes,
    ))
}

/// RFC 5987 `attr-char`: everything else is percent-encoded in `filename*`.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// `filename` is an ASCII fallback for old clients; `filename*` carries the exact UTF-8 name.
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();
    let encoded = utf8_percent_encode(name, ATTR_CHAR);
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}
