//! End-to-end tests: the router is served on an ephemeral port and driven over HTTP.

use file_portal::{
    config::Config,
    models::{AuthResponse, ErrorResponse, FileListResponse},
    routes, AppState,
};
use reqwest::{multipart, Client, StatusCode};
use serde_json::json;
use tempfile::TempDir;

struct TestPortal {
    base: String,
    client: Client,
    dir: TempDir,
}

impl TestPortal {
    async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let config = Config::with_data_dir(dir.path());
        let state = AppState::open(&config).await.unwrap();
        let app = routes::create_router(state, config.max_upload_bytes);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://127.0.0.1:{port}"),
            client: Client::new(),
            dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn register(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/register"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap()
    }

    async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap()
    }

    async fn token_for(&self, username: &str, password: &str) -> String {
        let response = self.register(username, password).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let auth: AuthResponse = response.json().await.unwrap();
        auth.token.to_string()
    }

    async fn upload(&self, token: &str, files: &[(&str, &[u8])]) -> reqwest::Response {
        let mut form = multipart::Form::new();
        for (name, bytes) in files {
            form = form.part(
                "file",
                multipart::Part::bytes(bytes.to_vec()).file_name(name.to_string()),
            );
        }

        self.client
            .post(self.url("/files"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    async fn list(&self, token: &str) -> FileListResponse {
        let response = self
            .client
            .get(self.url("/files"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response.json().await.unwrap()
    }

    async fn download(&self, token: &str, id: &str) -> reqwest::Response {
        self.client
            .get(self.url(&format!("/files/{id}/download")))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn home_and_health_need_no_session() {
    let portal = TestPortal::start().await;

    let home: serde_json::Value = portal
        .client
        .get(portal.url("/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(home["message"], "Please register or login to continue.");

    let health: serde_json::Value = portal
        .client
        .get(portal.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn register_then_login() {
    let portal = TestPortal::start().await;

    let registered = portal.register("alice", "s3cret").await;
    assert_eq!(registered.status(), StatusCode::CREATED);

    let logged_in = portal.login("alice", "s3cret").await;
    assert_eq!(logged_in.status(), StatusCode::OK);
    let auth: AuthResponse = logged_in.json().await.unwrap();
    assert_eq!(auth.username, "alice");
    assert_eq!(auth.message, "Welcome alice!");

    let users = std::fs::read_to_string(portal.dir.path().join("users.json")).unwrap();
    assert!(users.contains("alice"));
    assert!(!users.contains("s3cret"));
}

#[tokio::test]
async fn duplicate_registration_is_a_conflict() {
    let portal = TestPortal::start().await;
    portal.token_for("alice", "first").await;

    let again = portal.register("alice", "second").await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
    let body: ErrorResponse = again.json().await.unwrap();
    assert_eq!(body.error, "Username already exists! Try a different one.");

    assert_eq!(portal.login("alice", "first").await.status(), StatusCode::OK);
    assert_eq!(
        portal.login("alice", "second").await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn wrong_credentials_are_rejected() {
    let portal = TestPortal::start().await;
    portal.token_for("alice", "Secret").await;

    assert_eq!(portal.login("alice", "secret").await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(portal.login("alice", "Secret ").await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(portal.login("bob", "Secret").await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn anonymous_requests_have_no_side_effects() {
    let portal = TestPortal::start().await;

    let upload = portal
        .client
        .post(portal.url("/files"))
        .multipart(multipart::Form::new().part(
            "file",
            multipart::Part::bytes(b"data".to_vec()).file_name("a.txt"),
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(upload.status(), StatusCode::UNAUTHORIZED);
    let body: ErrorResponse = upload.json().await.unwrap();
    assert_eq!(body.error, "You must be logged in to upload files.");

    let list = portal.client.get(portal.url("/files")).send().await.unwrap();
    assert_eq!(list.status(), StatusCode::UNAUTHORIZED);

    let bogus = portal
        .client
        .get(portal.url("/files"))
        .bearer_auth(uuid::Uuid::new_v4())
        .send()
        .await
        .unwrap();
    assert_eq!(bogus.status(), StatusCode::UNAUTHORIZED);

    assert!(!portal.dir.path().join("files.json").exists());
    let blobs = std::fs::read_dir(portal.dir.path().join("uploaded_files")).unwrap();
    assert_eq!(blobs.count(), 0);
}

#[tokio::test]
async fn upload_list_and_download() {
    let portal = TestPortal::start().await;
    let alice = portal.token_for("alice", "pw").await;

    let uploaded = portal
        .upload(&alice, &[("a.txt", b"hello".as_slice()), ("b.bin", [0u8, 1, 2].as_slice())])
        .await;
    assert_eq!(uploaded.status(), StatusCode::CREATED);
    let uploaded: FileListResponse = uploaded.json().await.unwrap();
    assert_eq!(uploaded.files.len(), 2);

    let listing = portal.list(&alice).await;
    let names: Vec<_> = listing.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.bin"]);
    let record = &listing.files[0];
    assert_eq!(record.uploaded_by, "alice");
    assert_eq!(record.downloaded_by, None);

    let response = portal.download(&alice, &record.id.to_string()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"a.txt\"; filename*=UTF-8''a.txt"
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"hello");

    let listing = portal.list(&alice).await;
    assert_eq!(listing.files[0].downloaded_by.as_deref(), Some("alice"));
    assert!(listing.files[0].download_date.is_some());
    assert_eq!(listing.files[1].downloaded_by, None);
}

#[tokio::test]
async fn same_name_uploads_keep_both_blobs() {
    let portal = TestPortal::start().await;
    let alice = portal.token_for("alice", "pw").await;

    portal.upload(&alice, &[("a.txt", b"first".as_slice())]).await;
    portal.upload(&alice, &[("a.txt", b"second".as_slice())]).await;

    let listing = portal.list(&alice).await;
    assert_eq!(listing.files.len(), 2);

    let mut contents = Vec::new();
    for record in &listing.files {
        let response = portal.download(&alice, &record.id.to_string()).await;
        assert_eq!(response.status(), StatusCode::OK);
        contents.push(response.bytes().await.unwrap().to_vec());
    }
    assert_eq!(contents, vec![b"first".to_vec(), b"second".to_vec()]);
}

#[tokio::test]
async fn users_only_see_their_own_files() {
    let portal = TestPortal::start().await;
    let alice = portal.token_for("alice", "pw").await;
    let bob = portal.token_for("bob", "pw").await;

    portal.upload(&alice, &[("alice.txt", b"a".as_slice())]).await;
    portal.upload(&bob, &[("bob.txt", b"b".as_slice())]).await;

    let listing = portal.list(&bob).await;
    assert_eq!(listing.files.len(), 1);
    assert!(listing.files.iter().all(|f| f.uploaded_by == "bob"));

    let alice_file = portal.list(&alice).await.files[0].id;
    let response = portal.download(&bob, &alice_file.to_string()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_without_files_is_rejected() {
    let portal = TestPortal::start().await;
    let alice = portal.token_for("alice", "pw").await;

    let response = portal
        .client
        .post(portal.url("/files"))
        .bearer_auth(&alice)
        .multipart(multipart::Form::new().text("note", "no files here"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn part_with_empty_filename_is_not_an_upload() {
    let portal = TestPortal::start().await;
    let alice = portal.token_for("alice", "pw").await;

    let response = portal.upload(&alice, &[("", b"anonymous".as_slice())]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(portal.list(&alice).await.files.is_empty());
}

#[tokio::test]
async fn missing_blob_is_a_server_error() {
    let portal = TestPortal::start().await;
    let alice = portal.token_for("alice", "pw").await;

    let uploaded: FileListResponse = portal
        .upload(&alice, &[("a.txt", b"soon gone".as_slice())])
        .await
        .json()
        .await
        .unwrap();
    let record = &uploaded.files[0];
    std::fs::remove_file(
        portal
            .dir
            .path()
            .join("uploaded_files")
            .join(record.storage_key.to_string()),
    )
    .unwrap();

    let response = portal.download(&alice, &record.id.to_string()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let listing = portal.list(&alice).await;
    assert_eq!(listing.files[0].downloaded_by, None);
}

#[tokio::test]
async fn logout_invalidates_the_token() {
    let portal = TestPortal::start().await;
    let alice = portal.token_for("alice", "pw").await;

    let response = portal
        .client
        .post(portal.url("/logout"))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let list = portal
        .client
        .get(portal.url("/files"))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(list.status(), StatusCode::UNAUTHORIZED);

    let login = portal.login("alice", "pw").await;
    assert_eq!(login.status(), StatusCode::OK);
}

#[tokio::test]
async fn state_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    let config = Config::with_data_dir(dir.path());

    let record_id = {
        let state = AppState::open(&config).await.unwrap();
        state.users.register("alice", "pw").await.unwrap();
        let key = state.blobs.put(b"persisted").await.unwrap();
        state
            .files
            .record_upload("a.txt".into(), "alice", key, 9)
            .await
            .unwrap()
            .id
    };

    let state = AppState::open(&config).await.unwrap();
    state.users.authenticate("alice", "pw").await.unwrap();
    let record = state.files.find_for(record_id, "alice").await.unwrap();
    assert_eq!(state.blobs.read(&record).await.unwrap(), b"persisted");
}
