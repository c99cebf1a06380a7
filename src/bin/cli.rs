use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use dialoguer::Password;
use file_portal::models::{
    AuthResponse, CredentialsRequest, ErrorResponse, FileListResponse, HomeResponse,
    MessageResponse,
};
use percent_encoding::percent_decode_str;
use prettytable::{Cell, Row, Table};
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const SESSION_FILE: &str = ".portal_session";

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Upload and download files on the employee file portal", long_about = None)]
struct Cli {
    #[arg(long, global = true, env = "PORTAL_URL", default_value = "http://localhost:3000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show the portal welcome page")]
    Home,

    #[command(about = "Create a new account and log in")]
    Register {
        #[arg(short, long, help = "Username")]
        username: String,

        #[arg(short, long, help = "Password (prompted for, masked, when omitted)")]
        password: Option<String>,
    },

    #[command(about = "Log in to your account")]
    Login {
        #[arg(short, long, help = "Username")]
        username: String,

        #[arg(short, long, help = "Password (prompted for, masked, when omitted)")]
        password: Option<String>,
    },

    #[command(about = "Log out of your account")]
    Logout,

    #[command(about = "Show current user")]
    Whoami,

    #[command(about = "Upload one or more files")]
    Upload {
        #[arg(short, long = "file", required = true, num_args = 1.., help = "Path(s) of the files to upload")]
        files: Vec<PathBuf>,
    },

    #[command(about = "List the files you uploaded")]
    List,

    #[command(about = "Download one of your files")]
    Download {
        #[arg(long, help = "File ID (see 'portal list')")]
        id: Uuid,

        #[arg(short, long, help = "Where to save the file (defaults to its original name)")]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct Session {
    username: String,
    token: Uuid,
}

impl Session {
    fn save(&self) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(SESSION_FILE, json).context("Failed to save session")?;
        Ok(())
    }

    fn load() -> Option<Self> {
        if Path::new(SESSION_FILE).exists() {
            let data = fs::read_to_string(SESSION_FILE).ok()?;
            serde_json::from_str(&data).ok()
        } else {
            None
        }
    }

    fn clear() -> Result<()> {
        if Path::new(SESSION_FILE).exists() {
            fs::remove_file(SESSION_FILE)?;
        }
        Ok(())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.token)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let api = Api {
        client: Client::new(),
        base: cli.server.trim_end_matches('/').to_string(),
    };

    if let Err(e) = run_command(&api, cli.command).await {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

struct Api {
    client: Client,
    base: String,
}

impl Api {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

async fn run_command(api: &Api, command: Commands) -> Result<()> {
    match command {
        Commands::Home => home(api).await,
        Commands::Register { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password(true)?,
            };
            register(api, username, password).await
        }
        Commands::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password(false)?,
            };
            login(api, username, password).await
        }
        Commands::Logout => logout(api).await,
        Commands::Whoami => whoami(),
        Commands::Upload { files } => {
            let session = require_login("upload files")?;
            upload_files(api, &session, files).await
        }
        Commands::List => {
            let session = require_login("view files")?;
            list_files(api, &session).await
        }
        Commands::Download { id, output } => {
            let session = require_login("download files")?;
            download_file(api, &session, id, output).await
        }
    }
}

fn prompt_password(confirm: bool) -> Result<String> {
    let mut prompt = Password::new().with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Repeat password", "Passwords do not match");
    }
    Ok(prompt.interact()?)
}

fn require_login(operation: &str) -> Result<Session> {
    Session::load().ok_or_else(|| {
        anyhow::anyhow!(
            "You must be logged in to {}. Use: portal login -u <username>",
            operation
        )
    })
}

async fn send(request: RequestBuilder) -> Result<Response> {
    let response = request
        .send()
        .await
        .context("Failed to connect to the portal. Is the server running?")?;

    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&text)
        .map(|e| e.error)
        .unwrap_or(text);
    bail!("{} ({})", message, status)
}

async fn home(api: &Api) -> Result<()> {
    let page: HomeResponse = send(api.client.get(api.url("/"))).await?.json().await?;

    println!("🏢 {}", page.title);
    println!("{}", page.message);
    Ok(())
}

async fn register(api: &Api, username: String, password: String) -> Result<()> {
    let request = api
        .client
        .post(api.url("/register"))
        .json(&CredentialsRequest { username, password });
    let auth: AuthResponse = send(request).await?.json().await?;

    Session {
        username: auth.username.clone(),
        token: auth.token,
    }
    .save()?;

    println!("✅ {}", auth.message);
    println!("👤 Logged in as: {}", auth.username);
    Ok(())
}

async fn login(api: &Api, username: String, password: String) -> Result<()> {
    let request = api
        .client
        .post(api.url("/login"))
        .json(&CredentialsRequest { username, password });
    let auth: AuthResponse = send(request).await?.json().await?;

    Session {
        username: auth.username.clone(),
        token: auth.token,
    }
    .save()?;

    println!("✅ {}", auth.message);
    Ok(())
}

async fn logout(api: &Api) -> Result<()> {
    let Some(session) = Session::load() else {
        println!("ℹ️  Not logged in");
        return Ok(());
    };

    // The local session is dropped even if the server no longer knows the token.
    let result = send(session.authorize(api.client.post(api.url("/logout")))).await;
    Session::clear()?;

    match result {
        Ok(response) => {
            let body: MessageResponse = response.json().await?;
            println!("✅ {}", body.message);
        }
        Err(e) => println!("⚠️  Local session cleared; server said: {}", e),
    }
    Ok(())
}

fn whoami() -> Result<()> {
    if let Some(session) = Session::load() {
        println!("👤 Logged in as: {}", session.username);
    } else {
        println!("❌ Not logged in");
        println!("💡 Use 'portal login -u <username>' to log in");
    }
    Ok(())
}

async fn upload_files(api: &Api, session: &Session, paths: Vec<PathBuf>) -> Result<()> {
    let mut form = multipart::Form::new();

    for path in &paths {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string();
        form = form.part("file", multipart::Part::bytes(bytes).file_name(name));
    }

    let request = session.authorize(api.client.post(api.url("/files"))).multipart(form);
    let uploaded: FileListResponse = send(request).await?.json().await?;

    println!("✅ Files uploaded successfully!");
    for record in &uploaded.files {
        println!("   📄 {} ({} bytes)  🆔 {}", record.name, record.size, record.id);
    }
    Ok(())
}

async fn list_files(api: &Api, session: &Session) -> Result<()> {
    let request = session.authorize(api.client.get(api.url("/files")));
    let listing: FileListResponse = send(request).await?.json().await?;

    if listing.files.is_empty() {
        println!("📭 No files uploaded yet.");
        println!("💡 Use 'portal upload -f <file>' to upload a file");
        return Ok(());
    }

    println!("\n📚 My Files ({})\n", listing.files.len());

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("ID"),
        Cell::new("Name"),
        Cell::new("Size"),
        Cell::new("Uploaded on"),
        Cell::new("Downloaded by"),
        Cell::new("Downloaded on"),
    ]));

    for record in listing.files {
        let uploaded = record
            .upload_date
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        let downloaded = record
            .download_date
            .map(|d| d.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());

        table.add_row(Row::new(vec![
            Cell::new(&record.id.to_string()),
            Cell::new(&record.name),
            Cell::new(&record.size.to_string()),
            Cell::new(&uploaded),
            Cell::new(record.downloaded_by.as_deref().unwrap_or("N/A")),
            Cell::new(&downloaded),
        ]));
    }

    table.printstd();
    println!();
    Ok(())
}

async fn download_file(
    api: &Api,
    session: &Session,
    id: Uuid,
    output: Option<PathBuf>,
) -> Result<()> {
    let request = session.authorize(api.client.get(api.url(&format!("/files/{}/download", id))));
    let response = send(request).await?;

    let name = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_disposition)
        .unwrap_or_else(|| id.to_string());
    let bytes = response.bytes().await?;

    let target = output.unwrap_or_else(|| PathBuf::from(&name));
    fs::write(&target, &bytes).with_context(|| format!("Failed to write {}", target.display()))?;

    println!("✅ File {} downloaded successfully!", name);
    println!("💾 Saved to: {} ({} bytes)", target.display(), bytes.len());
    Ok(())
}

/// Prefers the RFC 5987 `filename*` parameter, falling back to the ASCII `filename`.
fn filename_from_disposition(value: &str) -> Option<String> {
    let extended = value
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("filename*="))
        .and_then(|v| {
            let (charset, rest) = v.split_once('\'')?;
            let (_language, encoded) = rest.split_once('\'')?;
            if !charset.eq_ignore_ascii_case("UTF-8") {
                return None;
            }
            percent_decode_str(encoded).decode_utf8().ok().map(|s| s.into_owned())
        });

    let raw = extended.or_else(|| {
        let start = value.find("filename=\"")? + "filename=\"".len();
        let rest = &value[start..];
        let end = rest.find('"')?;
        Some(rest[..end].to_string())
    })?;

    let name = Path::new(&raw).file_name()?.to_str()?;
    Some(name.to_string())
}
