use anyhow::Context;
use std::sync::Arc;
use synapse::config::ClientConfig;
use synapse::error::ErrorKind;
use synapse::session::{AuthState, SessionController, SessionState};
use synapse::types::{ConversationEntry, DocumentUpload, EntryId, EntryKind, Role};
use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

/// Bundled config for builds shipped without a .env file
const BUNDLED_CONFIG: &str = include_str!("../assets/config.env");

const MESSAGE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour repr:12 padding:zero]:[minute padding:zero] [period case:upper]");

const HELP: &str = "\
Commands:
  /login <email> <password>   sign in
  /upload <path>              scope the conversation to a document
  /status                     show session state
  /logout                     sign out and clear the conversation
  /quit                       exit
Anything else is sent as a question.";

fn load_dotenv() {
    // A .env file wins over the bundled defaults
    if dotenvy::dotenv().is_ok() {
        return;
    }

    load_bundled_config();
}

fn load_bundled_config() {
    for line in BUNDLED_CONFIG.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if std::env::var_os(key).is_none() {
            // SAFETY: called from `main` before the runtime spawns any threads
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Login { email: String, password: String },
    Upload(String),
    Status,
    Logout,
    Help,
    Quit,
    Ask(String),
    Invalid(&'static str),
}

impl Command {
    fn parse(line: &str) -> Self {
        let Some(rest) = line.trim().strip_prefix('/') else {
            return Command::Ask(line.to_string());
        };

        let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let args = args.trim();
        match name {
            "login" => {
                let mut parts = args.split_whitespace();
                match (parts.next(), parts.next()) {
                    (Some(email), Some(password)) => Command::Login {
                        email: email.to_string(),
                        password: password.to_string(),
                    },
                    _ => Command::Invalid("usage: /login <email> <password>"),
                }
            }
            "upload" if !args.is_empty() => Command::Upload(args.to_string()),
            "upload" => Command::Invalid("usage: /upload <path>"),
            "status" => Command::Status,
            "logout" => Command::Logout,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => Command::Invalid("unknown command, try /help"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    load_dotenv();
    let config = ClientConfig::from_env().context("invalid configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_writer(std::io::stderr)
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?
        .block_on(run(config))
}

async fn run(config: ClientConfig) -> anyhow::Result<()> {
    tracing::info!(api = %config.api_url, model = config.model.as_str(), "starting Synapse");
    let session = Arc::new(
        SessionController::from_config(&config).context("failed to open credential store")?,
    );

    // Startup gate: nothing is routed until the persisted session is known.
    match session.check_persisted_session().await {
        Ok(AuthState::Authenticated) => println!("Welcome back."),
        Ok(_) => println!("Please sign in with /login <email> <password>."),
        Err(err) => println!("Could not restore your session ({err}). Please sign in."),
    }

    tokio::spawn(render_updates(session.subscribe()));
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Login { email, password } => match session.login(&email, &password).await {
                Ok(()) => println!("Signed in."),
                Err(err) => println!("Login failed: {err}"),
            },
            Command::Upload(path) => {
                let document = match DocumentUpload::from_path(&path).await {
                    Ok(document) => document,
                    Err(err) => {
                        println!("Cannot read {path}: {err}");
                        continue;
                    }
                };
                let session = session.clone();
                tokio::spawn(async move {
                    if let Err(err) = session.upload_document(document).await {
                        println!("Upload failed: {err}");
                    }
                });
            }
            Command::Status => print_status(&session.snapshot()),
            Command::Logout => {
                session.logout().await;
                println!("Signed out.");
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
            Command::Invalid(usage) => println!("{usage}"),
            Command::Ask(text) => {
                let session = session.clone();
                tokio::spawn(async move {
                    // Backend failures already show up as error entries.
                    if let Err(err) = session.send_message(&text).await
                        && err.kind() == ErrorKind::LocalPrecondition
                    {
                        println!("{err}");
                    }
                });
            }
        }
    }

    Ok(())
}

/// Print every entry appended since the last update and announce forced sign-outs.
async fn render_updates(mut updates: watch::Receiver<SessionState>) {
    let mut last_printed: Option<EntryId> = None;
    let mut last_auth = AuthState::CheckingPersisted;

    loop {
        let state = updates.borrow_and_update().clone();

        for entry in &state.conversation {
            if last_printed.is_some_and(|last| entry.id <= last) {
                continue;
            }
            println!("{}", format_entry(entry));
            last_printed = Some(entry.id);
        }

        if last_auth == AuthState::Authenticated && state.auth == AuthState::Unauthenticated {
            println!("Session ended. Sign in again with /login <email> <password>.");
        }
        last_auth = state.auth;

        if updates.changed().await.is_err() {
            break;
        }
    }
}

fn print_status(state: &SessionState) {
    println!("Auth: {:?}", state.auth);
    match &state.scope {
        Some(scope) => println!("Active document: {scope}"),
        None => println!("Active document: none (answers are unscoped)"),
    }
    println!("Messages: {}", state.conversation.len());
}

fn format_entry(entry: &ConversationEntry) -> String {
    let speaker = match (entry.role, entry.kind) {
        (Role::User, _) => "you",
        (Role::Assistant, EntryKind::Error) => "synapse (error)",
        (Role::Assistant, _) => "synapse",
    };
    let mut line = format!("[{}] {}: {}", format_timestamp(entry.created_at), speaker, entry.text);
    if let Some(meta) = &entry.answer {
        if let Some(model) = &meta.model {
            line.push_str(&format!("\n    ⚡ {model}"));
        }
        if let Some(scope) = &meta.scope {
            line.push_str(&format!("  📄 {scope}"));
        }
    }
    line
}

fn format_timestamp(timestamp: OffsetDateTime) -> String {
    let mut datetime = timestamp;
    if let Ok(offset) = UtcOffset::current_local_offset() {
        datetime = datetime.to_offset(offset);
    }
    datetime.format(MESSAGE_TIME_FORMAT).unwrap_or_default()
}
