use clap::{Parser, Subcommand};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::clients::api_client::{ApiClient, ApiError};
use crate::config::Config;
use crate::models::{AuthContext, Credentials, Identity, PresenceKind};
use crate::services::{auth_service, doc_edit_service};
use crate::session::{SessionEvent, SessionHandle};

#[derive(Debug, Parser)]
#[command(name = "colabri-sync", about = "Edit team documents together from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and remember the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// List the team's documents
    List,
    /// Create an empty document
    Create { title: String },
    /// Delete a document
    Delete { id: String },
    /// Open a document for collaborative editing
    Edit { id: String },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not logged in, run `colabri-sync login` first")]
    NotLoggedIn,
}

pub async fn run(cli: Cli, config: &Config) -> Result<(), CliError> {
    match cli.command {
        Command::Login {
            email,
            username,
            password,
        } => login(config, &email, &username, password).await,
        Command::Logout => {
            auth_service::clear_session(&config.session_file)?;
            println!("Logged out.");
            Ok(())
        }
        command => {
            let auth = Arc::new(auth_service::load_session(&config.session_file));
            if !auth.is_authenticated() {
                return Err(CliError::NotLoggedIn);
            }
            let api = ApiClient::new(&config.api_base, config.request_timeout(), auth.clone())?;
            let result = run_authenticated(command, &api, config).await;

            // Keep refreshed tokens, or forget rejected ones
            if auth.is_authenticated() {
                auth_service::store_session(&config.session_file, &auth)?;
            } else {
                auth_service::clear_session(&config.session_file)?;
            }
            result
        }
    }
}

async fn login(config: &Config, email: &str, username: &str, password: Option<String>) -> Result<(), CliError> {
    let password = match password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ")?,
    };
    let anonymous = Arc::new(AuthContext::default());
    let api = ApiClient::new(&config.api_base, config.request_timeout(), anonymous)?;
    let tokens = api.login(email, username, &password).await?;

    let auth = AuthContext::new(
        Credentials {
            access_token: Some(tokens.access_token),
            refresh_token: Some(tokens.refresh_token),
        },
        Identity {
            username: Some(username.to_string()),
            email: Some(email.to_string()),
        },
    );
    auth_service::store_session(&config.session_file, &auth)?;
    println!("Logged in as {}.", auth.display_name());
    Ok(())
}

async fn run_authenticated(command: Command, api: &ApiClient, config: &Config) -> Result<(), CliError> {
    match command {
        Command::List => {
            let docs = api.list_documents().await?;
            if docs.is_empty() {
                println!("No documents yet.");
            }
            for doc in docs {
                let updated = doc
                    .updated()
                    .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<26} {:<17} {}", doc.id, updated, doc.title);
            }
            Ok(())
        }
        Command::Create { title } => {
            let created = api.create_document(title.trim()).await?;
            println!("Created '{}' ({})", created.title, created.id);
            Ok(())
        }
        Command::Delete { id } => {
            api.delete_document(&id).await?;
            println!("Deleted {}", id);
            Ok(())
        }
        Command::Edit { id } => edit(api, config, &id).await,
        Command::Login { .. } | Command::Logout => Ok(()),
    }
}

/// A line typed in the editor
#[derive(Debug, PartialEq, Eq)]
enum EditorInput<'a> {
    Append(&'a str),
    Replace(&'a str),
    Show,
    Save,
    Open(&'a str),
    Quit,
    Unknown(&'a str),
}

impl<'a> EditorInput<'a> {
    fn parse(line: &'a str) -> Self {
        let Some(command) = line.strip_prefix(':') else {
            return EditorInput::Append(line);
        };
        let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
        match name {
            "set" => EditorInput::Replace(arg),
            "show" => EditorInput::Show,
            "save" => EditorInput::Save,
            "open" if !arg.trim().is_empty() => EditorInput::Open(arg.trim()),
            "quit" | "q" => EditorInput::Quit,
            _ => EditorInput::Unknown(line),
        }
    }
}

fn append_line(buffer: &str, line: &str) -> String {
    if buffer.is_empty() {
        line.to_string()
    } else {
        format!("{}\n{}", buffer, line)
    }
}

async fn edit(api: &ApiClient, config: &Config, doc_id: &str) -> Result<(), CliError> {
    let relay_url = config.relay_url();
    let timings = config.session_timings();
    let mut opened = doc_edit_service::open_document(api, &relay_url, doc_id, timings).await?;
    let mut buffer = opened.document.content().to_string();
    print_header(&opened.document.title, &buffer);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut handle: SessionHandle = opened.handle;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match EditorInput::parse(&line) {
                    EditorInput::Append(text) => {
                        buffer = append_line(&buffer, text);
                        handle.edit(buffer.clone());
                    }
                    EditorInput::Replace(text) => {
                        buffer = text.to_string();
                        handle.edit(buffer.clone());
                    }
                    EditorInput::Show => println!("{}", buffer),
                    EditorInput::Save => handle.save(),
                    EditorInput::Open(next) => {
                        let next = next.to_string();
                        match doc_edit_service::switch_document(handle, api, &relay_url, &next, timings).await {
                            Ok(switched) => {
                                buffer = switched.document.content().to_string();
                                print_header(&switched.document.title, &buffer);
                                handle = switched.handle;
                                opened.events = switched.events;
                            }
                            Err(failed) => {
                                println!("Could not open {}: {}", next, failed.error);
                                handle = failed.current;
                            }
                        }
                    }
                    EditorInput::Quit => break,
                    EditorInput::Unknown(text) => println!("Unknown command {}", text),
                }
            }
            event = opened.events.recv() => match event {
                Some(SessionEvent::ContentReplaced(content)) => {
                    buffer = content;
                    println!("--- updated by a collaborator ---\n{}", buffer);
                }
                Some(SessionEvent::Presence(presence)) => {
                    let who = presence.user.as_deref().unwrap_or("someone");
                    match presence.event {
                        PresenceKind::Join => println!("* {} joined", who),
                        PresenceKind::Leave => println!("* {} left", who),
                    }
                }
                Some(SessionEvent::SaveStatus(status)) => println!("[{}]", status),
                Some(SessionEvent::SaveFailed(message)) => println!("Failed to save document: {}", message),
                Some(SessionEvent::RelayClosed) => println!("Lost connection to collaborators; edits are still saved."),
                None => {
                    debug!("Session event stream ended");
                    break;
                }
            },
        }
    }

    handle.close().await;
    info!("Editor closed");
    Ok(())
}

fn print_header(title: &str, content: &str) {
    println!("== {} ==", title);
    if !content.is_empty() {
        println!("{}", content);
    }
    println!("(type to append a line, :set <text>, :show, :save, :open <id>, :quit)");
}
