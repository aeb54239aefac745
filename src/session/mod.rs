//! Collaborative editing session: one per open document.
//!
//! Local edits go out as full-content `doc_change` events after a debounce,
//! remote `doc_update`s from other clients replace the buffer outright (last
//! writer wins), and a separate, longer debounce saves the buffer through the
//! REST API. There is no merging and no reconnect.

pub mod runner;
pub mod state;
pub mod timer;

use async_trait::async_trait;
use std::time::Duration;

use crate::models::PresenceMessage;

pub use runner::{Session, SessionHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    pub broadcast_debounce: Duration,
    pub echo_window: Duration,
    pub autosave_delay: Duration,
    pub saved_status: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            broadcast_debounce: Duration::from_millis(300),
            echo_window: Duration::from_millis(50),
            autosave_delay: Duration::from_millis(1500),
            saved_status: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved,
}

impl std::fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveStatus::Idle => write!(f, "Idle"),
            SaveStatus::Saving => write!(f, "Saving..."),
            SaveStatus::Saved => write!(f, "Saved"),
        }
    }
}

/// What a session reports to whoever displays it
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Another client's content replaced the buffer
    ContentReplaced(String),
    Presence(PresenceMessage),
    SaveStatus(SaveStatus),
    SaveFailed(String),
    /// The relay went away; the session carries on offline
    RelayClosed,
}

/// Where session content gets persisted
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save(&self, doc_id: &str, content: &str) -> Result<(), String>;
}
