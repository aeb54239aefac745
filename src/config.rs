use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::session::SessionTimings;

/// Client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Base URL of the backend REST API, also used to derive the relay URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// File holding the stored credentials and identity between runs
    #[serde(default = "default_session_file")]
    pub session_file: String,

    /// Quiet period before a local change is broadcast to the relay
    #[serde(default = "default_broadcast_debounce_ms")]
    pub broadcast_debounce_ms: u64,

    /// How long a freshly applied remote update suppresses broadcasting
    #[serde(default = "default_echo_window_ms")]
    pub echo_window_ms: u64,

    /// Quiet period before the buffer is saved through the REST API
    #[serde(default = "default_autosave_delay_ms")]
    pub autosave_delay_ms: u64,

    /// How long the "Saved" status stays up before going back to idle
    #[serde(default = "default_saved_status_ms")]
    pub saved_status_ms: u64,

    /// HTTP request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        match envy::prefixed("COLABRI_").from_env::<Config>() {
            Ok(config) => {
                info!("Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    /// WebSocket URL of the relay, derived from the API base
    pub fn relay_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/socket.io/?EIO=4&transport=websocket", ws_base)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Timer settings for collaborative sessions
    pub fn session_timings(&self) -> SessionTimings {
        SessionTimings {
            broadcast_debounce: Duration::from_millis(self.broadcast_debounce_ms),
            echo_window: Duration::from_millis(self.echo_window_ms),
            autosave_delay: Duration::from_millis(self.autosave_delay_ms),
            saved_status: Duration::from_millis(self.saved_status_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            session_file: default_session_file(),
            broadcast_debounce_ms: default_broadcast_debounce_ms(),
            echo_window_ms: default_echo_window_ms(),
            autosave_delay_ms: default_autosave_delay_ms(),
            saved_status_ms: default_saved_status_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvError(#[from] envy::Error),
}

// Default value functions
fn default_api_base() -> String {
    "http://localhost:5050".to_string()
}

fn default_session_file() -> String {
    ".colabri-session.json".to_string()
}

fn default_broadcast_debounce_ms() -> u64 {
    300
}

fn default_echo_window_ms() -> u64 {
    50
}

fn default_autosave_delay_ms() -> u64 {
    1500
}

fn default_saved_status_ms() -> u64 {
    1500
}

fn default_request_timeout_secs() -> u64 {
    10
}
