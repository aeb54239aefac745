use std::path::Path;

use jsonwebtoken::{dangerous::insecure_decode, TokenData};
use tracing::{debug, info, warn};

use crate::models::{AuthContext, StoredSession};

// Read the claims of a backend token without checking its signature.
// The client never holds the signing secret; the backend stays the judge of validity.
pub fn read_claims(token: &str) -> Result<TokenData<serde_json::Value>, jsonwebtoken::errors::Error> {
    insecure_decode::<serde_json::Value>(token)
}

// Get the subject (the team email) of an access token
pub fn token_subject(token: &str) -> Option<String> {
    match read_claims(token) {
        Ok(data) => data
            .claims
            .get("sub")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        Err(e) => {
            debug!("Can't read claims from access token: {}", e);
            None
        }
    }
}

/// Load the stored session, or an empty one when there is none yet
pub fn load_session(path: impl AsRef<Path>) -> AuthContext {
    let path = path.as_ref();
    let stored = match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<StoredSession>(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Ignoring unreadable session file {}: {}", path.display(), e);
                StoredSession::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredSession::default(),
        Err(e) => {
            warn!("Can't read session file {}: {}", path.display(), e);
            StoredSession::default()
        }
    };
    AuthContext::from_stored(stored)
}

/// Persist the current credentials and identity
pub fn store_session(path: impl AsRef<Path>, ctx: &AuthContext) -> std::io::Result<()> {
    let path = path.as_ref();
    let raw = serde_json::to_string_pretty(&ctx.to_stored())?;
    std::fs::write(path, raw)?;
    info!("Session stored in {}", path.display());
    Ok(())
}

/// Forget the stored session
pub fn clear_session(path: impl AsRef<Path>) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
