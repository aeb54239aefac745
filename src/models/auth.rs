use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use crate::services::auth_service;

/// Bearer credentials issued by `/login` and renewed by `/refresh`
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Who the user is, as far as display and activity logging go
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// On-disk form of an [`AuthContext`]
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StoredSession {
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub identity: Identity,
}

/// Credentials and identity for one run, passed to whoever needs them.
///
/// Only the access token changes after construction (on refresh) and the
/// whole credential pair is dropped when the backend forces a new login.
#[derive(Debug, Default)]
pub struct AuthContext {
    credentials: RwLock<Credentials>,
    identity: Identity,
}

impl AuthContext {
    pub fn new(credentials: Credentials, identity: Identity) -> Self {
        Self {
            credentials: RwLock::new(credentials),
            identity,
        }
    }

    pub fn from_stored(stored: StoredSession) -> Self {
        Self::new(stored.credentials, stored.identity)
    }

    pub fn to_stored(&self) -> StoredSession {
        StoredSession {
            credentials: self.credentials(),
            identity: self.identity.clone(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.credentials().access_token
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.credentials().refresh_token
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    pub fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.write().unwrap_or_else(|e| e.into_inner()) = credentials;
    }

    pub fn set_access_token(&self, token: String) {
        self.credentials
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .access_token = Some(token);
    }

    pub fn clear_credentials(&self) {
        self.set_credentials(Credentials::default());
    }

    /// Name shown to other collaborators.
    ///
    /// Username first, then email, then the subject of the access token,
    /// then a generic placeholder.
    pub fn display_name(&self) -> String {
        self.identity
            .username
            .clone()
            .filter(|name| !name.is_empty())
            .or_else(|| self.identity.email.clone().filter(|email| !email.is_empty()))
            .or_else(|| {
                self.access_token()
                    .and_then(|token| auth_service::token_subject(&token))
            })
            .unwrap_or_else(|| "user".to_string())
    }
}

#[derive(Serialize, Debug)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize, Debug)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(username: Option<&str>, email: Option<&str>) -> Identity {
        Identity {
            username: username.map(str::to_string),
            email: email.map(str::to_string),
        }
    }

    #[test]
    fn display_name_prefers_username_then_email() {
        let ctx = AuthContext::new(Credentials::default(), identity(Some("ana"), Some("team@x.io")));
        assert_eq!(ctx.display_name(), "ana");

        let ctx = AuthContext::new(Credentials::default(), identity(None, Some("team@x.io")));
        assert_eq!(ctx.display_name(), "team@x.io");

        let ctx = AuthContext::new(Credentials::default(), identity(Some(""), None));
        assert_eq!(ctx.display_name(), "user");
    }

    #[test]
    fn clearing_credentials_keeps_identity() {
        let ctx = AuthContext::new(
            Credentials {
                access_token: Some("a".to_string()),
                refresh_token: Some("r".to_string()),
            },
            identity(Some("ana"), None),
        );
        ctx.set_access_token("b".to_string());
        assert_eq!(ctx.access_token().as_deref(), Some("b"));
        assert_eq!(ctx.refresh_token().as_deref(), Some("r"));

        ctx.clear_credentials();
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.identity().username.as_deref(), Some("ana"));
    }
}
