use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{
    AuthContext, CreateDocumentRequest, CreateDocumentResponse, Document, DocumentSummary,
    ErrorResponse, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse,
    SaveDocumentRequest,
};
use crate::session::DocumentStore;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },
    #[error("session expired, please log in again")]
    ReauthRequired,
}

/// REST client for the document backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Arc<AuthContext>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, auth: Arc<AuthContext>) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn auth(&self) -> &Arc<AuthContext> {
        &self.auth
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange team credentials for an access/refresh token pair
    pub async fn login(&self, email: &str, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let res = self
            .client
            .post(self.url("/login"))
            .json(&LoginRequest { email, username, password })
            .send()
            .await?;
        let tokens = check(res).await?.json().await?;
        info!("Logged in as {} ({})", username, email);
        Ok(tokens)
    }

    /// Get a new access token with the stored refresh token.
    ///
    /// Any failure drops the stored credentials: the user has to log in again.
    pub async fn refresh(&self) -> Result<String, ApiError> {
        let Some(refresh_token) = self.auth.refresh_token() else {
            warn!("No refresh token available");
            self.auth.clear_credentials();
            return Err(ApiError::ReauthRequired);
        };

        let res = self
            .client
            .post(self.url("/refresh"))
            .json(&RefreshRequest { refresh_token: &refresh_token })
            .send()
            .await;

        let refreshed = match res {
            Ok(res) if res.status().is_success() => res.json::<RefreshResponse>().await.ok(),
            Ok(res) => {
                warn!("Token refresh rejected with {}", res.status());
                None
            }
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                None
            }
        };

        match refreshed {
            Some(body) => {
                debug!("Access token refreshed");
                self.auth.set_access_token(body.access_token.clone());
                Ok(body.access_token)
            }
            None => {
                self.auth.clear_credentials();
                Err(ApiError::ReauthRequired)
            }
        }
    }

    // Send a bearer-authenticated request. A 401 gets one refresh and one retry.
    async fn send_authorized<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let token = self.auth.access_token().ok_or(ApiError::ReauthRequired)?;
        let res = build().bearer_auth(&token).send().await?;
        if res.status() != StatusCode::UNAUTHORIZED {
            return check(res).await;
        }

        info!("Access token rejected, refreshing");
        let token = self.refresh().await?;
        let res = build().bearer_auth(&token).send().await?;
        if res.status() == StatusCode::UNAUTHORIZED {
            warn!("Request still unauthorized after refresh");
            self.auth.clear_credentials();
            return Err(ApiError::ReauthRequired);
        }
        check(res).await
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>, ApiError> {
        let url = self.url("/documents");
        let res = self.send_authorized(|| self.client.get(&url)).await?;
        Ok(res.json().await?)
    }

    pub async fn create_document(&self, title: &str) -> Result<CreateDocumentResponse, ApiError> {
        let url = self.url("/documents");
        let res = self
            .send_authorized(|| self.client.post(&url).json(&CreateDocumentRequest { title }))
            .await?;
        Ok(res.json().await?)
    }

    pub async fn get_document(&self, doc_id: &str) -> Result<Document, ApiError> {
        let url = self.url(&format!("/documents/{}", doc_id));
        let res = self.send_authorized(|| self.client.get(&url)).await?;
        Ok(res.json().await?)
    }

    pub async fn save_document(&self, doc_id: &str, content: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("/documents/{}", doc_id));
        let username = self.auth.identity().username.as_deref();
        self.send_authorized(|| {
            self.client
                .post(&url)
                .json(&SaveDocumentRequest { content, username })
        })
        .await?;
        debug!("Saved document {} ({} bytes)", doc_id, content.len());
        Ok(())
    }

    pub async fn delete_document(&self, doc_id: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("/documents/{}", doc_id));
        self.send_authorized(|| self.client.delete(&url)).await?;
        info!("Deleted document {}", doc_id);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for ApiClient {
    async fn save(&self, doc_id: &str, content: &str) -> Result<(), String> {
        self.save_document(doc_id, content)
            .await
            .map_err(|e| e.to_string())
    }
}

// Turn a non-success status into an ApiError carrying the backend's message
async fn check(res: Response) -> Result<Response, ApiError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let message = res
        .json::<ErrorResponse>()
        .await
        .ok()
        .and_then(ErrorResponse::into_message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}
