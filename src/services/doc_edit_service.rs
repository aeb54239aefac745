use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::clients::api_client::{ApiClient, ApiError};
use crate::models::Document;
use crate::session::{DocumentStore, Session, SessionEvent, SessionHandle, SessionTimings};
use crate::ws::{self, RelayLink};

/// A document opened for editing
pub struct OpenedDocument {
    pub document: Document,
    pub handle: SessionHandle,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

/// The current session, still open, after a switch that could not load its target
pub struct SwitchFailed {
    pub current: SessionHandle,
    pub error: ApiError,
}

// Open a document: load it over REST, then join its relay room.
// A relay that can't be reached leaves the session editing offline.
pub async fn open_document(
    api: &ApiClient,
    relay_url: &str,
    doc_id: &str,
    timings: SessionTimings,
) -> Result<OpenedDocument, ApiError> {
    let document = api.get_document(doc_id).await?;
    Ok(attach(api, relay_url, doc_id, document, timings).await)
}

/// Replace the current session with one on another document.
///
/// The current session is only closed once the new document has loaded, so
/// a bad id leaves it running with its pending edits and timers.
pub async fn switch_document(
    current: SessionHandle,
    api: &ApiClient,
    relay_url: &str,
    doc_id: &str,
    timings: SessionTimings,
) -> Result<OpenedDocument, SwitchFailed> {
    let document = match api.get_document(doc_id).await {
        Ok(document) => document,
        Err(error) => {
            warn!("Can't switch to document {}, staying on {}: {}", doc_id, current.document_id(), error);
            return Err(SwitchFailed { current, error });
        }
    };
    current.close().await;
    Ok(attach(api, relay_url, doc_id, document, timings).await)
}

async fn attach(
    api: &ApiClient,
    relay_url: &str,
    doc_id: &str,
    document: Document,
    timings: SessionTimings,
) -> OpenedDocument {
    info!("Opened document '{}' ({})", document.title, doc_id);

    let (relay, relay_events) = match ws::connect(relay_url).await {
        Ok(conn) => (conn.link, Some(conn.events)),
        Err(e) => {
            warn!("Relay unavailable for document {}, editing offline: {}", doc_id, e);
            (RelayLink::offline(), None)
        }
    };

    let store: Arc<dyn DocumentStore> = Arc::new(api.clone());
    let (session, events) = Session::new(
        doc_id,
        document.content(),
        api.auth().display_name(),
        relay,
        relay_events,
        store,
        timings,
    );

    OpenedDocument {
        document,
        handle: session.spawn(),
        events,
    }
}
