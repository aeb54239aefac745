use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::state::{RemoteOutcome, SessionState};
use super::timer::PendingTimer;
use super::{DocumentStore, SaveStatus, SessionEvent, SessionTimings};
use crate::models::{InboundEvent, JoinDocMessage, LeaveDocMessage, OutboundEvent};
use crate::ws::RelayLink;

#[derive(Debug)]
enum SessionCommand {
    Edit(String),
    Save,
    Content(oneshot::Sender<String>),
    Close(oneshot::Sender<()>),
}

/// One open document: buffer, relay membership and the timers around them.
///
/// Runs as a single task; commands, relay events and timer expiries are
/// handled one at a time, so nothing here needs a lock.
pub struct Session {
    state: SessionState,
    user: String,
    relay: RelayLink,
    relay_events: Option<mpsc::UnboundedReceiver<InboundEvent>>,
    store: Arc<dyn DocumentStore>,
    timings: SessionTimings,
    events: mpsc::UnboundedSender<SessionEvent>,
    broadcast_timer: PendingTimer,
    echo_timer: PendingTimer,
    save_timer: PendingTimer,
    status_timer: PendingTimer,
    save_status: SaveStatus,
    save_results_tx: mpsc::UnboundedSender<Result<(), String>>,
    save_results: mpsc::UnboundedReceiver<Result<(), String>>,
}

impl Session {
    pub fn new(
        document_id: impl Into<String>,
        content: impl Into<String>,
        user: impl Into<String>,
        relay: RelayLink,
        relay_events: Option<mpsc::UnboundedReceiver<InboundEvent>>,
        store: Arc<dyn DocumentStore>,
        timings: SessionTimings,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let client_id = Uuid::new_v4().simple().to_string();
        let (events, events_rx) = mpsc::unbounded_channel();
        let (save_results_tx, save_results) = mpsc::unbounded_channel();
        let session = Self {
            state: SessionState::new(document_id, client_id, content),
            user: user.into(),
            relay,
            relay_events,
            store,
            timings,
            events,
            broadcast_timer: PendingTimer::default(),
            echo_timer: PendingTimer::default(),
            save_timer: PendingTimer::default(),
            status_timer: PendingTimer::default(),
            save_status: SaveStatus::Idle,
            save_results_tx,
            save_results,
        };
        (session, events_rx)
    }

    /// Start the session task. The join notification goes out first.
    pub fn spawn(self) -> SessionHandle {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let document_id = self.state.document_id().to_string();
        let client_id = self.state.client_id().to_string();
        let task = tokio::spawn(self.run(commands_rx));
        SessionHandle {
            document_id,
            client_id,
            commands,
            task,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        self.join();

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(SessionCommand::Edit(content)) => self.on_local_change(content),
                    Some(SessionCommand::Save) => self.start_save(self.state.content().to_string()),
                    Some(SessionCommand::Content(reply)) => {
                        let _ = reply.send(self.state.content().to_string());
                    }
                    Some(SessionCommand::Close(done)) => {
                        self.leave();
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        self.leave();
                        break;
                    }
                },
                event = next_relay_event(&mut self.relay_events) => match event {
                    Some(event) => self.on_relay_event(event),
                    None => {
                        warn!("Relay gone for document {}, continuing offline", self.state.document_id());
                        self.relay_events = None;
                        self.emit(SessionEvent::RelayClosed);
                    }
                },
                _ = self.broadcast_timer.fired() => self.on_broadcast_due(),
                _ = self.echo_timer.fired() => self.state.finish_remote(),
                _ = self.save_timer.fired() => {
                    if let Some(content) = self.state.autosave_content() {
                        let content = content.to_string();
                        self.start_save(content);
                    }
                }
                _ = self.status_timer.fired() => self.set_status(SaveStatus::Idle),
                Some(result) = self.save_results.recv() => self.on_save_finished(result),
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn join(&self) {
        if !self.relay.is_connected() {
            info!("Editing document {} offline", self.state.document_id());
            return;
        }
        info!("Joining document {} as {}", self.state.document_id(), self.user);
        self.relay.emit(OutboundEvent::JoinDoc(JoinDocMessage {
            doc_id: self.state.document_id().to_string(),
            user: self.user.clone(),
        }));
    }

    // Best effort: a dead relay just drops both
    fn leave(&self) {
        info!("Leaving document {}", self.state.document_id());
        self.relay.emit(OutboundEvent::LeaveDoc(LeaveDocMessage {
            doc_id: self.state.document_id().to_string(),
            user: self.user.clone(),
        }));
        self.relay.disconnect();
    }

    fn on_local_change(&mut self, content: String) {
        if !self.state.local_change(content) {
            return;
        }
        self.broadcast_timer.arm(self.timings.broadcast_debounce);
        self.save_timer.arm(self.timings.autosave_delay);
    }

    fn on_broadcast_due(&mut self) {
        match self.state.broadcast_message() {
            Some(change) => {
                debug!("Broadcasting {} bytes for document {}", change.content.len(), change.doc_id);
                self.relay.emit(OutboundEvent::DocChange(change));
            }
            None => debug!("Skipping broadcast while a remote update is applied"),
        }
    }

    fn on_relay_event(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::DocUpdate(update) => match self.state.apply_remote(&update) {
                RemoteOutcome::Applied => {
                    debug!("Applied remote update for document {}", self.state.document_id());
                    self.echo_timer.arm(self.timings.echo_window);
                    self.save_timer.arm(self.timings.autosave_delay);
                    self.emit(SessionEvent::ContentReplaced(self.state.content().to_string()));
                }
                outcome => debug!("Ignoring remote update: {:?}", outcome),
            },
            InboundEvent::Presence(presence) => self.emit(SessionEvent::Presence(presence)),
            InboundEvent::Other(name) => debug!("Ignoring relay event '{}'", name),
        }
    }

    fn set_status(&mut self, status: SaveStatus) {
        if self.save_status != status {
            self.save_status = status;
            self.emit(SessionEvent::SaveStatus(status));
        }
    }

    // Saves run in their own task so a slow backend never holds up the relay
    fn start_save(&mut self, content: String) {
        self.status_timer.cancel();
        self.set_status(SaveStatus::Saving);
        let store = self.store.clone();
        let results = self.save_results_tx.clone();
        let doc_id = self.state.document_id().to_string();
        tokio::spawn(async move {
            let result = store.save(&doc_id, &content).await;
            let _ = results.send(result);
        });
    }

    fn on_save_finished(&mut self, result: Result<(), String>) {
        match result {
            Ok(()) => {
                self.set_status(SaveStatus::Saved);
                self.status_timer.arm(self.timings.saved_status);
            }
            Err(message) => {
                warn!("Failed to save document {}: {}", self.state.document_id(), message);
                self.emit(SessionEvent::SaveFailed(message));
                self.set_status(SaveStatus::Idle);
            }
        }
    }
}

async fn next_relay_event(events: &mut Option<mpsc::UnboundedReceiver<InboundEvent>>) -> Option<InboundEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Control side of a running [`Session`]. Dropping it closes the session.
#[derive(Debug)]
pub struct SessionHandle {
    document_id: String,
    client_id: String,
    commands: mpsc::UnboundedSender<SessionCommand>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Replace the buffer with locally edited content
    pub fn edit(&self, content: impl Into<String>) {
        let _ = self.commands.send(SessionCommand::Edit(content.into()));
    }

    /// Save right away, whatever the buffer holds
    pub fn save(&self) {
        let _ = self.commands.send(SessionCommand::Save);
    }

    pub async fn content(&self) -> Option<String> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(SessionCommand::Content(reply)).ok()?;
        rx.await.ok()
    }

    /// Leave the document and stop the session. Never fails.
    pub async fn close(self) {
        let (done, rx) = oneshot::channel();
        if self.commands.send(SessionCommand::Close(done)).is_ok() {
            let _ = rx.await;
        }
        if let Err(e) = self.task.await {
            debug!("Session task for {} ended abnormally: {}", self.document_id, e);
        }
    }
}
