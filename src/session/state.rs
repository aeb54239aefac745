use crate::models::{DocChangeMessage, DocUpdateMessage};

/// What happened to an inbound `doc_update`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// Our own broadcast relayed back
    Echo,
    /// Content was not text
    Malformed,
    /// Same as the buffer already
    Unchanged,
    /// Buffer replaced; the echo window is open
    Applied,
}

/// Buffer and flags of one collaborative session, without any timers.
///
/// Last writer wins: an applied remote update replaces the whole buffer.
#[derive(Debug, Clone)]
pub struct SessionState {
    document_id: String,
    client_id: String,
    content: String,
    applying_remote: bool,
}

impl SessionState {
    pub fn new(document_id: impl Into<String>, client_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            client_id: client_id.into(),
            content: content.into(),
            applying_remote: false,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn applying_remote(&self) -> bool {
        self.applying_remote
    }

    pub fn apply_remote(&mut self, update: &DocUpdateMessage) -> RemoteOutcome {
        if update.client_id.as_deref() == Some(self.client_id.as_str()) {
            return RemoteOutcome::Echo;
        }
        let Some(incoming) = update.content.as_str() else {
            return RemoteOutcome::Malformed;
        };
        if incoming == self.content {
            return RemoteOutcome::Unchanged;
        }
        self.applying_remote = true;
        self.content = incoming.to_string();
        RemoteOutcome::Applied
    }

    /// Close the echo window opened by `apply_remote`
    pub fn finish_remote(&mut self) {
        self.applying_remote = false;
    }

    /// Returns false when the buffer already holds this content
    pub fn local_change(&mut self, content: String) -> bool {
        if content == self.content {
            return false;
        }
        self.content = content;
        true
    }

    /// The `doc_change` to send now, unless a remote update is being applied
    pub fn broadcast_message(&self) -> Option<DocChangeMessage> {
        if self.applying_remote {
            return None;
        }
        Some(DocChangeMessage {
            doc_id: self.document_id.clone(),
            content: self.content.clone(),
            client_id: self.client_id.clone(),
        })
    }

    /// Content worth autosaving, i.e. anything but blank
    pub fn autosave_content(&self) -> Option<&str> {
        if self.content.trim().is_empty() {
            None
        } else {
            Some(&self.content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn own_echo_leaves_buffer_alone() {
        let mut state = SessionState::new("d1", "abc", "hello");
        assert_eq!(state.apply_remote(&DocUpdateMessage::text("world", "abc")), RemoteOutcome::Echo);
        assert_eq!(state.content(), "hello");
        assert!(!state.applying_remote());

        assert_eq!(state.apply_remote(&DocUpdateMessage::text("world", "xyz")), RemoteOutcome::Applied);
        assert_eq!(state.content(), "world");
        assert!(state.applying_remote());
    }

    #[test]
    fn non_text_payloads_are_discarded() {
        let mut state = SessionState::new("d1", "abc", "hello");
        let update = DocUpdateMessage {
            content: json!({"ops": []}),
            client_id: Some("xyz".to_string()),
        };
        assert_eq!(state.apply_remote(&update), RemoteOutcome::Malformed);
        assert_eq!(state.apply_remote(&DocUpdateMessage::default()), RemoteOutcome::Malformed);
        assert_eq!(state.content(), "hello");
    }

    #[test]
    fn identical_payload_does_not_open_echo_window() {
        let mut state = SessionState::new("d1", "abc", "hello");
        assert_eq!(state.apply_remote(&DocUpdateMessage::text("hello", "xyz")), RemoteOutcome::Unchanged);
        assert!(!state.applying_remote());
    }

    #[test]
    fn update_without_client_id_is_applied() {
        let mut state = SessionState::new("d1", "abc", "hello");
        let update = DocUpdateMessage {
            content: json!("anonymous"),
            client_id: None,
        };
        assert_eq!(state.apply_remote(&update), RemoteOutcome::Applied);
    }

    #[test]
    fn later_remote_update_wins() {
        let mut state = SessionState::new("d1", "abc", "");
        state.apply_remote(&DocUpdateMessage::text("from a", "a"));
        state.apply_remote(&DocUpdateMessage::text("from b", "b"));
        assert_eq!(state.content(), "from b");
    }

    #[test]
    fn broadcast_is_withheld_during_echo_window() {
        let mut state = SessionState::new("d1", "abc", "");
        assert!(state.local_change("typed".to_string()));
        assert_eq!(
            state.broadcast_message(),
            Some(DocChangeMessage {
                doc_id: "d1".to_string(),
                content: "typed".to_string(),
                client_id: "abc".to_string(),
            })
        );

        state.apply_remote(&DocUpdateMessage::text("remote", "xyz"));
        assert_eq!(state.broadcast_message(), None);
        state.finish_remote();
        assert_eq!(state.broadcast_message().map(|m| m.content), Some("remote".to_string()));
    }

    #[test]
    fn unchanged_local_content_is_not_a_change() {
        let mut state = SessionState::new("d1", "abc", "same");
        assert!(!state.local_change("same".to_string()));
    }

    #[test]
    fn blank_content_is_never_autosaved() {
        let mut state = SessionState::new("d1", "abc", "");
        assert_eq!(state.autosave_content(), None);
        state.local_change("  \n ".to_string());
        assert_eq!(state.autosave_content(), None);
        state.local_change("text".to_string());
        assert_eq!(state.autosave_content(), Some("text"));
    }
}
