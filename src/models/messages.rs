use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of `join_doc`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JoinDocMessage {
    pub doc_id: String,
    pub user: String,
}

/// Payload of `leave_doc`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LeaveDocMessage {
    pub doc_id: String,
    pub user: String,
}

/// Payload of `doc_change`, the full buffer of one client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DocChangeMessage {
    pub doc_id: String,
    pub content: String,
    pub client_id: String,
}

/// Payload of `doc_update` as relayed to the other members of a document room.
///
/// `content` is kept as a raw JSON value: the relay forwards whatever the
/// sender put there, and anything that is not a string gets discarded by the
/// session.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DocUpdateMessage {
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub client_id: Option<String>,
}

impl DocUpdateMessage {
    pub fn text(content: &str, client_id: &str) -> Self {
        Self {
            content: Value::String(content.to_string()),
            client_id: Some(client_id.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PresenceKind {
    Join,
    Leave,
}

/// Payload of `presence`, sent by the relay when someone joins or leaves
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PresenceMessage {
    pub event: PresenceKind,
    #[serde(default)]
    pub user: Option<String>,
}

/// Events this client emits on the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    JoinDoc(JoinDocMessage),
    LeaveDoc(LeaveDocMessage),
    DocChange(DocChangeMessage),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::JoinDoc(_) => "join_doc",
            OutboundEvent::LeaveDoc(_) => "leave_doc",
            OutboundEvent::DocChange(_) => "doc_change",
        }
    }

    pub fn payload(&self) -> Value {
        let payload = match self {
            OutboundEvent::JoinDoc(msg) => serde_json::to_value(msg),
            OutboundEvent::LeaveDoc(msg) => serde_json::to_value(msg),
            OutboundEvent::DocChange(msg) => serde_json::to_value(msg),
        };
        // Plain structs of strings always serialize
        payload.unwrap_or(Value::Null)
    }
}

/// Events received from the relay
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    DocUpdate(DocUpdateMessage),
    Presence(PresenceMessage),
    Other(String),
}

impl InboundEvent {
    /// Map a named Socket.IO event onto a typed event.
    ///
    /// A `doc_update` whose payload is not an object still becomes a
    /// `DocUpdate`, with no content, so the session gets to discard it.
    pub fn from_event(name: &str, payload: Value) -> Self {
        match name {
            "doc_update" => {
                InboundEvent::DocUpdate(serde_json::from_value(payload).unwrap_or_default())
            }
            "presence" => match serde_json::from_value(payload) {
                Ok(presence) => InboundEvent::Presence(presence),
                Err(_) => InboundEvent::Other(name.to_string()),
            },
            other => InboundEvent::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn doc_update_keeps_non_string_content_for_the_session_to_reject() {
        let event = InboundEvent::from_event("doc_update", json!({"content": 42, "client_id": "xyz"}));
        match event {
            InboundEvent::DocUpdate(update) => {
                assert_eq!(update.content, json!(42));
                assert_eq!(update.client_id.as_deref(), Some("xyz"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn doc_update_without_object_payload_has_no_content() {
        let event = InboundEvent::from_event("doc_update", Value::Null);
        assert_eq!(event, InboundEvent::DocUpdate(DocUpdateMessage::default()));
    }

    #[test]
    fn presence_parses_join_and_leave() {
        let event = InboundEvent::from_event("presence", json!({"event": "leave", "user": "ana"}));
        assert_eq!(
            event,
            InboundEvent::Presence(PresenceMessage {
                event: PresenceKind::Leave,
                user: Some("ana".to_string()),
            })
        );
    }

    #[test]
    fn outbound_events_carry_backend_field_names() {
        let event = OutboundEvent::DocChange(DocChangeMessage {
            doc_id: "d1".to_string(),
            content: "hi".to_string(),
            client_id: "abc".to_string(),
        });
        assert_eq!(event.name(), "doc_change");
        assert_eq!(event.payload(), json!({"doc_id": "d1", "content": "hi", "client_id": "abc"}));
    }
}
