use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Incoming WebSocket message from client
#[derive(Debug, Deserialize)]
pub struct WebSocketMessage {
    pub action: String,
    #[serde(flatten)]
    pub data: Value,
}

/// Actions accepted on the `$default` route.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebSocketAction {
    SendChatMessage,
    ReplyTicket,
    Ping,
}

impl WebSocketAction {
    pub fn parse(action: &str) -> Option<Self> {
        serde_json::from_value(Value::String(action.to_string())).ok()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatMessagePayload {
    pub chat_id: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct TicketReplyPayload {
    pub ticket_id: String,
    pub body: String,
}

/// Kind of store change a live update reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    /// Map a DynamoDB stream event name.
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "INSERT" => Some(ChangeKind::Created),
            "MODIFY" => Some(ChangeKind::Updated),
            "REMOVE" => Some(ChangeKind::Deleted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// Live update pushed to subscribed clients, e.g. `{"type": "chat_message_created", ...}`.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct BroadcastMessage {
    pub r#type: String,
    #[serde(flatten)]
    pub data: Value,
}

impl BroadcastMessage {
    pub fn new(message_type: &str, data: Value) -> Self {
        Self {
            r#type: message_type.to_string(),
            data,
        }
    }

    pub fn change(entity_type: &str, kind: ChangeKind, data: Value) -> Self {
        Self::new(&format!("{}_{}", entity_type, kind.as_str()), data)
    }
}
