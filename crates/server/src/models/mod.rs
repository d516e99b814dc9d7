use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat room with its membership set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub topic: String,
    #[serde(default)]
    pub description: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    /// Unique user ids; mutated only through join/leave
    pub members: Vec<String>,
    pub member_count: usize,
}

impl Room {
    /// Create a room with the creator auto-joined
    pub fn new(
        name: impl Into<String>,
        topic: impl Into<String>,
        description: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        let created_by = created_by.into();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            topic: topic.into(),
            description: description.into(),
            created_by: created_by.clone(),
            created_at: Utc::now(),
            members: vec![created_by],
            member_count: 1,
        }
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }
}

/// A single chat message, immutable once appended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub room_id: String,
    /// Position in the room's total order; strictly increasing, never reused
    pub seq: u64,
    pub content: String,
    pub sender: String,
    /// Display name snapshot taken at send time
    pub sender_name: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(
        room_id: impl Into<String>,
        seq: u64,
        content: impl Into<String>,
        sender: impl Into<String>,
        sender_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            room_id: room_id.into(),
            seq,
            content: content.into(),
            sender: sender.into(),
            sender_name: sender_name.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Derived fact-check annotation, produced asynchronously after a message
/// is appended. Correlated to its message by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactCheck {
    pub id: String,
    pub room_id: String,
    pub message_id: String,
    /// Content snapshot of the message that triggered the check
    pub original_message: String,
    pub fact_check_response: String,
    pub timestamp: DateTime<Utc>,
}

impl FactCheck {
    pub fn new(
        room_id: impl Into<String>,
        message_id: impl Into<String>,
        original_message: impl Into<String>,
        fact_check_response: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            room_id: room_id.into(),
            message_id: message_id.into(),
            original_message: original_message.into(),
            fact_check_response: fact_check_response.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Input for creating a room
#[derive(Debug, Deserialize)]
pub struct CreateRoomInput {
    pub name: String,
    pub topic: String,
    #[serde(default)]
    pub description: String,
}

/// Input for sending a message
#[derive(Debug, Deserialize)]
pub struct SendMessageInput {
    pub content: String,
}
