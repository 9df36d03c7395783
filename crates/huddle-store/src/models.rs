//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` so it can be handed directly to the HTTP
//! layer; field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use huddle_shared::{ChatId, ChatKind, MessageId, MessageKind, RoomId, RoomMedia, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    /// Optional human-readable display name.
    pub name: Option<String>,
    pub email: Option<String>,
    /// Optional avatar image URL.
    pub image: Option<String>,
    /// Created through anonymous sign-in.
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Name shown for this user: display name, then email.
    pub fn label(&self) -> Option<&str> {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.email.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An opaque bearer token bound to a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// A direct or group conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: ChatId,
    pub name: String,
    pub kind: ChatKind,
    /// Participants in the order they were added.  Never empty, never
    /// contains duplicates, always contains `created_by`.
    pub participants: Vec<UserId>,
    pub created_by: UserId,
    pub avatar: Option<String>,
    /// Denormalized copy of the newest message's content.
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn has_participant(&self, user: &UserId) -> bool {
        self.participants.contains(user)
    }
}

/// A chat as listed for one of its participants.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    #[serde(flatten)]
    pub chat: Chat,
    /// Resolved participant records; ids without a user row are dropped.
    pub members: Vec<User>,
    pub latest_message: Option<Message>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message.  Messages are immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    /// Text body, or the file name label of an image.
    pub content: String,
    #[serde(flatten)]
    pub kind: MessageKind,
    /// Assigned by the store; never earlier than the previous message.
    pub created_at: DateTime<Utc>,
}

/// A message together with its sender's record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntry {
    pub message: Message,
    pub sender: Option<User>,
}

// ---------------------------------------------------------------------------
// Call room
// ---------------------------------------------------------------------------

/// One voice or video call session scoped to a chat.
///
/// Lifecycle: created active with its creator inside; once the participant
/// set drains the room is inactive for good.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CallRoom {
    pub id: RoomId,
    pub name: String,
    pub chat_id: ChatId,
    pub is_active: bool,
    /// Users currently in the call, in join order.
    pub participants: Vec<UserId>,
    #[serde(flatten)]
    pub media: RoomMedia,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}
