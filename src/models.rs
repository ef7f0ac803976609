//! Data models for conversations, messages and notifications
//!
//! This module contains the records exchanged between the stores, the
//! messaging service and its callers, together with their SQLite encodings.

use chrono::{DateTime, NaiveTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User identifier as issued by the external user directory
pub type UserId = i64;
/// Conversation primary key
pub type ConversationId = i64;
/// Message primary key
pub type MessageId = i64;

/// Text substituted for the content of a soft-deleted message
pub const DELETED_MESSAGE_TEXT: &str = "This message was deleted";

/// Implements text storage and `Display`/`FromStr` for a unit-only enum.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Stored representation
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {}: {other}", stringify!($name))),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

/// Conversation lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    /// Visible in the inbox
    #[default]
    Active,
    /// Hidden from the default inbox, still readable
    Archived,
    /// Removed by the user; terminal
    Deleted,
}

text_enum!(ConversationStatus {
    Active => "active",
    Archived => "archived",
    Deleted => "deleted",
});

/// Kind of message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain text
    #[default]
    Text,
    /// Image attachment
    Image,
    /// Other file attachment
    File,
    /// Generated by the platform
    System,
}

text_enum!(MessageType {
    Text => "text",
    Image => "image",
    File => "file",
    System => "system",
});

/// Notification urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    /// Batched or digest-worthy
    Low,
    /// Default for message events
    #[default]
    Normal,
    /// Time sensitive
    High,
}

text_enum!(NotificationPriority {
    Low => "low",
    Normal => "normal",
    High => "high",
});

/// A conversation between exactly two participants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Database primary key
    pub id: ConversationId,
    /// Participant that opened the conversation
    pub participant_1_id: UserId,
    /// The other participant (or the AI assistant)
    pub participant_2_id: UserId,
    /// True for conversations with the AI assistant
    pub is_ai_conversation: bool,
    /// Lifecycle state
    pub status: ConversationStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
    /// Timestamp of the newest message, if any
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// True if `user_id` is one of the two participants
    #[must_use]
    pub const fn has_participant(&self, user_id: UserId) -> bool {
        self.participant_1_id == user_id || self.participant_2_id == user_id
    }

    /// The participant that is not `user_id`.
    ///
    /// For a user talking to themselves this is the user again.
    #[must_use]
    pub const fn other_participant(&self, user_id: UserId) -> UserId {
        if self.participant_1_id == user_id {
            self.participant_2_id
        } else {
            self.participant_1_id
        }
    }
}

/// File reference attached to a message. Binary storage is handled elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// URL or storage path
    pub url: String,
    /// Filename as uploaded
    pub original_name: String,
    /// Size in bytes
    pub size_bytes: i64,
}

/// A message, hydrated with sender display metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Database primary key
    pub id: MessageId,
    /// Owning conversation
    pub conversation_id: ConversationId,
    /// Author
    pub sender_id: UserId,
    /// Message text; `None` for attachment-only messages
    pub text: Option<String>,
    /// Payload kind
    pub message_type: MessageType,
    /// Optional file reference
    pub attachment: Option<Attachment>,
    /// True once the recipient has read the message
    pub is_read: bool,
    /// When the message was read
    pub read_at: Option<DateTime<Utc>>,
    /// True once the sender deleted the message
    pub is_deleted: bool,
    /// When the message was deleted
    pub deleted_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Sender display name from the user directory
    pub sender_name: Option<String>,
    /// Sender profile picture from the user directory
    pub sender_picture: Option<String>,
}

/// Data for appending a message
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Owning conversation
    pub conversation_id: ConversationId,
    /// Author
    pub sender_id: UserId,
    /// Message text
    pub text: Option<String>,
    /// Payload kind
    pub message_type: MessageType,
    /// Optional file reference
    pub attachment: Option<Attachment>,
}

/// Inbox row: a conversation seen from one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// The conversation itself
    pub conversation: Conversation,
    /// The participant that is not the viewer
    pub other_user_id: UserId,
    /// Their display name
    pub other_user_name: Option<String>,
    /// Their profile picture
    pub other_user_picture: Option<String>,
    /// Text of the newest visible message
    pub last_message: Option<String>,
    /// Type of the newest visible message
    pub last_message_type: Option<MessageType>,
    /// Time of the newest visible message
    pub last_message_time: Option<DateTime<Utc>>,
    /// Messages from the other side not yet read by the viewer
    pub unread_count: i64,
}

/// Search result with conversation context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Matching message
    pub message: Message,
    /// The participant that is not the searching user
    pub other_user_id: UserId,
    /// Their display name
    pub other_user_name: Option<String>,
}

/// A persisted new-message notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Database primary key
    pub id: i64,
    /// User being notified
    pub recipient_id: UserId,
    /// Author of the message
    pub sender_id: UserId,
    /// Conversation of the message
    pub conversation_id: ConversationId,
    /// Source message
    pub message_id: MessageId,
    /// Notification type, `new_message` for message events
    pub notification_type: String,
    /// Headline
    pub title: String,
    /// Truncated message text
    pub preview: String,
    /// Urgency
    pub priority: NotificationPriority,
    /// True once the recipient opened it
    pub is_read: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Per-user notification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreference {
    /// Owning user
    pub user_id: UserId,
    /// Master switch for new-message notifications
    pub new_messages_enabled: bool,
    /// Email copies of new-message notifications
    pub email_notifications_enabled: bool,
    /// Whether the quiet-hours window applies
    pub quiet_hours_enabled: bool,
    /// Window start, inclusive
    pub quiet_hours_start: Option<NaiveTime>,
    /// Window end, inclusive
    pub quiet_hours_end: Option<NaiveTime>,
}

impl NotificationPreference {
    /// Preferences a user gets when they first opt in
    #[must_use]
    pub const fn enabled(user_id: UserId) -> Self {
        Self {
            user_id,
            new_messages_enabled: true,
            email_notifications_enabled: false,
            quiet_hours_enabled: false,
            quiet_hours_start: None,
            quiet_hours_end: None,
        }
    }
}

/// Entry in the user directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User identifier
    pub id: UserId,
    /// Name shown to other users
    pub display_name: String,
    /// Avatar reference
    pub profile_picture: Option<String>,
    /// Address used by the email channel
    pub email: Option<String>,
}

/// Queued email produced by the email channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEmail {
    /// Database primary key
    pub id: i64,
    /// User being emailed
    pub recipient_id: UserId,
    /// Destination address
    pub recipient_email: String,
    /// Subject line
    pub subject: String,
    /// Plain text body
    pub body: String,
    /// Source message
    pub message_id: MessageId,
    /// Queue timestamp
    pub created_at: DateTime<Utc>,
    /// Delivery timestamp, set by the mailer
    pub sent_at: Option<DateTime<Utc>>,
}

/// Pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Maximum number of rows
    pub limit: u32,
    /// Rows to skip
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { limit: 50, offset: 0 }
    }
}
