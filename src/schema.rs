//! Database schema definitions
//!
//! Table and column names used with rusqlite. The DDL itself lives in
//! `migrations/` and is embedded by [`crate::db::Database`].

/// Users table schema (user directory)
pub mod users {
    /// Table name
    pub const TABLE: &str = "users";
    /// Primary key column
    pub const ID: &str = "id";
    /// Display name column
    pub const DISPLAY_NAME: &str = "display_name";
    /// Profile picture reference column
    pub const PROFILE_PICTURE: &str = "profile_picture";
    /// Email address column
    pub const EMAIL: &str = "email";
}

/// Conversations table schema
pub mod conversations {
    /// Table name
    pub const TABLE: &str = "conversations";
    /// Primary key column
    pub const ID: &str = "id";
    /// First participant column
    pub const PARTICIPANT_1_ID: &str = "participant_1_id";
    /// Second participant column
    pub const PARTICIPANT_2_ID: &str = "participant_2_id";
    /// Flag for conversations with the AI assistant
    pub const IS_AI_CONVERSATION: &str = "is_ai_conversation";
    /// Lifecycle status column (active, archived, deleted)
    pub const STATUS: &str = "status";
    /// Creation timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Last modification timestamp column
    pub const UPDATED_AT: &str = "updated_at";
    /// Timestamp of the newest message
    pub const LAST_MESSAGE_AT: &str = "last_message_at";
}

/// Messages table schema
pub mod messages {
    /// Table name
    pub const TABLE: &str = "messages";
    /// Full-text index over message text
    pub const FTS_TABLE: &str = "messages_fts";
    /// Primary key column
    pub const ID: &str = "id";
    /// Owning conversation column
    pub const CONVERSATION_ID: &str = "conversation_id";
    /// Sender column
    pub const SENDER_ID: &str = "sender_id";
    /// Message text column
    pub const TEXT: &str = "text";
    /// Message type column (text, image, file, system)
    pub const MESSAGE_TYPE: &str = "message_type";
    /// Attachment url/path column
    pub const ATTACHMENT_URL: &str = "attachment_url";
    /// Attachment original filename column
    pub const ATTACHMENT_NAME: &str = "attachment_name";
    /// Attachment size in bytes column
    pub const ATTACHMENT_SIZE: &str = "attachment_size";
    /// Read flag column
    pub const IS_READ: &str = "is_read";
    /// Read timestamp column
    pub const READ_AT: &str = "read_at";
    /// Soft-delete flag column
    pub const IS_DELETED: &str = "is_deleted";
    /// Soft-delete timestamp column
    pub const DELETED_AT: &str = "deleted_at";
    /// Creation timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Joined sender display name
    pub const SENDER_NAME: &str = "sender_name";
    /// Joined sender profile picture
    pub const SENDER_PICTURE: &str = "sender_picture";
}

/// Notifications table schema
pub mod notifications {
    /// Table name
    pub const TABLE: &str = "notifications";
    /// Primary key column
    pub const ID: &str = "id";
    /// Recipient column
    pub const RECIPIENT_ID: &str = "recipient_id";
    /// Sender column
    pub const SENDER_ID: &str = "sender_id";
    /// Conversation column
    pub const CONVERSATION_ID: &str = "conversation_id";
    /// Message column
    pub const MESSAGE_ID: &str = "message_id";
    /// Notification type column
    pub const NOTIFICATION_TYPE: &str = "notification_type";
    /// Title column
    pub const TITLE: &str = "title";
    /// Preview text column
    pub const PREVIEW: &str = "preview";
    /// Priority column
    pub const PRIORITY: &str = "priority";
    /// Read flag column
    pub const IS_READ: &str = "is_read";
    /// Creation timestamp column
    pub const CREATED_AT: &str = "created_at";
}

/// Notification preferences table schema
pub mod notification_preferences {
    /// Table name
    pub const TABLE: &str = "notification_preferences";
    /// Owning user column
    pub const USER_ID: &str = "user_id";
    /// New-message notifications switch
    pub const NEW_MESSAGES_ENABLED: &str = "new_messages_enabled";
    /// Email notifications switch
    pub const EMAIL_NOTIFICATIONS_ENABLED: &str = "email_notifications_enabled";
    /// Quiet hours switch
    pub const QUIET_HOURS_ENABLED: &str = "quiet_hours_enabled";
    /// Quiet hours window start (time of day)
    pub const QUIET_HOURS_START: &str = "quiet_hours_start";
    /// Quiet hours window end (time of day)
    pub const QUIET_HOURS_END: &str = "quiet_hours_end";
}

/// Email outbox table schema
pub mod email_outbox {
    /// Table name
    pub const TABLE: &str = "email_outbox";
    /// Primary key column
    pub const ID: &str = "id";
    /// Recipient user column
    pub const RECIPIENT_ID: &str = "recipient_id";
    /// Recipient address column
    pub const RECIPIENT_EMAIL: &str = "recipient_email";
    /// Subject column
    pub const SUBJECT: &str = "subject";
    /// Body column
    pub const BODY: &str = "body";
    /// Source message column
    pub const MESSAGE_ID: &str = "message_id";
    /// Queue timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Set by the external mailer once delivered
    pub const SENT_AT: &str = "sent_at";
}
