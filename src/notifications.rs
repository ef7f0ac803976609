//! Notification policy and delivery channels for message events.
//!
//! [`NotificationPolicy`] holds the pure decision rules. Each channel
//! implements [`Notifier`] on top of it: [`InAppNotifier`] writes the
//! notifications table, [`EmailNotifier`] queues into the email outbox for an
//! external mailer. The messaging service only sees the trait.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::debug;

use crate::config::AppConfig;
use crate::conversations::find_conversation;
use crate::db::{get_user, Database};
use crate::error::{MessagingError, Result};
use crate::models::{
    Conversation, Message, MessageId, Notification, NotificationPreference, NotificationPriority,
    OutboxEmail, UserId,
};
use crate::schema::{email_outbox, notification_preferences, notifications};

/// Notification type for message events
pub const NEW_MESSAGE: &str = "new_message";
/// Preview used for attachment-only messages
const ATTACHMENT_PREVIEW: &str = "Sent an attachment";
/// Name used when the sender is missing from the user directory
const UNKNOWN_SENDER: &str = "Someone";

/// Source of the current time of day, in the recipients' local zone
pub trait Clock: Send + Sync {
    fn time_of_day(&self) -> NaiveTime;
}

/// Wall clock in the server's local zone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn time_of_day(&self) -> NaiveTime {
        Local::now().time()
    }
}

/// Clock frozen at one time of day
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveTime);

impl Clock for FixedClock {
    fn time_of_day(&self) -> NaiveTime {
        self.0
    }
}

/// How a quiet-hours window with `start > end` is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuietHoursMode {
    /// Plain `start <= now <= end`; an overnight window never matches
    #[default]
    SameDay,
    /// An overnight window covers `[start, midnight)` and `[midnight, end]`
    WrapMidnight,
}

impl FromStr for QuietHoursMode {
    type Err = MessagingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "same_day" => Ok(Self::SameDay),
            "wrap_midnight" => Ok(Self::WrapMidnight),
            other => Err(MessagingError::InvalidConfig(format!(
                "unknown quiet hours mode: {other}"
            ))),
        }
    }
}

/// True if `now` falls inside the inclusive window `[start, end]`
#[must_use]
pub fn within_quiet_hours(
    now: NaiveTime,
    start: NaiveTime,
    end: NaiveTime,
    mode: QuietHoursMode,
) -> bool {
    if start <= end {
        return start <= now && now <= end;
    }
    match mode {
        QuietHoursMode::SameDay => false,
        QuietHoursMode::WrapMidnight => now >= start || now <= end,
    }
}

/// First `max_chars` characters of `text`
#[must_use]
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Why a notification was not created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressReason {
    /// The conversation is with the AI assistant
    AiConversation,
    /// The message came from the reserved AI/system sender
    SystemSender,
    /// The recipient never stored preferences
    NoPreferences,
    /// The recipient turned new-message notifications off
    Disabled,
    /// The recipient is inside their quiet hours
    QuietHours,
    /// The recipient did not opt into email copies
    EmailDisabled,
    /// The recipient has no email address on file
    NoEmailAddress,
}

impl SuppressReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AiConversation => "ai_conversation",
            Self::SystemSender => "system_sender",
            Self::NoPreferences => "no_preferences",
            Self::Disabled => "disabled",
            Self::QuietHours => "quiet_hours",
            Self::EmailDisabled => "email_disabled",
            Self::NoEmailAddress => "no_email_address",
        }
    }
}

/// Result of handing a message to a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// A record was created
    Delivered { id: i64 },
    /// Policy decided against notifying
    Suppressed(SuppressReason),
    /// A record for this message already existed
    AlreadyDelivered,
}

impl NotifyOutcome {
    /// Metrics label
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "delivered",
            Self::Suppressed(_) => "suppressed",
            Self::AlreadyDelivered => "duplicate",
        }
    }
}

/// Decision rules shared by every channel
#[derive(Debug, Clone)]
pub struct NotificationPolicy {
    pub ai_sender_id: UserId,
    pub quiet_hours_mode: QuietHoursMode,
    pub preview_chars: usize,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            ai_sender_id: 0,
            quiet_hours_mode: QuietHoursMode::SameDay,
            preview_chars: 100,
        }
    }
}

impl NotificationPolicy {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            ai_sender_id: config.messaging.ai_sender_id,
            quiet_hours_mode: config.notifications.quiet_hours_mode.parse()?,
            preview_chars: config.notifications.preview_chars as usize,
        })
    }

    /// Who should hear about a message from `sender_id` in `conversation`
    pub fn recipient(
        &self,
        conversation: &Conversation,
        sender_id: UserId,
    ) -> std::result::Result<UserId, SuppressReason> {
        if conversation.is_ai_conversation {
            return Err(SuppressReason::AiConversation);
        }
        if sender_id == self.ai_sender_id {
            return Err(SuppressReason::SystemSender);
        }
        Ok(conversation.other_participant(sender_id))
    }

    /// Apply the recipient's stored preferences at time of day `now`
    pub fn check_preferences(
        &self,
        preferences: Option<&NotificationPreference>,
        now: NaiveTime,
    ) -> std::result::Result<(), SuppressReason> {
        let Some(preferences) = preferences else {
            return Err(SuppressReason::NoPreferences);
        };
        if !preferences.new_messages_enabled {
            return Err(SuppressReason::Disabled);
        }
        if preferences.quiet_hours_enabled {
            if let (Some(start), Some(end)) =
                (preferences.quiet_hours_start, preferences.quiet_hours_end)
            {
                if within_quiet_hours(now, start, end, self.quiet_hours_mode) {
                    return Err(SuppressReason::QuietHours);
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn title(sender_name: &str) -> String {
        format!("New message from {sender_name}")
    }

    /// Preview text for a message, at most `preview_chars` characters
    #[must_use]
    pub fn preview(&self, message: &Message) -> String {
        match message.text.as_deref() {
            Some(text) if !text.is_empty() => truncate_preview(text, self.preview_chars),
            _ => truncate_preview(ATTACHMENT_PREVIEW, self.preview_chars),
        }
    }

    /// Run steps shared by all channels: recipient, preferences, quiet hours.
    fn evaluate(
        &self,
        conn: &Connection,
        message: &Message,
        now: NaiveTime,
    ) -> Result<std::result::Result<(UserId, NotificationPreference), SuppressReason>> {
        let conversation = find_conversation(conn, message.conversation_id)?
            .ok_or_else(|| {
                MessagingError::NotFound(format!("conversation {}", message.conversation_id))
            })?;

        let recipient = match self.recipient(&conversation, message.sender_id) {
            Ok(recipient) => recipient,
            Err(reason) => return Ok(Err(reason)),
        };

        let preferences = load_preferences(conn, recipient)?;
        if let Err(reason) = self.check_preferences(preferences.as_ref(), now) {
            return Ok(Err(reason));
        }

        Ok(preferences.map(|p| (recipient, p)).ok_or(SuppressReason::NoPreferences))
    }
}

/// A delivery channel for message notifications
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name, used in logs and metrics
    fn channel(&self) -> &'static str;

    /// Decide on and create a notification for a just-created message
    async fn notify(&self, message: &Message) -> Result<NotifyOutcome>;
}

fn sender_display_name(conn: &Connection, sender_id: UserId) -> Result<String> {
    Ok(get_user(conn, sender_id)?
        .map(|u| u.display_name)
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string()))
}

/// Writes notifications into the in-app notifications table
pub struct InAppNotifier {
    db: Database,
    policy: NotificationPolicy,
    clock: Arc<dyn Clock>,
}

impl InAppNotifier {
    pub fn new(db: Database, policy: NotificationPolicy) -> Self {
        Self::with_clock(db, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, policy: NotificationPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { db, policy, clock }
    }
}

#[async_trait]
impl Notifier for InAppNotifier {
    fn channel(&self) -> &'static str {
        "in_app"
    }

    async fn notify(&self, message: &Message) -> Result<NotifyOutcome> {
        let message = message.clone();
        let policy = self.policy.clone();
        let now = self.clock.time_of_day();

        self.db
            .run(move |conn| {
                let recipient = match policy.evaluate(conn, &message, now)? {
                    Ok((recipient, _)) => recipient,
                    Err(reason) => {
                        debug!(
                            message_id = message.id,
                            reason = reason.as_str(),
                            "In-app notification suppressed"
                        );
                        return Ok(NotifyOutcome::Suppressed(reason));
                    }
                };

                let sender_name = sender_display_name(conn, message.sender_id)?;
                let inserted = conn.execute(
                    &format!(
                        "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}, {}, {})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                         ON CONFLICT DO NOTHING",
                        notifications::TABLE,
                        notifications::RECIPIENT_ID,
                        notifications::SENDER_ID,
                        notifications::CONVERSATION_ID,
                        notifications::MESSAGE_ID,
                        notifications::NOTIFICATION_TYPE,
                        notifications::TITLE,
                        notifications::PREVIEW,
                        notifications::PRIORITY,
                        notifications::CREATED_AT
                    ),
                    params![
                        recipient,
                        message.sender_id,
                        message.conversation_id,
                        message.id,
                        NEW_MESSAGE,
                        NotificationPolicy::title(&sender_name),
                        policy.preview(&message),
                        NotificationPriority::Normal,
                        Utc::now()
                    ],
                )?;

                if inserted == 0 {
                    return Ok(NotifyOutcome::AlreadyDelivered);
                }
                let id = conn.last_insert_rowid();
                debug!(
                    notification_id = id,
                    message_id = message.id,
                    recipient,
                    "In-app notification created"
                );
                Ok(NotifyOutcome::Delivered { id })
            })
            .await
    }
}

/// Queues notification emails into the outbox for an external mailer
pub struct EmailNotifier {
    db: Database,
    policy: NotificationPolicy,
    clock: Arc<dyn Clock>,
}

impl EmailNotifier {
    pub fn new(db: Database, policy: NotificationPolicy) -> Self {
        Self::with_clock(db, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, policy: NotificationPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { db, policy, clock }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> &'static str {
        "email"
    }

    async fn notify(&self, message: &Message) -> Result<NotifyOutcome> {
        let message = message.clone();
        let policy = self.policy.clone();
        let now = self.clock.time_of_day();

        self.db
            .run(move |conn| {
                let (recipient, preferences) = match policy.evaluate(conn, &message, now)? {
                    Ok(found) => found,
                    Err(reason) => return Ok(NotifyOutcome::Suppressed(reason)),
                };
                if !preferences.email_notifications_enabled {
                    return Ok(NotifyOutcome::Suppressed(SuppressReason::EmailDisabled));
                }
                let Some(address) = get_user(conn, recipient)?.and_then(|u| u.email) else {
                    return Ok(NotifyOutcome::Suppressed(SuppressReason::NoEmailAddress));
                };

                let sender_name = sender_display_name(conn, message.sender_id)?;
                let body = format!(
                    "{sender_name} sent you a message:\n\n{}",
                    policy.preview(&message)
                );
                let inserted = conn.execute(
                    &format!(
                        "INSERT INTO {} ({}, {}, {}, {}, {}, {}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                         ON CONFLICT DO NOTHING",
                        email_outbox::TABLE,
                        email_outbox::RECIPIENT_ID,
                        email_outbox::RECIPIENT_EMAIL,
                        email_outbox::SUBJECT,
                        email_outbox::BODY,
                        email_outbox::MESSAGE_ID,
                        email_outbox::CREATED_AT
                    ),
                    params![
                        recipient,
                        address,
                        NotificationPolicy::title(&sender_name),
                        body,
                        message.id,
                        Utc::now()
                    ],
                )?;

                if inserted == 0 {
                    return Ok(NotifyOutcome::AlreadyDelivered);
                }
                Ok(NotifyOutcome::Delivered {
                    id: conn.last_insert_rowid(),
                })
            })
            .await
    }
}

fn map_notification(row: &Row) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(notifications::ID)?,
        recipient_id: row.get(notifications::RECIPIENT_ID)?,
        sender_id: row.get(notifications::SENDER_ID)?,
        conversation_id: row.get(notifications::CONVERSATION_ID)?,
        message_id: row.get(notifications::MESSAGE_ID)?,
        notification_type: row.get(notifications::NOTIFICATION_TYPE)?,
        title: row.get(notifications::TITLE)?,
        preview: row.get(notifications::PREVIEW)?,
        priority: row.get(notifications::PRIORITY)?,
        is_read: row.get(notifications::IS_READ)?,
        created_at: row.get(notifications::CREATED_AT)?,
    })
}

fn map_preferences(row: &Row) -> rusqlite::Result<NotificationPreference> {
    Ok(NotificationPreference {
        user_id: row.get(notification_preferences::USER_ID)?,
        new_messages_enabled: row.get(notification_preferences::NEW_MESSAGES_ENABLED)?,
        email_notifications_enabled: row
            .get(notification_preferences::EMAIL_NOTIFICATIONS_ENABLED)?,
        quiet_hours_enabled: row.get(notification_preferences::QUIET_HOURS_ENABLED)?,
        quiet_hours_start: row.get(notification_preferences::QUIET_HOURS_START)?,
        quiet_hours_end: row.get(notification_preferences::QUIET_HOURS_END)?,
    })
}

fn map_email(row: &Row) -> rusqlite::Result<OutboxEmail> {
    Ok(OutboxEmail {
        id: row.get(email_outbox::ID)?,
        recipient_id: row.get(email_outbox::RECIPIENT_ID)?,
        recipient_email: row.get(email_outbox::RECIPIENT_EMAIL)?,
        subject: row.get(email_outbox::SUBJECT)?,
        body: row.get(email_outbox::BODY)?,
        message_id: row.get(email_outbox::MESSAGE_ID)?,
        created_at: row.get(email_outbox::CREATED_AT)?,
        sent_at: row.get(email_outbox::SENT_AT)?,
    })
}

/// Load stored preferences for a user on an existing connection
pub(crate) fn load_preferences(
    conn: &Connection,
    user_id: UserId,
) -> Result<Option<NotificationPreference>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT * FROM {} WHERE {} = ?1",
                notification_preferences::TABLE,
                notification_preferences::USER_ID
            ),
            params![user_id],
            map_preferences,
        )
        .optional()?)
}

/// Reads and acknowledges persisted notifications and preferences
#[derive(Debug, Clone)]
pub struct NotificationStore {
    db: Database,
}

impl NotificationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Notifications for a user, newest first
    pub async fn list(&self, user_id: UserId, unread_only: bool) -> Result<Vec<Notification>> {
        self.db
            .run(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT * FROM {} WHERE {} = ?1 AND (?2 = 0 OR {} = 0)
                     ORDER BY {} DESC, {} DESC",
                    notifications::TABLE,
                    notifications::RECIPIENT_ID,
                    notifications::IS_READ,
                    notifications::CREATED_AT,
                    notifications::ID
                ))?;
                let rows = stmt.query_map(params![user_id, unread_only], map_notification)?;

                let mut results = Vec::new();
                for notification in rows {
                    results.push(notification?);
                }
                Ok(results)
            })
            .await
    }

    /// Notifications created for one message, across recipients
    pub async fn for_message(&self, message_id: MessageId) -> Result<Vec<Notification>> {
        self.db
            .run(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT * FROM {} WHERE {} = ?1 ORDER BY {}",
                    notifications::TABLE,
                    notifications::MESSAGE_ID,
                    notifications::ID
                ))?;
                let rows = stmt.query_map(params![message_id], map_notification)?;

                let mut results = Vec::new();
                for notification in rows {
                    results.push(notification?);
                }
                Ok(results)
            })
            .await
    }

    /// Mark a notification read. `NotFound` unless it belongs to `user_id`.
    pub async fn mark_read(&self, id: i64, user_id: UserId) -> Result<()> {
        self.db
            .run(move |conn| {
                let updated = conn.execute(
                    &format!(
                        "UPDATE {} SET {} = 1 WHERE {} = ?1 AND {} = ?2",
                        notifications::TABLE,
                        notifications::IS_READ,
                        notifications::ID,
                        notifications::RECIPIENT_ID
                    ),
                    params![id, user_id],
                )?;
                if updated == 0 {
                    return Err(MessagingError::NotFound(format!("notification {id}")));
                }
                Ok(())
            })
            .await
    }

    pub async fn unread_count(&self, user_id: UserId) -> Result<i64> {
        self.db
            .run(move |conn| {
                Ok(conn.query_row(
                    &format!(
                        "SELECT COUNT(*) FROM {} WHERE {} = ?1 AND {} = 0",
                        notifications::TABLE,
                        notifications::RECIPIENT_ID,
                        notifications::IS_READ
                    ),
                    params![user_id],
                    |row| row.get(0),
                )?)
            })
            .await
    }

    /// Emails not yet picked up by the mailer, oldest first
    pub async fn pending_emails(&self, limit: u32) -> Result<Vec<OutboxEmail>> {
        self.db
            .run(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT * FROM {} WHERE {} IS NULL ORDER BY {} LIMIT ?1",
                    email_outbox::TABLE,
                    email_outbox::SENT_AT,
                    email_outbox::ID
                ))?;
                let rows = stmt.query_map(params![limit], map_email)?;

                let mut results = Vec::new();
                for email in rows {
                    results.push(email?);
                }
                Ok(results)
            })
            .await
    }

    /// Stored preferences, `None` if the user never set any
    pub async fn preferences(&self, user_id: UserId) -> Result<Option<NotificationPreference>> {
        self.db.run(move |conn| load_preferences(conn, user_id)).await
    }

    /// Create or replace a user's preferences
    pub async fn upsert_preferences(
        &self,
        preferences: NotificationPreference,
    ) -> Result<NotificationPreference> {
        if preferences.quiet_hours_enabled
            && (preferences.quiet_hours_start.is_none() || preferences.quiet_hours_end.is_none())
        {
            return Err(MessagingError::Validation(
                "Quiet hours need both a start and an end time".to_string(),
            ));
        }

        self.db
            .run(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT OR REPLACE INTO {} ({}, {}, {}, {}, {}, {})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        notification_preferences::TABLE,
                        notification_preferences::USER_ID,
                        notification_preferences::NEW_MESSAGES_ENABLED,
                        notification_preferences::EMAIL_NOTIFICATIONS_ENABLED,
                        notification_preferences::QUIET_HOURS_ENABLED,
                        notification_preferences::QUIET_HOURS_START,
                        notification_preferences::QUIET_HOURS_END
                    ),
                    params![
                        preferences.user_id,
                        preferences.new_messages_enabled,
                        preferences.email_notifications_enabled,
                        preferences.quiet_hours_enabled,
                        preferences.quiet_hours_start,
                        preferences.quiet_hours_end
                    ],
                )?;
                load_preferences(conn, preferences.user_id)?.ok_or_else(|| {
                    MessagingError::NotFound(format!(
                        "preferences for user {}",
                        preferences.user_id
                    ))
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversationStatus, MessageType};
    use proptest::prelude::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn conversation(is_ai: bool) -> Conversation {
        let now = Utc::now();
        Conversation {
            id: 1,
            participant_1_id: 10,
            participant_2_id: 20,
            is_ai_conversation: is_ai,
            status: ConversationStatus::Active,
            created_at: now,
            updated_at: now,
            last_message_at: None,
        }
    }

    fn message(text: Option<&str>) -> Message {
        Message {
            id: 1,
            conversation_id: 1,
            sender_id: 10,
            text: text.map(str::to_string),
            message_type: MessageType::Text,
            attachment: None,
            is_read: false,
            read_at: None,
            is_deleted: false,
            deleted_at: None,
            created_at: Utc::now(),
            sender_name: None,
            sender_picture: None,
        }
    }

    fn quiet(start: NaiveTime, end: NaiveTime) -> NotificationPreference {
        NotificationPreference {
            quiet_hours_enabled: true,
            quiet_hours_start: Some(start),
            quiet_hours_end: Some(end),
            ..NotificationPreference::enabled(20)
        }
    }

    #[test]
    fn recipient_is_the_other_participant() {
        let policy = NotificationPolicy::default();
        assert_eq!(policy.recipient(&conversation(false), 10), Ok(20));
        assert_eq!(policy.recipient(&conversation(false), 20), Ok(10));
    }

    #[test]
    fn ai_conversations_and_system_sender_are_suppressed() {
        let policy = NotificationPolicy::default();
        assert_eq!(policy.recipient(&conversation(true), 10), Err(SuppressReason::AiConversation));
        assert_eq!(policy.recipient(&conversation(false), 0), Err(SuppressReason::SystemSender));
    }

    #[test]
    fn missing_or_disabled_preferences_suppress() {
        let policy = NotificationPolicy::default();
        assert_eq!(policy.check_preferences(None, at(12, 0)), Err(SuppressReason::NoPreferences));

        let disabled = NotificationPreference {
            new_messages_enabled: false,
            ..NotificationPreference::enabled(20)
        };
        assert_eq!(
            policy.check_preferences(Some(&disabled), at(12, 0)),
            Err(SuppressReason::Disabled)
        );
        let enabled = NotificationPreference::enabled(20);
        assert_eq!(policy.check_preferences(Some(&enabled), at(12, 0)), Ok(()));
    }

    #[test]
    fn same_day_window_is_inclusive() {
        let policy = NotificationPolicy::default();
        let prefs = quiet(at(13, 0), at(15, 0));
        for hour in [13, 15] {
            assert_eq!(
                policy.check_preferences(Some(&prefs), at(hour, 0)),
                Err(SuppressReason::QuietHours)
            );
        }
        assert_eq!(policy.check_preferences(Some(&prefs), at(15, 1)), Ok(()));
    }

    #[test]
    fn overnight_window_never_matches_in_same_day_mode() {
        for now in [at(23, 0), at(2, 0), at(12, 0)] {
            assert!(!within_quiet_hours(now, at(22, 0), at(6, 0), QuietHoursMode::SameDay));
        }
    }

    #[test]
    fn overnight_window_wraps_in_wrap_mode() {
        let mode = QuietHoursMode::WrapMidnight;
        assert!(within_quiet_hours(at(23, 0), at(22, 0), at(6, 0), mode));
        assert!(within_quiet_hours(at(2, 0), at(22, 0), at(6, 0), mode));
        assert!(within_quiet_hours(at(6, 0), at(22, 0), at(6, 0), mode));
        assert!(!within_quiet_hours(at(12, 0), at(22, 0), at(6, 0), mode));
    }

    #[test]
    fn disabled_quiet_hours_are_ignored() {
        let policy = NotificationPolicy::default();
        let prefs = NotificationPreference {
            quiet_hours_enabled: false,
            ..quiet(at(0, 0), at(23, 59))
        };
        assert_eq!(policy.check_preferences(Some(&prefs), at(12, 0)), Ok(()));
    }

    #[test]
    fn preview_falls_back_for_attachment_only_messages() {
        let policy = NotificationPolicy::default();
        assert_eq!(policy.preview(&message(None)), "Sent an attachment");
        assert_eq!(policy.preview(&message(Some(""))), "Sent an attachment");
        assert_eq!(NotificationPolicy::title("Ada"), "New message from Ada");
    }

    #[test]
    fn attachment_fallback_respects_preview_limit() {
        let policy = NotificationPolicy { preview_chars: 4, ..NotificationPolicy::default() };
        assert_eq!(policy.preview(&message(Some(""))), "Sent");
    }

    #[test]
    fn quiet_hours_mode_parses_config_values() {
        assert_eq!(
            "wrap_midnight".parse::<QuietHoursMode>().unwrap(),
            QuietHoursMode::WrapMidnight
        );
        assert!("overnight".parse::<QuietHoursMode>().is_err());
    }

    proptest! {
        #[test]
        fn preview_never_exceeds_limit(text in "\\PC{1,300}", limit in 1usize..150) {
            let policy =
                NotificationPolicy { preview_chars: limit, ..NotificationPolicy::default() };
            let preview = policy.preview(&message(Some(&text)));
            prop_assert!(preview.chars().count() <= limit);
            prop_assert!(text.starts_with(&preview));
        }

        #[test]
        fn same_day_and_wrap_agree_on_ordinary_windows(
            s in 0u32..86_400, e in 0u32..86_400, n in 0u32..86_400
        ) {
            let t = |secs: u32| NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).unwrap();
            let (start, end) = if s <= e { (t(s), t(e)) } else { (t(e), t(s)) };
            prop_assert_eq!(
                within_quiet_hours(t(n), start, end, QuietHoursMode::SameDay),
                within_quiet_hours(t(n), start, end, QuietHoursMode::WrapMidnight)
            );
        }
    }
}
