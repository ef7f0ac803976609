//! Messaging service: the entry point the rest of the marketplace calls.
//!
//! Validates requests, enforces sender/participant rules and fans each new
//! message out to the notification channels on detached tasks.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::{AppConfig, MessagingConfig};
use crate::conversations::ConversationManager;
use crate::db::Database;
use crate::error::{MessagingError, Result};
use crate::logging::OperationTimer;
use crate::messages::MessageStore;
use crate::metrics::{MetricsCollector, MetricsTimer};
use crate::models::{
    Attachment, Conversation, ConversationId, ConversationStatus, ConversationSummary, Message,
    MessageId, MessageType, NewMessage, Notification, NotificationPreference, OutboxEmail,
    SearchHit, UserId,
};
use crate::notifications::{
    EmailNotifier, InAppNotifier, NotificationPolicy, NotificationStore, Notifier,
};
use crate::validation::InputValidator;

/// Infer the stored message type from an optional attachment.
///
/// Attachments whose filename guesses to an `image/*` MIME type are images,
/// any other attachment is a file.
#[must_use]
pub fn infer_message_type(attachment: Option<&Attachment>) -> MessageType {
    match attachment {
        None => MessageType::Text,
        Some(a) => {
            let is_image = mime_guess::from_path(&a.original_name)
                .first()
                .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE);
            if is_image {
                MessageType::Image
            } else {
                MessageType::File
            }
        }
    }
}

pub struct MessagingService {
    db: Database,
    conversations: ConversationManager,
    messages: MessageStore,
    notifications: NotificationStore,
    notifiers: Vec<Arc<dyn Notifier>>,
    pending: Mutex<Vec<JoinHandle<()>>>,
    metrics: MetricsCollector,
    limits: MessagingConfig,
}

impl MessagingService {
    /// Build the service with the channels enabled in `config`
    pub fn new(db: Database, config: &AppConfig) -> Result<Self> {
        let policy = NotificationPolicy::from_config(config)?;

        let mut notifiers: Vec<Arc<dyn Notifier>> =
            vec![Arc::new(InAppNotifier::new(db.clone(), policy.clone()))];
        if config.notifications.email_enabled {
            notifiers.push(Arc::new(EmailNotifier::new(db.clone(), policy)));
        }

        Ok(Self::with_notifiers(db, config, notifiers))
    }

    /// Build the service with an explicit set of channels
    pub fn with_notifiers(
        db: Database,
        config: &AppConfig,
        notifiers: Vec<Arc<dyn Notifier>>,
    ) -> Self {
        let limits = config.messaging.clone();
        let metrics = MetricsCollector::default();
        metrics.update_connection_pool_size(db.max_connections());

        Self {
            conversations: ConversationManager::new(db.clone()),
            messages: MessageStore::with_search_limits(
                db.clone(),
                limits.min_search_term_chars as usize,
                limits.max_search_results,
            ),
            notifications: NotificationStore::new(db.clone()),
            db,
            notifiers,
            pending: Mutex::new(Vec::new()),
            metrics,
            limits,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Count failures by kind, pass the result through
    fn track<T>(&self, operation: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.metrics.record_error(e.kind(), operation);
            if matches!(e, MessagingError::Persistence(_)) {
                warn!(operation, error = ?e, "Storage failure");
            }
        }
        result
    }

    /// Inbox for a user, `active` unless another status is requested
    pub async fn list_conversations(
        &self,
        user_id: UserId,
        status: Option<ConversationStatus>,
        search_term: Option<&str>,
    ) -> Result<Vec<ConversationSummary>> {
        let timer = MetricsTimer::new(self.metrics.clone(), "list_conversations");
        let result = self
            .conversations
            .list_conversations(user_id, status.unwrap_or_default(), search_term)
            .await;
        timer.finish(result.is_ok());
        self.track("list_conversations", result)
    }

    pub async fn get_conversation(&self, conversation_id: ConversationId) -> Result<Conversation> {
        self.track("get_conversation", self.conversations.get(conversation_id).await)
    }

    /// Find or create the open conversation between two users
    #[instrument(skip(self))]
    pub async fn create_conversation(
        &self,
        participant_1: UserId,
        participant_2: UserId,
        is_ai: bool,
    ) -> Result<Conversation> {
        let timer = MetricsTimer::new(self.metrics.clone(), "create_conversation");
        let result = self
            .conversations
            .create_conversation(participant_1, participant_2, is_ai)
            .await;
        timer.finish(result.is_ok());

        let (conversation, created) = self.track("create_conversation", result)?;
        if created {
            self.metrics.record_conversation_created();
        }
        Ok(conversation)
    }

    pub async fn archive_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Conversation> {
        self.set_conversation_status(conversation_id, ConversationStatus::Archived).await
    }

    pub async fn delete_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Conversation> {
        self.set_conversation_status(conversation_id, ConversationStatus::Deleted).await
    }

    pub async fn set_conversation_status(
        &self,
        conversation_id: ConversationId,
        status: ConversationStatus,
    ) -> Result<Conversation> {
        let result = self.conversations.set_status(conversation_id, status).await;
        self.track("set_conversation_status", result)
    }

    /// A page of a conversation's messages, oldest first.
    ///
    /// When `viewer_id` is given, it must be a participant; the viewer's
    /// unread incoming messages are marked read first.
    pub async fn list_messages(
        &self,
        conversation_id: ConversationId,
        viewer_id: Option<UserId>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Message>> {
        let page = InputValidator::clamp_page(
            limit,
            offset,
            self.limits.default_page_size,
            self.limits.max_page_size,
        );

        if let Some(viewer) = viewer_id {
            let result = self.ensure_participant(conversation_id, viewer).await;
            self.track("list_messages", result)?;
        }

        let timer = MetricsTimer::new(self.metrics.clone(), "list_messages");
        let result = self.messages.list_messages(conversation_id, page, viewer_id).await;
        timer.finish(result.is_ok());

        let (messages, marked) = self.track("list_messages", result)?;
        if marked > 0 {
            self.metrics.record_messages_read(marked);
        }
        Ok(messages)
    }

    /// Send a message and notify the other participant.
    ///
    /// Notification delivery happens after this returns and never affects
    /// its result.
    #[instrument(skip(self, text, attachment), fields(has_attachment = attachment.is_some()))]
    pub async fn send_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        text: Option<&str>,
        attachment: Option<Attachment>,
    ) -> Result<Message> {
        let timer = OperationTimer::new("send_message");
        let result = self.send_inner(conversation_id, sender_id, text, attachment).await;
        let message = self.track("send_message", result)?;

        self.metrics.record_message_sent(message.message_type.as_str());
        self.dispatch_notifications(&message);
        timer.finish();
        Ok(message)
    }

    async fn ensure_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<()> {
        let conversation = self.conversations.get(conversation_id).await?;
        if !conversation.has_participant(user_id) {
            return Err(MessagingError::Forbidden(format!(
                "user {user_id} is not a participant of conversation {conversation_id}"
            )));
        }
        Ok(())
    }

    async fn send_inner(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        text: Option<&str>,
        attachment: Option<Attachment>,
    ) -> Result<Message> {
        let max_chars = self.limits.max_text_length as usize;
        let text = InputValidator::validate_send(text, attachment.as_ref(), max_chars)?;

        self.ensure_participant(conversation_id, sender_id).await?;

        let message_type = infer_message_type(attachment.as_ref());
        let message = self
            .messages
            .append_message(NewMessage {
                conversation_id,
                sender_id,
                text,
                message_type,
                attachment,
            })
            .await?;

        info!(
            message_id = message.id,
            conversation_id,
            sender_id,
            message_type = %message_type,
            "Message sent"
        );
        Ok(message)
    }

    /// Hand the message to every channel on its own detached task
    fn dispatch_notifications(&self, message: &Message) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|handle| !handle.is_finished());

        for notifier in &self.notifiers {
            let notifier = Arc::clone(notifier);
            let metrics = self.metrics.clone();
            let message = message.clone();

            pending.push(tokio::spawn(async move {
                let channel = notifier.channel();
                match notifier.notify(&message).await {
                    Ok(outcome) => {
                        debug!(channel, message_id = message.id, ?outcome, "Notification handled");
                        metrics.record_notification(channel, outcome.label());
                    }
                    Err(e) => {
                        warn!(
                            channel,
                            message_id = message.id,
                            error = ?e,
                            "Notification delivery failed"
                        );
                        metrics.record_notification(channel, "failed");
                    }
                }
            }));
        }
    }

    /// Wait for every notification task spawned so far
    pub async fn drain_notifications(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            pending.drain(..).collect()
        };

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Notification task did not complete");
            }
        }
    }

    pub async fn mark_message_read(&self, message_id: MessageId) -> Result<Message> {
        let result = self.messages.mark_read(message_id).await;
        let message = self.track("mark_message_read", result)?;
        self.metrics.record_messages_read(1);
        Ok(message)
    }

    /// Soft-delete a message. Only its sender may do this.
    pub async fn delete_message(&self, message_id: MessageId, requester_id: UserId) -> Result<()> {
        let result = self.messages.soft_delete(message_id, requester_id).await;
        self.track("delete_message", result)?;
        self.metrics.record_message_deleted();
        Ok(())
    }

    /// Search a user's messages. Terms that are too short return nothing.
    pub async fn search_messages(&self, user_id: UserId, term: &str) -> Result<Vec<SearchHit>> {
        let min_chars = self.limits.min_search_term_chars as usize;
        let short_circuited = InputValidator::normalize_search_term(term, min_chars).is_none();

        let result = self.messages.search(user_id, term).await;
        let hits = self.track("search_messages", result)?;
        self.metrics.record_search(hits.len(), short_circuited);
        Ok(hits)
    }

    /// Unread incoming messages across the user's active conversations
    pub async fn unread_count(&self, user_id: UserId) -> Result<i64> {
        self.track("unread_count", self.conversations.unread_count(user_id).await)
    }

    pub async fn list_notifications(
        &self,
        user_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>> {
        self.track("list_notifications", self.notifications.list(user_id, unread_only).await)
    }

    pub async fn mark_notification_read(
        &self,
        notification_id: i64,
        user_id: UserId,
    ) -> Result<()> {
        let result = self.notifications.mark_read(notification_id, user_id).await;
        self.track("mark_notification_read", result)
    }

    pub async fn notification_unread_count(&self, user_id: UserId) -> Result<i64> {
        let result = self.notifications.unread_count(user_id).await;
        self.track("notification_unread_count", result)
    }

    pub async fn pending_emails(&self, limit: u32) -> Result<Vec<OutboxEmail>> {
        self.track("pending_emails", self.notifications.pending_emails(limit).await)
    }

    pub async fn get_preferences(&self, user_id: UserId) -> Result<Option<NotificationPreference>> {
        self.track("get_preferences", self.notifications.preferences(user_id).await)
    }

    pub async fn update_preferences(
        &self,
        preferences: NotificationPreference,
    ) -> Result<NotificationPreference> {
        let result = self.notifications.upsert_preferences(preferences).await;
        self.track("update_preferences", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;
    use crate::notifications::{MockNotifier, NotifyOutcome};

    fn attachment(name: &str) -> Attachment {
        Attachment {
            url: format!("/uploads/{name}"),
            original_name: name.to_string(),
            size_bytes: 1024,
        }
    }

    async fn setup(notifiers: Vec<Arc<dyn Notifier>>) -> (tempfile::TempDir, MessagingService) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&format!("sqlite:{}", dir.path().join("svc.db").display())).unwrap();
        for (id, name) in [(1, "Ada"), (2, "Grace")] {
            db.add_or_update_user(UserProfile {
                id,
                display_name: name.to_string(),
                profile_picture: None,
                email: None,
            })
            .await
            .unwrap();
        }
        let service = MessagingService::with_notifiers(db, &AppConfig::default(), notifiers);
        (dir, service)
    }

    #[test]
    fn message_type_follows_attachment_mime() {
        assert_eq!(infer_message_type(None), MessageType::Text);
        assert_eq!(infer_message_type(Some(&attachment("jacket.JPG"))), MessageType::Image);
        assert_eq!(infer_message_type(Some(&attachment("receipt.pdf"))), MessageType::File);
        assert_eq!(infer_message_type(Some(&attachment("no_extension"))), MessageType::File);
    }

    #[tokio::test]
    async fn failing_notifier_does_not_fail_send() {
        let mut notifier = MockNotifier::new();
        notifier.expect_channel().return_const("mock");
        notifier
            .expect_notify()
            .times(1)
            .returning(|_| Err(MessagingError::Notification("smtp down".to_string())));

        let (_dir, service) = setup(vec![Arc::new(notifier)]).await;
        let conversation = service.create_conversation(1, 2, false).await.unwrap();

        let message = service
            .send_message(conversation.id, 1, Some("Is the lamp still available?"), None)
            .await
            .unwrap();
        service.drain_notifications().await;

        assert_eq!(message.text.as_deref(), Some("Is the lamp still available?"));
        assert_eq!(message.sender_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn every_channel_sees_each_sent_message_once() {
        let mut first = MockNotifier::new();
        first.expect_channel().return_const("first");
        first
            .expect_notify()
            .times(1)
            .returning(|m| Ok(NotifyOutcome::Delivered { id: m.id }));
        let mut second = MockNotifier::new();
        second.expect_channel().return_const("second");
        second
            .expect_notify()
            .times(1)
            .returning(|_| Ok(NotifyOutcome::AlreadyDelivered));

        let (_dir, service) = setup(vec![Arc::new(first), Arc::new(second)]).await;
        let conversation = service.create_conversation(1, 2, false).await.unwrap();
        service
            .send_message(conversation.id, 2, None, Some(attachment("sofa.png")))
            .await
            .unwrap();
        service.drain_notifications().await;
    }

    #[tokio::test]
    async fn rejected_sends_never_reach_notifiers() {
        let mut notifier = MockNotifier::new();
        notifier.expect_channel().return_const("mock");
        notifier.expect_notify().never();

        let (_dir, service) = setup(vec![Arc::new(notifier)]).await;
        let conversation = service.create_conversation(1, 2, false).await.unwrap();

        let empty = service.send_message(conversation.id, 1, Some("   "), None).await;
        assert!(matches!(empty, Err(MessagingError::Validation(_))));

        let outsider = service.send_message(conversation.id, 3, Some("hi"), None).await;
        assert!(matches!(outsider, Err(MessagingError::Forbidden(_))));

        let missing = service.send_message(999, 1, Some("hi"), None).await;
        assert!(matches!(missing, Err(MessagingError::NotFound(_))));

        service.drain_notifications().await;
    }
}
