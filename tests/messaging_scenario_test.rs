//! End-to-end flows through the messaging service

mod common;

use common::{add_user, setup_db};
use thrift_messaging::config::AppConfig;
use thrift_messaging::error::MessagingError;
use thrift_messaging::models::{
    Attachment, ConversationStatus, MessageType, NotificationPreference, DELETED_MESSAGE_TEXT,
};
use thrift_messaging::MessagingService;

async fn service_with_users() -> (tempfile::TempDir, MessagingService) {
    let (dir, db) = setup_db();
    add_user(&db, 1, "Ada", Some("ada@campus.edu")).await;
    add_user(&db, 2, "Grace", Some("grace@campus.edu")).await;
    let service =
        MessagingService::new(db, &AppConfig::default()).expect("Failed to build service");
    (dir, service)
}

#[tokio::test]
async fn test_first_contact_read_search_and_delete() {
    let (_dir, service) = service_with_users().await;
    service
        .update_preferences(NotificationPreference::enabled(2))
        .await
        .expect("prefs");

    // User 1 opens a conversation with user 2
    let conversation = service.create_conversation(1, 2, false).await.expect("create");
    let again = service.create_conversation(2, 1, false).await.expect("create again");
    assert_eq!(conversation.id, again.id);

    // User 1 says hello
    let hello = service
        .send_message(conversation.id, 1, Some("Hello"), None)
        .await
        .expect("send");
    assert_eq!(hello.message_type, MessageType::Text);
    service.drain_notifications().await;

    let updated = service.get_conversation(conversation.id).await.expect("get");
    assert!(updated.last_message_at.expect("timestamp") >= hello.created_at);

    let notifications = service.list_notifications(2, true).await.expect("notifications");
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].message_id, hello.id);
    assert_eq!(notifications[0].title, "New message from Ada");
    assert_eq!(service.unread_count(2).await.expect("unread"), 1);

    // User 2 reads the conversation
    let messages = service
        .list_messages(conversation.id, Some(2), None, None)
        .await
        .expect("list");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text.as_deref(), Some("Hello"));
    assert!(messages[0].is_read);
    assert_eq!(service.unread_count(2).await.expect("unread"), 0);

    // User 2 finds it by search
    let hits = service.search_messages(2, "hello").await.expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].message.id, hello.id);
    assert_eq!(hits[0].other_user_name.as_deref(), Some("Ada"));

    // User 1 deletes it
    service.delete_message(hello.id, 1).await.expect("delete");
    assert!(service
        .list_messages(conversation.id, Some(2), None, None)
        .await
        .expect("list")
        .is_empty());
    assert!(service.search_messages(2, "hello").await.expect("search").is_empty());

    let tombstone = service.mark_message_read(hello.id).await.expect("get deleted");
    assert_eq!(tombstone.text.as_deref(), Some(DELETED_MESSAGE_TEXT));

    let denied = service.delete_message(hello.id, 2).await;
    assert!(matches!(denied, Err(MessagingError::Forbidden(_))));
    assert_eq!(denied.map_err(|e| e.status_code()), Err(403));
}

#[tokio::test]
async fn test_send_validation_and_authorization() {
    let (_dir, service) = service_with_users().await;
    let conversation = service.create_conversation(1, 2, false).await.expect("create");

    let empty = service.send_message(conversation.id, 1, None, None).await;
    assert!(matches!(empty, Err(MessagingError::Validation(_))));

    let too_long = "x".repeat(5_001);
    let long = service.send_message(conversation.id, 1, Some(&too_long), None).await;
    assert!(matches!(long, Err(MessagingError::Validation(_))));

    let outsider = service.send_message(conversation.id, 3, Some("hi"), None).await;
    assert_eq!(outsider.map_err(|e| e.status_code()).err(), Some(403));

    let missing = service.send_message(404, 1, Some("hi"), None).await;
    assert_eq!(missing.map_err(|e| e.status_code()).err(), Some(404));

    let trimmed = service
        .send_message(conversation.id, 1, Some("  see you at the library  "), None)
        .await
        .expect("send");
    assert_eq!(trimmed.text.as_deref(), Some("see you at the library"));
    service.drain_notifications().await;
}

#[tokio::test]
async fn test_outsider_cannot_list_or_mark_read() {
    let (_dir, service) = service_with_users().await;
    add_user(service.database(), 3, "Linus", None).await;
    let conversation = service.create_conversation(1, 2, false).await.expect("create");
    service.send_message(conversation.id, 1, Some("still selling?"), None).await.expect("send");
    service.send_message(conversation.id, 2, Some("yes"), None).await.expect("send");
    service.drain_notifications().await;

    let outsider = service.list_messages(conversation.id, Some(3), None, None).await;
    assert!(matches!(outsider, Err(MessagingError::Forbidden(_))));

    let missing = service.list_messages(404, Some(1), None, None).await;
    assert!(matches!(missing, Err(MessagingError::NotFound(_))));

    assert_eq!(service.unread_count(1).await.expect("unread"), 1);
    assert_eq!(service.unread_count(2).await.expect("unread"), 1);
}

#[tokio::test]
async fn test_attachment_types_are_inferred() {
    let (_dir, service) = service_with_users().await;
    let conversation = service.create_conversation(1, 2, false).await.expect("create");

    let photo = service
        .send_message(
            conversation.id,
            2,
            None,
            Some(Attachment {
                url: "/uploads/abc123".to_string(),
                original_name: "couch.jpeg".to_string(),
                size_bytes: 345_000,
            }),
        )
        .await
        .expect("send photo");
    assert_eq!(photo.message_type, MessageType::Image);

    let receipt = service
        .send_message(
            conversation.id,
            2,
            Some("receipt attached"),
            Some(Attachment {
                url: "/uploads/def456".to_string(),
                original_name: "receipt.pdf".to_string(),
                size_bytes: 12_000,
            }),
        )
        .await
        .expect("send file");
    assert_eq!(receipt.message_type, MessageType::File);
    service.drain_notifications().await;

    // Attachment-only previews fall back to a fixed text
    service
        .update_preferences(NotificationPreference::enabled(1))
        .await
        .expect("prefs");
    let another = service
        .send_message(
            conversation.id,
            2,
            None,
            Some(Attachment {
                url: "/uploads/ghi789".to_string(),
                original_name: "shelf.png".to_string(),
                size_bytes: 1_000,
            }),
        )
        .await
        .expect("send");
    service.drain_notifications().await;

    let notifications = service.list_notifications(1, false).await.expect("notifications");
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].message_id, another.id);
    assert_eq!(notifications[0].preview, "Sent an attachment");

    let inbox = service.list_conversations(1, None, None).await.expect("inbox");
    assert_eq!(inbox[0].last_message_type, Some(MessageType::Image));
    assert_eq!(inbox[0].unread_count, 3);
}

#[tokio::test]
async fn test_archive_and_delete_conversation() {
    let (_dir, service) = service_with_users().await;
    let conversation = service.create_conversation(1, 2, false).await.expect("create");
    service.send_message(conversation.id, 2, Some("ping"), None).await.expect("send");
    service.drain_notifications().await;

    service.archive_conversation(conversation.id).await.expect("archive");
    assert!(service.list_conversations(1, None, None).await.expect("inbox").is_empty());
    assert_eq!(
        service
            .list_conversations(1, Some(ConversationStatus::Archived), None)
            .await
            .expect("archived")
            .len(),
        1
    );
    // Archived conversations do not count towards the unread badge
    assert_eq!(service.unread_count(1).await.expect("unread"), 0);

    let deleted = service.delete_conversation(conversation.id).await.expect("delete");
    assert_eq!(deleted.status, ConversationStatus::Deleted);

    let fresh = service.create_conversation(1, 2, false).await.expect("recreate");
    assert_ne!(fresh.id, conversation.id);
}

#[tokio::test]
async fn test_pagination_is_clamped() {
    let (_dir, service) = service_with_users().await;
    let conversation = service.create_conversation(1, 2, false).await.expect("create");
    for i in 0..3 {
        service
            .send_message(conversation.id, 1, Some(&format!("offer {i}")), None)
            .await
            .expect("send");
    }
    service.drain_notifications().await;

    let zero_limit = service
        .list_messages(conversation.id, None, Some(0), None)
        .await
        .expect("list");
    assert_eq!(zero_limit.len(), 3);

    let tail = service
        .list_messages(conversation.id, None, Some(10), Some(2))
        .await
        .expect("list");
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].text.as_deref(), Some("offer 2"));
}

#[tokio::test]
async fn test_email_channel_enabled_by_config() {
    let (dir, db) = setup_db();
    add_user(&db, 1, "Ada", None).await;
    add_user(&db, 2, "Grace", Some("grace@campus.edu")).await;
    let mut config = AppConfig::default();
    config.notifications.email_enabled = true;
    let service = MessagingService::new(db, &config).expect("service");

    service
        .update_preferences(NotificationPreference {
            email_notifications_enabled: true,
            ..NotificationPreference::enabled(2)
        })
        .await
        .expect("prefs");

    let conversation = service.create_conversation(1, 2, false).await.expect("create");
    let message = service
        .send_message(conversation.id, 1, Some("Meet at the student union?"), None)
        .await
        .expect("send");
    service.drain_notifications().await;

    let outbox = service.pending_emails(10).await.expect("outbox");
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].message_id, message.id);
    assert_eq!(service.list_notifications(2, false).await.expect("in-app").len(), 1);
    drop(dir);
}
