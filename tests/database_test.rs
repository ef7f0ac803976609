mod common;

use common::{add_user, setup_db};
use thrift_messaging::db::Database;
use thrift_messaging::error::MessagingError;
use thrift_messaging::models::UserProfile;

#[test]
fn test_database_creation_and_initialization() {
    let (_dir, db) = setup_db();

    // Test that we can get a connection
    let conn = db.get_connection().expect("Failed to get database connection");
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
             AND name IN ('users', 'conversations', 'messages', 'notifications',
                          'notification_preferences', 'email_outbox')",
            [],
            |row| row.get(0),
        )
        .expect("Failed to inspect schema");
    assert_eq!(tables, 6);
}

#[tokio::test]
async fn test_reopening_database_keeps_data() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_url = format!("sqlite://{}", temp_dir.path().join("nested/dir/test.db").display());

    let db = Database::new(&db_url).expect("Failed to create database");
    add_user(&db, 1, "Ada", None).await;
    drop(db);

    let reopened = Database::new(&db_url).expect("Failed to reopen database");
    let user = reopened.get_user(1).await.expect("Failed to get user");
    assert_eq!(user.map(|u| u.display_name), Some("Ada".to_string()));
}

#[tokio::test]
async fn test_user_directory_upsert() {
    let (_dir, db) = setup_db();

    let user = add_user(&db, 7, "Grace", Some("grace@campus.edu")).await;
    assert_eq!(user.email.as_deref(), Some("grace@campus.edu"));

    let updated = db
        .add_or_update_user(UserProfile {
            display_name: "Grace H.".to_string(),
            email: None,
            ..user
        })
        .await
        .expect("Failed to update user");
    assert_eq!(updated.display_name, "Grace H.");
    assert_eq!(updated.email, None);

    assert!(db.get_user(8).await.expect("Failed to query user").is_none());
}

#[tokio::test]
async fn test_run_executes_on_pooled_connection() {
    let (_dir, db) = setup_db();
    add_user(&db, 1, "Ada", None).await;

    let count: i64 = db
        .run(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?))
        .await
        .expect("Failed to run query");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_storage_errors_are_opaque() {
    let (_dir, db) = setup_db();

    let err = db
        .run(|conn| Ok(conn.execute("INSERT INTO missing_table VALUES (1)", [])?))
        .await
        .expect_err("Query against a missing table should fail");

    assert!(matches!(err, MessagingError::Persistence(_)));
    assert_eq!(err.to_string(), "Operation failed");
    assert_eq!(err.status_code(), 500);
}

#[test]
fn test_foreign_keys_are_enforced() {
    let (_dir, db) = setup_db();
    let conn = db.get_connection().expect("Failed to get database connection");

    let result = conn.execute(
        "INSERT INTO messages (conversation_id, sender_id, text, message_type, created_at)
         VALUES (999, 1, 'orphan', 'text', '2026-01-01 00:00:00+00:00')",
        [],
    );
    assert!(result.is_err());
}
