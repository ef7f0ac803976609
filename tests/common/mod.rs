//! Shared fixtures for integration tests
#![allow(dead_code)]

use tempfile::TempDir;
use thrift_messaging::db::Database;
use thrift_messaging::models::UserProfile;

/// Fresh database in a temporary directory. Keep the `TempDir` alive.
pub fn setup_db() -> (TempDir, Database) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_url = format!("sqlite:{}", temp_dir.path().join("messaging.db").display());
    let db = Database::new(&db_url).expect("Failed to create database");
    (temp_dir, db)
}

pub async fn add_user(db: &Database, id: i64, name: &str, email: Option<&str>) -> UserProfile {
    db.add_or_update_user(UserProfile {
        id,
        display_name: name.to_string(),
        profile_picture: Some(format!("/avatars/{id}.png")),
        email: email.map(str::to_string),
    })
    .await
    .expect("Failed to add user")
}
