//! Thrift Messaging - conversations, messages and notifications for a
//! campus peer-to-peer thrift marketplace
//!
//! # Features
//!
//! - One open conversation per pair of users, created on first contact
//! - Append-only message log with read receipts and soft delete
//! - Full-text message search backed by SQLite FTS5
//! - In-app and email notifications governed by user preferences and quiet hours
//! - Layered configuration, structured logging and metrics

/// Configuration management
pub mod config;
/// Conversation lifecycle
pub mod conversations;
/// Database operations and connection pooling
pub mod db;
/// Error types
pub mod error;
/// Logging setup and utilities
pub mod logging;
/// Message persistence and search
pub mod messages;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Notification policy and channels
pub mod notifications;
/// Database schema definitions
pub mod schema;
/// Messaging service
pub mod service;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use config::AppConfig;
pub use conversations::ConversationManager;
pub use db::Database;
pub use error::{MessagingError, Result};
pub use messages::MessageStore;
pub use models::{
    Attachment, Conversation, ConversationStatus, ConversationSummary, Message, MessageType,
    Notification, NotificationPreference, SearchHit, UserProfile,
};
pub use notifications::{NotificationPolicy, NotificationStore, Notifier, NotifyOutcome};
pub use service::MessagingService;
