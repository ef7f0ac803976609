//! Message store: append-only log per conversation with a read-state and
//! soft-delete overlay, plus full-text search.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::db::Database;
use crate::error::{MessagingError, Result};
use crate::models::{
    Attachment, ConversationId, Message, MessageId, NewMessage, Page, SearchHit, UserId,
    DELETED_MESSAGE_TEXT,
};
use crate::schema::{conversations, messages};
use crate::validation::InputValidator;

/// Hydrated message projection; `m` is messages, `u` the sender in users
const MESSAGE_COLUMNS: &str = "
    m.id, m.conversation_id, m.sender_id, m.text, m.message_type,
    m.attachment_url, m.attachment_name, m.attachment_size,
    m.is_read, m.read_at, m.is_deleted, m.deleted_at, m.created_at,
    u.display_name AS sender_name, u.profile_picture AS sender_picture";

/// Map a hydrated row to a `Message`
fn map_message(row: &Row) -> rusqlite::Result<Message> {
    let attachment_url: Option<String> = row.get(messages::ATTACHMENT_URL)?;
    let attachment = match attachment_url {
        Some(url) => Some(Attachment {
            url,
            original_name: row
                .get::<_, Option<String>>(messages::ATTACHMENT_NAME)?
                .unwrap_or_default(),
            size_bytes: row
                .get::<_, Option<i64>>(messages::ATTACHMENT_SIZE)?
                .unwrap_or_default(),
        }),
        None => None,
    };

    Ok(Message {
        id: row.get(messages::ID)?,
        conversation_id: row.get(messages::CONVERSATION_ID)?,
        sender_id: row.get(messages::SENDER_ID)?,
        text: row.get(messages::TEXT)?,
        message_type: row.get(messages::MESSAGE_TYPE)?,
        attachment,
        is_read: row.get(messages::IS_READ)?,
        read_at: row.get(messages::READ_AT)?,
        is_deleted: row.get(messages::IS_DELETED)?,
        deleted_at: row.get(messages::DELETED_AT)?,
        created_at: row.get(messages::CREATED_AT)?,
        sender_name: row.get(messages::SENDER_NAME)?,
        sender_picture: row.get(messages::SENDER_PICTURE)?,
    })
}

/// Load a message, deleted or not, on an existing connection
pub(crate) fn find_message(conn: &Connection, id: MessageId) -> Result<Option<Message>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM {} m LEFT JOIN users u ON u.id = m.sender_id
                 WHERE m.id = ?1",
                messages::TABLE
            ),
            params![id],
            map_message,
        )
        .optional()?)
}

fn not_found(id: MessageId) -> MessagingError {
    MessagingError::NotFound(format!("message {id}"))
}

/// Persistence of messages and their read/deleted state
#[derive(Debug, Clone)]
pub struct MessageStore {
    db: Database,
    min_search_term_chars: usize,
    max_search_results: u32,
}

impl MessageStore {
    pub fn new(db: Database) -> Self {
        Self::with_search_limits(db, 2, 50)
    }

    pub fn with_search_limits(
        db: Database,
        min_search_term_chars: usize,
        max_search_results: u32,
    ) -> Self {
        Self {
            db,
            min_search_term_chars,
            max_search_results,
        }
    }

    /// Get a message by ID, including soft-deleted ones
    pub async fn get(&self, id: MessageId) -> Result<Message> {
        self.db
            .run(move |conn| find_message(conn, id)?.ok_or_else(|| not_found(id)))
            .await
    }

    /// Non-deleted messages of a conversation, oldest first.
    ///
    /// With a `viewer_id`, every unread message not authored by the viewer is
    /// marked read before the page is read. Returns the page and the number of
    /// rows flipped to read.
    pub async fn list_messages(
        &self,
        conversation_id: ConversationId,
        page: Page,
        viewer_id: Option<UserId>,
    ) -> Result<(Vec<Message>, usize)> {
        self.db
            .run(move |conn| {
                let marked = match viewer_id {
                    Some(viewer) => conn.execute(
                        &format!(
                            "UPDATE {m} SET {read} = 1, {read_at} = ?1
                             WHERE {conv} = ?2 AND {sender} <> ?3 AND {read} = 0
                               AND EXISTS (SELECT 1 FROM {c} c WHERE c.{c_id} = ?2
                                           AND (c.{p1} = ?3 OR c.{p2} = ?3))",
                            m = messages::TABLE,
                            read = messages::IS_READ,
                            read_at = messages::READ_AT,
                            conv = messages::CONVERSATION_ID,
                            sender = messages::SENDER_ID,
                            c = conversations::TABLE,
                            c_id = conversations::ID,
                            p1 = conversations::PARTICIPANT_1_ID,
                            p2 = conversations::PARTICIPANT_2_ID,
                        ),
                        params![Utc::now(), conversation_id, viewer],
                    )?,
                    None => 0,
                };
                if marked > 0 {
                    debug!(conversation_id, marked, "Marked messages read");
                }

                let mut stmt = conn.prepare(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM {} m LEFT JOIN users u ON u.id = m.sender_id
                     WHERE m.conversation_id = ?1 AND m.is_deleted = 0
                     ORDER BY m.created_at ASC, m.id ASC
                     LIMIT ?2 OFFSET ?3",
                    messages::TABLE
                ))?;
                let rows =
                    stmt.query_map(params![conversation_id, page.limit, page.offset], map_message)?;

                let mut results = Vec::new();
                for message in rows {
                    results.push(message?);
                }
                Ok((results, marked))
            })
            .await
    }

    /// Insert a message and bump the owning conversation's timestamps.
    ///
    /// `created_at` and the conversation's `last_message_at` share one instant.
    /// The store does not check that text or attachment is present; the
    /// messaging service does.
    pub async fn append_message(&self, new_message: NewMessage) -> Result<Message> {
        self.db
            .run(move |conn| {
                let now: DateTime<Utc> = Utc::now();
                let (url, name, size) = match &new_message.attachment {
                    Some(a) => (
                        Some(a.url.as_str()),
                        Some(a.original_name.as_str()),
                        Some(a.size_bytes),
                    ),
                    None => (None, None, None),
                };

                conn.execute(
                    &format!(
                        "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}, {})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        messages::TABLE,
                        messages::CONVERSATION_ID,
                        messages::SENDER_ID,
                        messages::TEXT,
                        messages::MESSAGE_TYPE,
                        messages::ATTACHMENT_URL,
                        messages::ATTACHMENT_NAME,
                        messages::ATTACHMENT_SIZE,
                        messages::CREATED_AT
                    ),
                    params![
                        new_message.conversation_id,
                        new_message.sender_id,
                        new_message.text,
                        new_message.message_type,
                        url,
                        name,
                        size,
                        now
                    ],
                )?;
                let id = conn.last_insert_rowid();

                conn.execute(
                    &format!(
                        "UPDATE {} SET {} = ?1, {} = ?1 WHERE {} = ?2",
                        conversations::TABLE,
                        conversations::UPDATED_AT,
                        conversations::LAST_MESSAGE_AT,
                        conversations::ID
                    ),
                    params![now, new_message.conversation_id],
                )?;

                find_message(conn, id)?.ok_or_else(|| not_found(id))
            })
            .await
    }

    /// Mark one message read, whatever its current state
    pub async fn mark_read(&self, id: MessageId) -> Result<Message> {
        self.db
            .run(move |conn| {
                let updated = conn.execute(
                    &format!(
                        "UPDATE {} SET {} = 1, {} = ?1 WHERE {} = ?2",
                        messages::TABLE,
                        messages::IS_READ,
                        messages::READ_AT,
                        messages::ID
                    ),
                    params![Utc::now(), id],
                )?;
                if updated == 0 {
                    return Err(not_found(id));
                }
                find_message(conn, id)?.ok_or_else(|| not_found(id))
            })
            .await
    }

    /// Soft-delete a message on behalf of `requester_id`.
    ///
    /// Only the sender may delete. Deleting twice succeeds; the text is already
    /// the tombstone.
    pub async fn soft_delete(&self, id: MessageId, requester_id: UserId) -> Result<()> {
        self.db
            .run(move |conn| {
                let message = find_message(conn, id)?.ok_or_else(|| not_found(id))?;
                if message.sender_id != requester_id {
                    return Err(MessagingError::Forbidden(format!(
                        "user {requester_id} cannot delete message {id}"
                    )));
                }

                conn.execute(
                    &format!(
                        "UPDATE {} SET {} = 1, {} = ?1, {} = ?2 WHERE {} = ?3",
                        messages::TABLE,
                        messages::IS_DELETED,
                        messages::DELETED_AT,
                        messages::TEXT,
                        messages::ID
                    ),
                    params![Utc::now(), DELETED_MESSAGE_TEXT, id],
                )?;
                info!(
                    message_id = id,
                    conversation_id = message.conversation_id,
                    "Message deleted"
                );
                Ok(())
            })
            .await
    }

    /// Full-text search over the messages of conversations `user_id` is part of.
    ///
    /// Terms shorter than the configured minimum return nothing without a
    /// query. Results are newest first and capped.
    pub async fn search(&self, user_id: UserId, term: &str) -> Result<Vec<SearchHit>> {
        let Some(term) = InputValidator::normalize_search_term(term, self.min_search_term_chars)
        else {
            return Ok(Vec::new());
        };
        let Some(expression) = InputValidator::fts_match_expression(&term) else {
            return Ok(Vec::new());
        };
        let limit = self.max_search_results;

        self.db
            .run(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {MESSAGE_COLUMNS},
                            c.participant_1_id, c.participant_2_id,
                            u1.display_name AS p1_name, u2.display_name AS p2_name
                     FROM {fts}
                     JOIN {m} m ON m.id = {fts}.rowid
                     JOIN {c} c ON c.id = m.conversation_id
                     LEFT JOIN users u ON u.id = m.sender_id
                     LEFT JOIN users u1 ON u1.id = c.participant_1_id
                     LEFT JOIN users u2 ON u2.id = c.participant_2_id
                     WHERE {fts} MATCH ?1
                       AND (c.participant_1_id = ?2 OR c.participant_2_id = ?2)
                       AND m.is_deleted = 0
                     ORDER BY m.created_at DESC, m.id DESC
                     LIMIT ?3",
                    fts = messages::FTS_TABLE,
                    m = messages::TABLE,
                    c = conversations::TABLE,
                ))?;

                let rows = stmt.query_map(params![expression, user_id, limit], |row| {
                    let p1: UserId = row.get(conversations::PARTICIPANT_1_ID)?;
                    let p2: UserId = row.get(conversations::PARTICIPANT_2_ID)?;
                    let (other_user_id, name_col) = if p1 == user_id {
                        (p2, "p2_name")
                    } else {
                        (p1, "p1_name")
                    };
                    Ok(SearchHit {
                        message: map_message(row)?,
                        other_user_id,
                        other_user_name: row.get(name_col)?,
                    })
                })?;

                let mut results = Vec::new();
                for hit in rows {
                    results.push(hit?);
                }
                Ok(results)
            })
            .await
    }
}
