//! Conversation lifecycle: find-or-create, inbox listing and status changes.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::db::Database;
use crate::error::{MessagingError, Result};
use crate::models::{
    Conversation, ConversationId, ConversationStatus, ConversationSummary, MessageType, UserId,
};
use crate::schema::{conversations, messages};
use crate::validation::InputValidator;

const SQL_SELECT_CONVERSATION: &str = "
SELECT id, participant_1_id, participant_2_id, is_ai_conversation, status,
       created_at, updated_at, last_message_at
FROM conversations
WHERE id = ?1
";

const SQL_FIND_OPEN_BETWEEN: &str = "
SELECT id, participant_1_id, participant_2_id, is_ai_conversation, status,
       created_at, updated_at, last_message_at
FROM conversations
WHERE status <> 'deleted'
  AND ((participant_1_id = ?1 AND participant_2_id = ?2)
    OR (participant_1_id = ?2 AND participant_2_id = ?1))
ORDER BY id
LIMIT 1
";

const SQL_INSERT_CONVERSATION: &str = "
INSERT INTO conversations
    (participant_1_id, participant_2_id, is_ai_conversation, status, created_at, updated_at)
VALUES (?1, ?2, ?3, 'active', ?4, ?4)
ON CONFLICT DO NOTHING
";

const SQL_LIST_FOR_USER: &str = "
SELECT c.id, c.participant_1_id, c.participant_2_id, c.is_ai_conversation, c.status,
       c.created_at, c.updated_at, c.last_message_at,
       u1.display_name AS p1_name, u1.profile_picture AS p1_picture,
       u2.display_name AS p2_name, u2.profile_picture AS p2_picture,
       lm.text AS last_message_text,
       lm.message_type AS last_message_type,
       lm.created_at AS last_message_time,
       (SELECT COUNT(*) FROM messages um
         WHERE um.conversation_id = c.id
           AND um.sender_id <> ?1
           AND um.is_read = 0
           AND um.is_deleted = 0) AS unread_count
FROM conversations c
LEFT JOIN users u1 ON u1.id = c.participant_1_id
LEFT JOIN users u2 ON u2.id = c.participant_2_id
LEFT JOIN messages lm ON lm.id = (
    SELECT m.id FROM messages m
    WHERE m.conversation_id = c.id AND m.is_deleted = 0
    ORDER BY m.created_at DESC, m.id DESC
    LIMIT 1
)
WHERE (c.participant_1_id = ?1 OR c.participant_2_id = ?1)
  AND c.status = ?2
ORDER BY c.is_ai_conversation DESC, c.updated_at DESC, c.id DESC
";

/// Map a database row to a `Conversation`
pub(crate) fn map_conversation(row: &Row) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(conversations::ID)?,
        participant_1_id: row.get(conversations::PARTICIPANT_1_ID)?,
        participant_2_id: row.get(conversations::PARTICIPANT_2_ID)?,
        is_ai_conversation: row.get(conversations::IS_AI_CONVERSATION)?,
        status: row.get(conversations::STATUS)?,
        created_at: row.get(conversations::CREATED_AT)?,
        updated_at: row.get(conversations::UPDATED_AT)?,
        last_message_at: row.get(conversations::LAST_MESSAGE_AT)?,
    })
}

/// Load a conversation on an existing connection
pub(crate) fn find_conversation(
    conn: &Connection,
    id: ConversationId,
) -> Result<Option<Conversation>> {
    Ok(conn
        .query_row(SQL_SELECT_CONVERSATION, params![id], map_conversation)
        .optional()?)
}

fn find_open_between(conn: &Connection, a: UserId, b: UserId) -> Result<Option<Conversation>> {
    Ok(conn
        .query_row(SQL_FIND_OPEN_BETWEEN, params![a, b], map_conversation)
        .optional()?)
}

/// Inbox row for `viewer`, resolving the other side by comparing ids
fn map_summary(row: &Row, viewer: UserId) -> rusqlite::Result<ConversationSummary> {
    let conversation = map_conversation(row)?;
    let viewer_is_first = conversation.participant_1_id == viewer;
    let (name_col, picture_col) = if viewer_is_first {
        ("p2_name", "p2_picture")
    } else {
        ("p1_name", "p1_picture")
    };

    Ok(ConversationSummary {
        other_user_id: conversation.other_participant(viewer),
        other_user_name: row.get(name_col)?,
        other_user_picture: row.get(picture_col)?,
        last_message: row.get("last_message_text")?,
        last_message_type: row.get::<_, Option<MessageType>>("last_message_type")?,
        last_message_time: row.get("last_message_time")?,
        unread_count: row.get("unread_count")?,
        conversation,
    })
}

/// Creates, lists and transitions conversations
#[derive(Debug, Clone)]
pub struct ConversationManager {
    db: Database,
}

impl ConversationManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get a conversation by ID
    pub async fn get(&self, id: ConversationId) -> Result<Conversation> {
        self.db
            .run(move |conn| {
                find_conversation(conn, id)?
                    .ok_or_else(|| MessagingError::NotFound(format!("conversation {id}")))
            })
            .await
    }

    /// The non-deleted conversation between two users, in either id order
    pub async fn find_between(&self, a: UserId, b: UserId) -> Result<Option<Conversation>> {
        self.db.run(move |conn| find_open_between(conn, a, b)).await
    }

    /// Return the open conversation for the pair, creating it if needed.
    ///
    /// The pair is unordered. Concurrent calls for the same pair converge on a
    /// single row through the open-pair unique index.
    pub async fn create_conversation(
        &self,
        participant_1: UserId,
        participant_2: UserId,
        is_ai: bool,
    ) -> Result<(Conversation, bool)> {
        InputValidator::validate_participants(participant_1, participant_2)?;

        self.db
            .run(move |conn| {
                if let Some(existing) = find_open_between(conn, participant_1, participant_2)? {
                    debug!(conversation_id = existing.id, "Reusing existing conversation");
                    return Ok((existing, false));
                }

                let inserted = conn.execute(
                    SQL_INSERT_CONVERSATION,
                    params![participant_1, participant_2, is_ai, Utc::now()],
                )?;

                let conversation = find_open_between(conn, participant_1, participant_2)?
                    .ok_or_else(|| {
                        MessagingError::NotFound(format!(
                            "conversation between {participant_1} and {participant_2}"
                        ))
                    })?;

                if inserted == 1 {
                    info!(
                        conversation_id = conversation.id,
                        participant_1, participant_2, is_ai, "Conversation created"
                    );
                } else {
                    debug!(conversation_id = conversation.id, "Lost creation race, reusing winner");
                }
                Ok((conversation, inserted == 1))
            })
            .await
    }

    /// Inbox for `user_id`: AI conversations first, then most recently updated.
    ///
    /// `search_term` filters on the other participant's display name,
    /// case-insensitively.
    pub async fn list_conversations(
        &self,
        user_id: UserId,
        status: ConversationStatus,
        search_term: Option<&str>,
    ) -> Result<Vec<ConversationSummary>> {
        let needle = search_term
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);

        let summaries = self
            .db
            .run(move |conn| {
                let mut stmt = conn.prepare(SQL_LIST_FOR_USER)?;
                let rows =
                    stmt.query_map(params![user_id, status], |row| map_summary(row, user_id))?;

                let mut results = Vec::new();
                for summary in rows {
                    results.push(summary?);
                }
                Ok(results)
            })
            .await?;

        Ok(match needle {
            Some(needle) => summaries
                .into_iter()
                .filter(|s| {
                    s.other_user_name
                        .as_deref()
                        .is_some_and(|name| name.to_lowercase().contains(&needle))
                })
                .collect(),
            None => summaries,
        })
    }

    /// Transition a conversation's status. Rows are never removed.
    ///
    /// Leaving `deleted` is rejected: the pair may already have a newer open
    /// conversation.
    pub async fn set_status(
        &self,
        id: ConversationId,
        status: ConversationStatus,
    ) -> Result<Conversation> {
        self.db
            .run(move |conn| {
                let current = find_conversation(conn, id)?
                    .ok_or_else(|| MessagingError::NotFound(format!("conversation {id}")))?;

                if current.status == status {
                    return Ok(current);
                }
                if current.status == ConversationStatus::Deleted {
                    return Err(MessagingError::Validation(format!(
                        "conversation {id} is deleted and cannot become {status}"
                    )));
                }

                conn.execute(
                    &format!(
                        "UPDATE {} SET {} = ?1, {} = ?2 WHERE {} = ?3",
                        conversations::TABLE,
                        conversations::STATUS,
                        conversations::UPDATED_AT,
                        conversations::ID
                    ),
                    params![status, Utc::now(), id],
                )?;
                info!(
                    conversation_id = id,
                    from = %current.status,
                    to = %status,
                    "Conversation status changed"
                );

                find_conversation(conn, id)?
                    .ok_or_else(|| MessagingError::NotFound(format!("conversation {id}")))
            })
            .await
    }

    /// Unread messages addressed to `user_id` across their active conversations
    pub async fn unread_count(&self, user_id: UserId) -> Result<i64> {
        self.db
            .run(move |conn| {
                let count = conn.query_row(
                    &format!(
                        "SELECT COUNT(*) FROM {m} m JOIN {c} c ON c.id = m.{conv}
                         WHERE (c.participant_1_id = ?1 OR c.participant_2_id = ?1)
                           AND c.status = 'active'
                           AND m.{sender} <> ?1 AND m.{read} = 0 AND m.{deleted} = 0",
                        m = messages::TABLE,
                        c = conversations::TABLE,
                        conv = messages::CONVERSATION_ID,
                        sender = messages::SENDER_ID,
                        read = messages::IS_READ,
                        deleted = messages::IS_DELETED,
                    ),
                    params![user_id],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
    }
}
