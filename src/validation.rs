use crate::error::{MessagingError, Result};
use crate::models::{Attachment, Page, UserId};
use regex::Regex;
use std::sync::OnceLock;

/// Maximum accepted length of an attachment filename
const MAX_ATTACHMENT_NAME_LEN: usize = 255;
/// Maximum accepted length of an attachment url/path
const MAX_ATTACHMENT_URL_LEN: usize = 2048;

fn invalid(reason: impl Into<String>) -> MessagingError {
    MessagingError::Validation(reason.into())
}

/// Validation utilities for input sanitization and edge case handling
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a send request and return the sanitized text.
    ///
    /// At least one of text or attachment must be present. Whitespace-only
    /// text counts as absent.
    pub fn validate_send(
        text: Option<&str>,
        attachment: Option<&Attachment>,
        max_text_length: usize,
    ) -> Result<Option<String>> {
        let text = text.map(Self::sanitize_text).filter(|t| !t.is_empty());

        if text.is_none() && attachment.is_none() {
            return Err(invalid("Message must contain text or an attachment"));
        }

        if let Some(text) = &text {
            if text.chars().count() > max_text_length {
                return Err(invalid(format!(
                    "Message too long (max {max_text_length} characters)"
                )));
            }
        }

        if let Some(attachment) = attachment {
            Self::validate_attachment(attachment)?;
        }

        Ok(text)
    }

    /// Validate an attachment reference
    pub fn validate_attachment(attachment: &Attachment) -> Result<()> {
        if attachment.url.trim().is_empty() {
            return Err(invalid("Attachment url cannot be empty"));
        }
        if attachment.url.len() > MAX_ATTACHMENT_URL_LEN {
            return Err(invalid("Attachment url too long"));
        }

        if attachment.original_name.trim().is_empty() {
            return Err(invalid("Attachment name cannot be empty"));
        }
        if attachment.original_name.len() > MAX_ATTACHMENT_NAME_LEN {
            return Err(invalid(format!(
                "Attachment name too long (max {MAX_ATTACHMENT_NAME_LEN} characters)"
            )));
        }
        if attachment.original_name.contains(['\0', '/', '\\']) {
            return Err(invalid("Attachment name contains invalid characters"));
        }

        if attachment.size_bytes < 0 {
            return Err(invalid("Attachment size cannot be negative"));
        }

        Ok(())
    }

    /// Validate the two participants of a new conversation
    pub fn validate_participants(participant_1: UserId, participant_2: UserId) -> Result<()> {
        if participant_1 == participant_2 {
            return Err(invalid("A conversation needs two different participants"));
        }
        Ok(())
    }

    /// Clamp a requested page into the configured bounds
    #[must_use]
    pub fn clamp_page(
        limit: Option<u32>,
        offset: Option<u32>,
        default_limit: u32,
        max_limit: u32,
    ) -> Page {
        let limit = limit.filter(|l| *l > 0).unwrap_or(default_limit).min(max_limit);
        Page {
            limit,
            offset: offset.unwrap_or(0),
        }
    }

    /// Normalize a search term.
    ///
    /// Returns `None` when the trimmed term is shorter than `min_chars`, in
    /// which case no query should be issued.
    #[must_use]
    pub fn normalize_search_term(term: &str, min_chars: usize) -> Option<String> {
        let trimmed = term.trim();
        if trimmed.chars().count() < min_chars {
            return None;
        }
        Some(trimmed.to_string())
    }

    /// Build an FTS5 match expression from a free-text term.
    ///
    /// Each word becomes a quoted token and tokens are OR-ed, so user input can
    /// never be interpreted as FTS5 query syntax.
    #[must_use]
    pub fn fts_match_expression(term: &str) -> Option<String> {
        static WORD: OnceLock<Regex> = OnceLock::new();
        #[allow(clippy::expect_used)]
        let word =
            WORD.get_or_init(|| Regex::new(r"[\p{L}\p{N}_]+").expect("word pattern is valid"));

        let tokens: Vec<String> = word
            .find_iter(term)
            .map(|m| format!("\"{}\"", m.as_str()))
            .collect();

        if tokens.is_empty() {
            None
        } else {
            Some(tokens.join(" OR "))
        }
    }

    /// Sanitize text input
    #[must_use]
    pub fn sanitize_text(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r')
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Validate database URL
    pub fn validate_database_url(url: &str) -> anyhow::Result<()> {
        if url.trim().is_empty() {
            return Err(anyhow::anyhow!("Database URL cannot be empty"));
        }

        if !url.starts_with("sqlite:") {
            return Err(anyhow::anyhow!("Only SQLite databases are supported"));
        }

        if url.len() > 1000 {
            return Err(anyhow::anyhow!("Database URL too long"));
        }

        Ok(())
    }
}
