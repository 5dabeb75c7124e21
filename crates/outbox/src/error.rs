use thiserror::Error;

use common::MessageId;

use crate::message::Version;

/// Errors that can occur when interacting with the outbox store.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// The stored version moved since the caller last read the row.
    /// The current attempt should re-read and retry, or yield.
    #[error(
        "Version conflict for outbox message {message_id}: expected version {expected}, found {actual}"
    )]
    VersionConflict {
        message_id: MessageId,
        expected: Version,
        actual: Version,
    },

    /// The requested status change would regress one of the state machines.
    #[error("Invalid status transition for outbox message {message_id}: {from} -> {to}")]
    InvalidTransition {
        message_id: MessageId,
        from: String,
        to: String,
    },

    /// The message was not found in the store.
    #[error("Outbox message not found: {0}")]
    MessageNotFound(MessageId),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OutboxError {
    /// Returns true for an optimistic-lock conflict, which callers treat as
    /// "someone else already advanced this row" and silently yield on.
    pub fn is_conflict(&self) -> bool {
        matches!(self, OutboxError::VersionConflict { .. })
    }
}

/// Result type for outbox operations.
pub type Result<T> = std::result::Result<T, OutboxError>;
