use async_trait::async_trait;

use common::{MessageId, SagaId};

use crate::error::OutboxError;
use crate::message::{Channel, OutboxMessage};
use crate::status::{OutboxStatus, SagaStatus};
use crate::Result;

/// Validates that `incoming` does not regress either status machine
/// relative to the `stored` row.
pub fn validate_status_transition(stored: &OutboxMessage, incoming: &OutboxMessage) -> Result<()> {
    if stored.outbox_status != incoming.outbox_status
        && !stored.outbox_status.can_transition_to(incoming.outbox_status)
    {
        return Err(OutboxError::InvalidTransition {
            message_id: incoming.id,
            from: stored.outbox_status.to_string(),
            to: incoming.outbox_status.to_string(),
        });
    }
    if stored.saga_status != incoming.saga_status
        && !stored.saga_status.can_transition_to(incoming.saga_status)
    {
        return Err(OutboxError::InvalidTransition {
            message_id: incoming.id,
            from: stored.saga_status.to_string(),
            to: incoming.saga_status.to_string(),
        });
    }
    Ok(())
}

/// Typed query surface over the outbox store.
///
/// All implementations must be thread-safe (Send + Sync). Multiple
/// processes may race on the same rows; safety comes exclusively from the
/// version compare-and-swap in [`save`](OutboxRepository::save), never from
/// external locking.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Upserts an outbox message.
    ///
    /// For a new row, `message.version` must be [`Version::initial`]
    /// (never stored). For an update, `message.version` must equal the
    /// version the caller last read; otherwise the save is rejected with
    /// [`OutboxError::VersionConflict`] and the caller must re-read and
    /// retry or yield. Status changes that regress either state machine
    /// are rejected with [`OutboxError::InvalidTransition`].
    ///
    /// Returns the stored message with its new version.
    ///
    /// [`Version::initial`]: crate::message::Version::initial
    /// [`OutboxError::VersionConflict`]: crate::error::OutboxError::VersionConflict
    /// [`OutboxError::InvalidTransition`]: crate::error::OutboxError::InvalidTransition
    async fn save(&self, message: OutboxMessage) -> Result<OutboxMessage>;

    /// Looks up a single message by its ID.
    async fn get(&self, id: MessageId) -> Result<Option<OutboxMessage>>;

    /// Finds the at-most-one row correlating an incoming reply to its
    /// outstanding outbox message.
    ///
    /// Returns `None` (not an error) when no row matches.
    async fn find_by_saga(
        &self,
        channel: Channel,
        saga_type: &str,
        saga_id: SagaId,
        saga_statuses: &[SagaStatus],
    ) -> Result<Option<OutboxMessage>>;

    /// The relay's polling query: all rows for a channel in the given
    /// delivery status whose saga status is in `saga_statuses`.
    ///
    /// Must be satisfiable efficiently under an index on
    /// `(channel, outbox_status, saga_status)`.
    async fn find_by_status(
        &self,
        channel: Channel,
        saga_type: &str,
        outbox_status: OutboxStatus,
        saga_statuses: &[SagaStatus],
    ) -> Result<Vec<OutboxMessage>>;

    /// Garbage-collects rows that are both delivered and saga-terminal.
    ///
    /// Returns the number of rows deleted. Rows with
    /// `outbox_status = Started` are never eligible.
    async fn delete_completed(
        &self,
        channel: Channel,
        saga_type: &str,
        outbox_status: OutboxStatus,
        saga_statuses: &[SagaStatus],
    ) -> Result<u64>;
}
