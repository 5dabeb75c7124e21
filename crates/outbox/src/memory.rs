use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use common::{MessageId, SagaId};

use crate::{
    Channel, OutboxError, OutboxMessage, OutboxStatus, Result, SagaStatus, Version,
    repository::{OutboxRepository, validate_status_transition},
};

/// In-memory outbox repository for testing and single-process deployments.
///
/// Provides the same interface and compare-and-swap semantics as the
/// PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryOutboxRepository {
    rows: Arc<RwLock<HashMap<MessageId, OutboxMessage>>>,
}

impl InMemoryOutboxRepository {
    /// Creates a new empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of rows stored.
    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Returns all rows belonging to a saga, in creation order.
    pub async fn rows_for_saga(&self, saga_id: SagaId) -> Vec<OutboxMessage> {
        let rows = self.rows.read().await;
        let mut matched: Vec<_> = rows
            .values()
            .filter(|m| m.saga_id == saga_id)
            .cloned()
            .collect();
        matched.sort_by_key(|m| m.created_at);
        matched
    }

    /// Clears all rows.
    pub async fn clear(&self) {
        self.rows.write().await.clear();
    }
}

#[async_trait]
impl OutboxRepository for InMemoryOutboxRepository {
    async fn save(&self, mut message: OutboxMessage) -> Result<OutboxMessage> {
        let mut rows = self.rows.write().await;

        match rows.get(&message.id) {
            None => {
                if message.version != Version::initial() {
                    return Err(OutboxError::VersionConflict {
                        message_id: message.id,
                        expected: message.version,
                        actual: Version::initial(),
                    });
                }
                message.version = Version::first();
            }
            Some(stored) => {
                if stored.version != message.version {
                    return Err(OutboxError::VersionConflict {
                        message_id: message.id,
                        expected: message.version,
                        actual: stored.version,
                    });
                }
                validate_status_transition(stored, &message)?;
                message.version = message.version.next();
            }
        }

        rows.insert(message.id, message.clone());
        Ok(message)
    }

    async fn get(&self, id: MessageId) -> Result<Option<OutboxMessage>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn find_by_saga(
        &self,
        channel: Channel,
        saga_type: &str,
        saga_id: SagaId,
        saga_statuses: &[SagaStatus],
    ) -> Result<Option<OutboxMessage>> {
        let rows = self.rows.read().await;
        let mut matched: Vec<_> = rows
            .values()
            .filter(|m| {
                m.channel == channel
                    && m.saga_type == saga_type
                    && m.saga_id == saga_id
                    && saga_statuses.contains(&m.saga_status)
            })
            .cloned()
            .collect();
        matched.sort_by_key(|m| m.created_at);
        Ok(matched.pop())
    }

    async fn find_by_status(
        &self,
        channel: Channel,
        saga_type: &str,
        outbox_status: OutboxStatus,
        saga_statuses: &[SagaStatus],
    ) -> Result<Vec<OutboxMessage>> {
        let rows = self.rows.read().await;
        let mut matched: Vec<_> = rows
            .values()
            .filter(|m| {
                m.channel == channel
                    && m.saga_type == saga_type
                    && m.outbox_status == outbox_status
                    && saga_statuses.contains(&m.saga_status)
            })
            .cloned()
            .collect();
        matched.sort_by_key(|m| m.created_at);
        Ok(matched)
    }

    async fn delete_completed(
        &self,
        channel: Channel,
        saga_type: &str,
        outbox_status: OutboxStatus,
        saga_statuses: &[SagaStatus],
    ) -> Result<u64> {
        // A row still queued for send is never deleted.
        if outbox_status == OutboxStatus::Started {
            return Ok(0);
        }

        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, m| {
            !(m.channel == channel
                && m.saga_type == saga_type
                && m.outbox_status == outbox_status
                && saga_statuses.contains(&m.saga_status))
        });
        let deleted = (before - rows.len()) as u64;
        if deleted > 0 {
            metrics::counter!("outbox_rows_deleted").increment(deleted);
        }
        Ok(deleted)
    }
}
