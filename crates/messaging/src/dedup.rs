//! Idempotency guards for at-least-once delivery.
//!
//! Two concerns share a TTL: a processed-marker keyed by message ID so
//! redeliveries are dropped, and a response cache keyed by correlation
//! ID so a duplicate request can be answered with the original reply
//! instead of being re-executed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use common::MessageId;

/// Default entry lifetime; past it a redelivery would be re-processed.
pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Marks `key` as processed. Returns true if this call was the
    /// first to mark it; the check and the mark are a single atomic
    /// step.
    async fn mark_if_not_processed(&self, key: MessageId, ttl: Duration) -> bool;

    /// Caches the reply produced for a request, keyed by the request's
    /// message ID.
    async fn put_response(&self, correlation_id: MessageId, response: serde_json::Value, ttl: Duration);

    /// Returns the cached reply for a request, if any.
    async fn get_response(&self, correlation_id: MessageId) -> Option<serde_json::Value>;
}

struct DedupInner {
    processed: HashMap<MessageId, Instant>,
    responses: HashMap<MessageId, (serde_json::Value, Instant)>,
}

impl DedupInner {
    fn purge(&mut self, now: Instant) {
        self.processed.retain(|_, expires| *expires > now);
        self.responses.retain(|_, (_, expires)| *expires > now);
    }
}

/// Mutex-backed dedup store for tests and local runs.
pub struct InMemoryDedupStore {
    inner: Arc<Mutex<DedupInner>>,
}

impl InMemoryDedupStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(DedupInner {
                processed: HashMap::new(),
                responses: HashMap::new(),
            })),
        }
    }

    pub async fn processed_count(&self) -> usize {
        self.inner.lock().await.processed.len()
    }
}

impl Default for InMemoryDedupStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DedupStore for InMemoryDedupStore {
    async fn mark_if_not_processed(&self, key: MessageId, ttl: Duration) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        inner.purge(now);
        match inner.processed.get(&key) {
            Some(_) => false,
            None => {
                inner.processed.insert(key, now + ttl);
                true
            }
        }
    }

    async fn put_response(
        &self,
        correlation_id: MessageId,
        response: serde_json::Value,
        ttl: Duration,
    ) {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        inner.purge(now);
        inner.responses.insert(correlation_id, (response, now + ttl));
    }

    async fn get_response(&self, correlation_id: MessageId) -> Option<serde_json::Value> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        inner.purge(now);
        inner
            .responses
            .get(&correlation_id)
            .map(|(response, _)| response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_mark_wins() {
        let store = InMemoryDedupStore::new();
        let key = MessageId::new();

        assert!(store.mark_if_not_processed(key, DEFAULT_DEDUP_TTL).await);
        assert!(!store.mark_if_not_processed(key, DEFAULT_DEDUP_TTL).await);
        assert_eq!(store.processed_count().await, 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_are_independent() {
        let store = InMemoryDedupStore::new();
        assert!(
            store
                .mark_if_not_processed(MessageId::new(), DEFAULT_DEDUP_TTL)
                .await
        );
        assert!(
            store
                .mark_if_not_processed(MessageId::new(), DEFAULT_DEDUP_TTL)
                .await
        );
    }

    #[tokio::test]
    async fn test_expired_mark_is_forgotten() {
        let store = InMemoryDedupStore::new();
        let key = MessageId::new();

        assert!(store.mark_if_not_processed(key, Duration::ZERO).await);
        // TTL of zero expires immediately; the next mark succeeds again.
        assert!(store.mark_if_not_processed(key, DEFAULT_DEDUP_TTL).await);
    }

    #[tokio::test]
    async fn test_response_cache_roundtrip() {
        let store = InMemoryDedupStore::new();
        let correlation_id = MessageId::new();
        let response = serde_json::json!({"success": true, "reference": "PAY-0001"});

        store
            .put_response(correlation_id, response.clone(), DEFAULT_DEDUP_TTL)
            .await;
        assert_eq!(store.get_response(correlation_id).await, Some(response));
        assert_eq!(store.get_response(MessageId::new()).await, None);
    }

    #[tokio::test]
    async fn test_expired_response_is_purged() {
        let store = InMemoryDedupStore::new();
        let correlation_id = MessageId::new();

        store
            .put_response(correlation_id, serde_json::json!({}), Duration::ZERO)
            .await;
        assert_eq!(store.get_response(correlation_id).await, None);
    }

    #[tokio::test]
    async fn test_concurrent_marks_exactly_one_wins() {
        let store = Arc::new(InMemoryDedupStore::new());
        let key = MessageId::new();

        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.mark_if_not_processed(key, DEFAULT_DEDUP_TTL).await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.mark_if_not_processed(key, DEFAULT_DEDUP_TTL).await })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a ^ b, "exactly one concurrent mark must win");
    }
}
