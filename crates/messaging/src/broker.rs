//! Broker abstraction and in-memory implementation.
//!
//! The in-memory broker is a map of broadcast channels, one per topic,
//! with lazy topic creation. It deliberately offers no durability; the
//! outbox rows are the durable side of delivery.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use common::{MessageId, SagaId};

use crate::error::MessagingError;

/// A single record on a topic.
#[derive(Debug, Clone)]
pub struct BrokerRecord {
    pub topic: String,
    /// Partition key. All records of one saga share it so a real broker
    /// would keep them ordered.
    pub key: SagaId,
    pub message_id: MessageId,
    pub payload: serde_json::Value,
}

impl BrokerRecord {
    pub fn new(
        topic: impl Into<String>,
        key: SagaId,
        message_id: MessageId,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            topic: topic.into(),
            key,
            message_id,
            payload,
        }
    }
}

/// Transport for records. Implementations move bytes and nothing else;
/// redelivery and dedup live above this trait.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn send(&self, record: BrokerRecord) -> Result<(), MessagingError>;

    async fn subscribe(&self, topic: &str) -> broadcast::Receiver<BrokerRecord>;
}

const TOPIC_CAPACITY: usize = 256;

struct BrokerInner {
    topics: HashMap<String, broadcast::Sender<BrokerRecord>>,
    fail_topics: HashMap<String, bool>,
    sent_counts: HashMap<String, u64>,
}

/// Broadcast-channel broker for tests and local runs.
pub struct InMemoryBroker {
    inner: Arc<RwLock<BrokerInner>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(BrokerInner {
                topics: HashMap::new(),
                fail_topics: HashMap::new(),
                sent_counts: HashMap::new(),
            })),
        }
    }

    /// Makes every send to `topic` fail until cleared. Test hook.
    pub async fn set_fail_topic(&self, topic: &str, fail: bool) {
        self.inner
            .write()
            .await
            .fail_topics
            .insert(topic.to_string(), fail);
    }

    /// Number of records successfully sent to `topic`.
    pub async fn sent_count(&self, topic: &str) -> u64 {
        self.inner
            .read()
            .await
            .sent_counts
            .get(topic)
            .copied()
            .unwrap_or(0)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerClient for InMemoryBroker {
    async fn send(&self, record: BrokerRecord) -> Result<(), MessagingError> {
        let mut inner = self.inner.write().await;

        if inner.fail_topics.get(&record.topic).copied().unwrap_or(false) {
            return Err(MessagingError::SendFailed {
                topic: record.topic.clone(),
                reason: "injected failure".to_string(),
            });
        }

        let topic = record.topic.clone();
        let sender = inner
            .topics
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone();

        debug!(topic = %topic, message_id = %record.message_id, "broker send");
        // A send with no subscribers is fine; records are not durable here.
        let _ = sender.send(record);
        *inner.sent_counts.entry(topic).or_insert(0) += 1;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> broadcast::Receiver<BrokerRecord> {
        let mut inner = self.inner.write().await;
        inner
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(topic: &str) -> BrokerRecord {
        BrokerRecord::new(
            topic,
            SagaId::new(),
            MessageId::new(),
            serde_json::json!({"k": "v"}),
        )
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let broker = InMemoryBroker::new();
        let mut rx = broker.subscribe("payment-request").await;

        broker.send(record("payment-request")).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.topic, "payment-request");
        assert_eq!(broker.sent_count("payment-request").await, 1);
    }

    #[tokio::test]
    async fn test_send_without_subscribers_succeeds() {
        let broker = InMemoryBroker::new();
        broker.send(record("room-request")).await.unwrap();
        assert_eq!(broker.sent_count("room-request").await, 1);
    }

    #[tokio::test]
    async fn test_fail_topic_injection() {
        let broker = InMemoryBroker::new();
        broker.set_fail_topic("payment-request", true).await;

        let result = broker.send(record("payment-request")).await;
        assert!(matches!(result, Err(MessagingError::SendFailed { .. })));
        assert_eq!(broker.sent_count("payment-request").await, 0);

        broker.set_fail_topic("payment-request", false).await;
        broker.send(record("payment-request")).await.unwrap();
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let broker = InMemoryBroker::new();
        let mut payment_rx = broker.subscribe("payment-response").await;
        let mut room_rx = broker.subscribe("room-response").await;

        broker.send(record("room-response")).await.unwrap();

        assert_eq!(room_rx.recv().await.unwrap().topic, "room-response");
        assert!(matches!(
            payment_rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
