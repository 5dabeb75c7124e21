//! Reply listener: the single path from response topics into the
//! orchestrator.
//!
//! Every reply, real or synthetic, passes the dedup store before it is
//! dispatched, so redeliveries collapse into one orchestrator call.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{error, info, warn};

use domain::ReplyEnvelope;
use messaging::{response_topic, BrokerClient, BrokerRecord, DedupStore};
use outbox::Channel;

use crate::orchestrator::SagaOrchestrator;

/// What [`ReplyListener::handle`] did with one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The reply was dispatched to the orchestrator.
    Processed,
    /// The reply was seen before and dropped.
    Duplicate,
    /// The payload did not parse as a reply and was dropped.
    Malformed,
}

pub struct ReplyListener {
    broker: Arc<dyn BrokerClient>,
    orchestrator: Arc<SagaOrchestrator>,
    dedup: Arc<dyn DedupStore>,
    dedup_ttl: Duration,
}

impl ReplyListener {
    pub fn new(
        broker: Arc<dyn BrokerClient>,
        orchestrator: Arc<SagaOrchestrator>,
        dedup: Arc<dyn DedupStore>,
        dedup_ttl: Duration,
    ) -> Self {
        Self {
            broker,
            orchestrator,
            dedup,
            dedup_ttl,
        }
    }

    /// Consumes all three response topics until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut payment_rx = self.broker.subscribe(response_topic(Channel::Payment)).await;
        let mut room_rx = self.broker.subscribe(response_topic(Channel::Room)).await;
        let mut notification_rx = self
            .broker
            .subscribe(response_topic(Channel::Notification))
            .await;
        info!("reply listener started");

        loop {
            let received = tokio::select! {
                record = payment_rx.recv() => record,
                record = room_rx.recv() => record,
                record = notification_rx.recv() => record,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("reply listener shutting down");
                        return;
                    }
                    continue;
                }
            };

            match received {
                Ok(record) => {
                    self.handle(record).await;
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    // Dropped replies resurface through the relay's retry
                    // of the unanswered command.
                    warn!(missed, "reply listener lagged behind the broker");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    warn!("response topic closed, listener stopping");
                    return;
                }
            }
        }
    }

    /// Parses, deduplicates, and dispatches one record.
    pub async fn handle(&self, record: BrokerRecord) -> HandleOutcome {
        let reply: ReplyEnvelope = match serde_json::from_value(record.payload) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(%err, topic = %record.topic, "dropping malformed reply");
                counter!("saga_replies_malformed").increment(1);
                return HandleOutcome::Malformed;
            }
        };

        if !self.dedup.mark_if_not_processed(reply.id, self.dedup_ttl).await {
            counter!("saga_replies_duplicate").increment(1);
            return HandleOutcome::Duplicate;
        }

        if let Err(err) = self.orchestrator.on_reply(reply).await {
            error!(%err, "orchestrator failed to apply reply");
            counter!("saga_reply_errors").increment(1);
        }
        HandleOutcome::Processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::{BookingStatus, MessageId};
    use domain::{Booking, BookingId, BookingStore, InMemoryBookingStore, Money, RoomId};
    use messaging::{InMemoryBroker, InMemoryDedupStore, OutboxPublisher};
    use outbox::{InMemoryOutboxRepository, OutboxRepository, SagaStatus};

    struct Harness {
        listener: ReplyListener,
        repository: Arc<InMemoryOutboxRepository>,
        booking_store: Arc<InMemoryBookingStore>,
        orchestrator: Arc<SagaOrchestrator>,
    }

    async fn setup() -> (Harness, BookingId) {
        let broker = Arc::new(InMemoryBroker::new());
        let repository = Arc::new(InMemoryOutboxRepository::new());
        let booking_store = Arc::new(InMemoryBookingStore::new());
        let publisher = Arc::new(OutboxPublisher::new(broker.clone(), repository.clone()));
        let orchestrator = Arc::new(SagaOrchestrator::new(
            repository.clone(),
            publisher,
            booking_store.clone(),
        ));
        let listener = ReplyListener::new(
            broker,
            orchestrator.clone(),
            Arc::new(InMemoryDedupStore::new()),
            Duration::from_secs(60),
        );

        let booking = Booking::new(
            "guest@example.com",
            vec![RoomId::new("R-204")],
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 9, 4).unwrap(),
            Money::from_cents(15000),
        );
        let booking_id = booking.id;
        booking_store.save(booking).await.unwrap();

        (
            Harness {
                listener,
                repository,
                booking_store,
                orchestrator,
            },
            booking_id,
        )
    }

    fn record_for(reply: &ReplyEnvelope) -> BrokerRecord {
        BrokerRecord::new(
            response_topic(reply.channel),
            reply.saga_id,
            reply.id,
            serde_json::to_value(reply).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_processes_reply_and_advances_saga() {
        let (harness, booking_id) = setup().await;
        let saga_id = harness.orchestrator.begin(booking_id).await.unwrap();

        let row = harness
            .repository
            .find_by_saga(
                Channel::Payment,
                crate::SAGA_TYPE,
                saga_id,
                &[SagaStatus::Started],
            )
            .await
            .unwrap()
            .unwrap();
        let reply = ReplyEnvelope::completed(saga_id, Channel::Payment, row.id, "PAY-0001");

        let outcome = harness.listener.handle(record_for(&reply)).await;
        assert_eq!(outcome, HandleOutcome::Processed);

        let booking = harness.booking_store.get(booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::DepositPaid);
    }

    #[tokio::test]
    async fn test_duplicate_reply_is_dropped() {
        let (harness, booking_id) = setup().await;
        let saga_id = harness.orchestrator.begin(booking_id).await.unwrap();

        let row = harness
            .repository
            .find_by_saga(
                Channel::Payment,
                crate::SAGA_TYPE,
                saga_id,
                &[SagaStatus::Started],
            )
            .await
            .unwrap()
            .unwrap();
        let reply = ReplyEnvelope::completed(saga_id, Channel::Payment, row.id, "PAY-0001");

        assert_eq!(
            harness.listener.handle(record_for(&reply)).await,
            HandleOutcome::Processed
        );
        assert_eq!(
            harness.listener.handle(record_for(&reply)).await,
            HandleOutcome::Duplicate
        );
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dropped() {
        let (harness, _) = setup().await;
        let record = BrokerRecord::new(
            response_topic(Channel::Payment),
            outbox::SagaId::new(),
            MessageId::new(),
            serde_json::json!({"not": "a reply"}),
        );
        assert_eq!(harness.listener.handle(record).await, HandleOutcome::Malformed);
    }
}
