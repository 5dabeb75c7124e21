//! Outbox publisher: sends a stored outbox row to the broker and
//! settles the row's outbox status afterwards.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use tracing::{info, instrument, warn};

use outbox::{OutboxMessage, OutboxRepository, OutboxStatus};

use crate::broker::{BrokerClient, BrokerRecord};
use crate::error::MessagingError;
use crate::topics::request_topic;

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Publishes outbox rows to their channel's request topic.
///
/// A successful send is recorded back on the row as `Completed`. The
/// completion write uses the row's version; if another writer got there
/// first the publisher retries once against the fresh row, then yields.
/// A failed send leaves the row `Started` so the relay redelivers it;
/// only the relay's retry budget ever moves a row to `Failed`.
pub struct OutboxPublisher {
    broker: Arc<dyn BrokerClient>,
    repository: Arc<dyn OutboxRepository>,
    send_timeout: Duration,
}

impl OutboxPublisher {
    pub fn new(broker: Arc<dyn BrokerClient>, repository: Arc<dyn OutboxRepository>) -> Self {
        Self {
            broker,
            repository,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Sends a row's payload to the broker and records the outcome.
    ///
    /// Broker failures do not error: the row keeps (or records) a
    /// retryable status and the relay redelivers it later.
    #[instrument(skip(self, message), fields(message_id = %message.id, channel = %message.channel))]
    pub async fn publish(&self, message: OutboxMessage) -> Result<(), MessagingError> {
        let topic = request_topic(message.channel);
        let record = BrokerRecord::new(topic, message.saga_id, message.id, message.payload.clone());

        let sent = match tokio::time::timeout(self.send_timeout, self.broker.send(record)).await {
            Ok(Ok(())) => true,
            Ok(Err(error)) => {
                warn!(%error, topic, "broker send failed");
                false
            }
            Err(_) => {
                warn!(topic, "broker send timed out");
                false
            }
        };

        if sent {
            counter!("outbox_messages_published", "channel" => message.channel.as_str()).increment(1);
            self.record_completed(message).await;
        } else {
            counter!("outbox_publish_failures", "channel" => message.channel.as_str()).increment(1);
        }
        Ok(())
    }

    /// Marks the row `Completed` after an acknowledged send. Version
    /// conflicts mean another writer touched the row; one retry against
    /// the fresh row, then yield.
    async fn record_completed(&self, message: OutboxMessage) {
        let mut attempt = message;
        for retry in 0..2 {
            if attempt.outbox_status.can_transition_to(OutboxStatus::Completed) {
                attempt.outbox_status = OutboxStatus::Completed;
            }
            attempt.processed_at = Some(Utc::now());

            match self.repository.save(attempt.clone()).await {
                Ok(_) => return,
                Err(error) if error.is_conflict() && retry == 0 => {
                    match self.repository.get(attempt.id).await {
                        Ok(Some(fresh)) if !fresh.outbox_status.is_terminal() => attempt = fresh,
                        Ok(_) => {
                            info!(message_id = %attempt.id, "row already settled elsewhere");
                            return;
                        }
                        Err(error) => {
                            warn!(%error, message_id = %attempt.id, "re-read after conflict failed");
                            return;
                        }
                    }
                }
                Err(error) => {
                    warn!(%error, message_id = %attempt.id, "could not record publish outcome");
                    return;
                }
            }
        }
    }
}
