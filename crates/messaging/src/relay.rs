//! Outbox relay: periodically redelivers rows the publisher left
//! behind and garbage-collects settled rows.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use tracing::{debug, error, info, instrument, warn};

use domain::ReplyEnvelope;
use outbox::{Channel, OutboxMessage, OutboxRepository, OutboxStatus, SagaStatus};

use crate::broker::{BrokerClient, BrokerRecord};
use crate::publisher::OutboxPublisher;
use crate::topics::response_topic;

/// Relay timing and retry policy.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Business process whose rows this relay owns.
    pub saga_type: String,
    /// Pause between ticks.
    pub interval: Duration,
    /// Grace period before the first tick, so a restarting service does
    /// not immediately re-send rows the publisher is still settling.
    pub startup_delay: Duration,
    /// How long a row may stay undelivered before it is given up on.
    pub retry_budget: Duration,
}

impl RelayConfig {
    pub fn new(saga_type: impl Into<String>) -> Self {
        Self {
            saga_type: saga_type.into(),
            interval: Duration::from_secs(60),
            startup_delay: Duration::from_secs(60),
            retry_budget: Duration::from_secs(15 * 60),
        }
    }
}

/// What one tick did, for logs and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayTickSummary {
    pub republished: u64,
    pub expired: u64,
    pub deleted: u64,
    pub errors: u64,
}

/// Periodically scans each channel for rows still `Started`, re-sends
/// the ones within their retry budget, and fails the rest.
///
/// An expired row gets a synthetic failure reply on its response topic
/// so the orchestrator hears about it through the same path as a real
/// participant rejection. Several relay instances may race on the same
/// rows; the version compare-and-swap in the repository makes that safe,
/// and a conflict just means another instance won.
pub struct OutboxRelay {
    repository: Arc<dyn OutboxRepository>,
    publisher: Arc<OutboxPublisher>,
    broker: Arc<dyn BrokerClient>,
    config: RelayConfig,
}

impl OutboxRelay {
    pub fn new(
        repository: Arc<dyn OutboxRepository>,
        publisher: Arc<OutboxPublisher>,
        broker: Arc<dyn BrokerClient>,
        config: RelayConfig,
    ) -> Self {
        Self {
            repository,
            publisher,
            broker,
            config,
        }
    }

    /// Runs ticks until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            startup_delay_secs = self.config.startup_delay.as_secs(),
            "outbox relay starting"
        );

        tokio::select! {
            _ = tokio::time::sleep(self.config.startup_delay) => {}
            _ = shutdown.changed() => {
                info!("outbox relay stopped before first tick");
                return;
            }
        }

        let mut ticker = tokio::time::interval(self.config.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let summary = self.tick().await;
                    debug!(?summary, "relay tick finished");
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("outbox relay shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// One pass over all channels. Errors are isolated per row; a bad
    /// row never stops the scan.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> RelayTickSummary {
        let mut summary = RelayTickSummary::default();
        for channel in Channel::ALL {
            self.relay_channel(channel, &mut summary).await;
            self.collect_channel(channel, &mut summary).await;
        }
        summary
    }

    async fn relay_channel(&self, channel: Channel, summary: &mut RelayTickSummary) {
        let pending = match self
            .repository
            .find_by_status(
                channel,
                &self.config.saga_type,
                OutboxStatus::Started,
                &SagaStatus::RETRYABLE,
            )
            .await
        {
            Ok(pending) => pending,
            Err(err) => {
                error!(%err, %channel, "relay polling query failed");
                summary.errors += 1;
                return;
            }
        };

        let now = Utc::now();
        for row in pending {
            if row.age(now) > chrono::Duration::from_std(self.config.retry_budget).unwrap_or_default()
            {
                match self.expire_row(row).await {
                    Ok(true) => summary.expired += 1,
                    Ok(false) => {} // another instance settled it first
                    Err(err) => {
                        warn!(%err, %channel, "could not expire outbox row");
                        summary.errors += 1;
                    }
                }
            } else {
                match self.publisher.publish(row).await {
                    Ok(()) => summary.republished += 1,
                    Err(err) => {
                        warn!(%err, %channel, "relay republish failed");
                        summary.errors += 1;
                    }
                }
            }
        }
    }

    /// Marks an exhausted row `Failed` and tells the orchestrator via a
    /// synthetic failure reply on the row's response topic. Returns
    /// false when a concurrent writer settled the row first.
    async fn expire_row(&self, row: OutboxMessage) -> outbox::Result<bool> {
        let mut expired = row.clone();
        expired.outbox_status = OutboxStatus::Failed;
        expired.processed_at = Some(Utc::now());

        match self.repository.save(expired).await {
            Ok(_) => {}
            Err(err) if err.is_conflict() => {
                debug!(message_id = %row.id, "expiry lost the version race");
                return Ok(false);
            }
            Err(err) => return Err(err),
        }

        counter!("outbox_rows_expired", "channel" => row.channel.as_str()).increment(1);
        warn!(
            message_id = %row.id,
            saga_id = %row.saga_id,
            channel = %row.channel,
            "outbox row exhausted its retry budget"
        );

        let reply = ReplyEnvelope::rejected(
            row.saga_id,
            row.channel,
            row.id,
            "delivery retry budget exhausted",
        );
        let payload = serde_json::to_value(&reply)?;
        let record = BrokerRecord::new(response_topic(row.channel), row.saga_id, reply.id, payload);
        if let Err(err) = self.broker.send(record).await {
            // The row is already Failed; the reply will not be retried.
            // Operator attention is needed if this actually happens.
            error!(%err, message_id = %row.id, "could not deliver synthetic failure reply");
        }
        Ok(true)
    }

    async fn collect_channel(&self, channel: Channel, summary: &mut RelayTickSummary) {
        match self
            .repository
            .delete_completed(
                channel,
                &self.config.saga_type,
                OutboxStatus::Completed,
                &SagaStatus::TERMINAL,
            )
            .await
        {
            Ok(deleted) => summary.deleted += deleted,
            Err(err) => {
                warn!(%err, %channel, "outbox garbage collection failed");
                summary.errors += 1;
            }
        }
    }
}
