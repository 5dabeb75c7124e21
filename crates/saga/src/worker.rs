//! Participant workers: consume a channel's request topic, execute the
//! command against the participant service, and publish the reply.
//!
//! The relay may deliver a command more than once. The dedup store
//! makes execution happen at most once; a redelivered command is
//! answered by replaying the cached reply, which carries the original
//! reply ID and therefore collapses again at the listener.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tracing::{info, warn};

use domain::{NotificationCommand, PaymentCommand, ReplyEnvelope, RoomCommand};
use messaging::{request_topic, response_topic, BrokerClient, BrokerRecord, DedupStore};
use outbox::Channel;

use crate::services::{Notifier, PaymentGateway, RoomInventory, ServiceRejection};

/// One channel's command execution logic.
#[async_trait]
pub trait ParticipantHandler: Send + Sync {
    fn channel(&self) -> Channel;

    /// Executes a command payload, returning a participant reference.
    async fn execute(&self, payload: &serde_json::Value) -> Result<String, ServiceRejection>;
}

pub struct PaymentParticipant {
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentParticipant {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl ParticipantHandler for PaymentParticipant {
    fn channel(&self) -> Channel {
        Channel::Payment
    }

    async fn execute(&self, payload: &serde_json::Value) -> Result<String, ServiceRejection> {
        let command: PaymentCommand = serde_json::from_value(payload.clone())
            .map_err(|err| ServiceRejection::new(format!("malformed payment command: {err}")))?;
        match command {
            PaymentCommand::Charge {
                booking_id,
                amount_cents,
            } => self.gateway.charge(booking_id, amount_cents).await,
            PaymentCommand::Refund { booking_id } => self.gateway.refund(booking_id).await,
        }
    }
}

pub struct RoomParticipant {
    inventory: Arc<dyn RoomInventory>,
}

impl RoomParticipant {
    pub fn new(inventory: Arc<dyn RoomInventory>) -> Self {
        Self { inventory }
    }
}

#[async_trait]
impl ParticipantHandler for RoomParticipant {
    fn channel(&self) -> Channel {
        Channel::Room
    }

    async fn execute(&self, payload: &serde_json::Value) -> Result<String, ServiceRejection> {
        let command: RoomCommand = serde_json::from_value(payload.clone())
            .map_err(|err| ServiceRejection::new(format!("malformed room command: {err}")))?;
        match command {
            RoomCommand::Reserve {
                booking_id,
                room_ids,
                check_in,
                check_out,
            } => {
                self.inventory
                    .reserve(booking_id, &room_ids, check_in, check_out)
                    .await
            }
            RoomCommand::Release { booking_id } => self.inventory.release(booking_id).await,
        }
    }
}

pub struct NotificationParticipant {
    notifier: Arc<dyn Notifier>,
}

impl NotificationParticipant {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl ParticipantHandler for NotificationParticipant {
    fn channel(&self) -> Channel {
        Channel::Notification
    }

    async fn execute(&self, payload: &serde_json::Value) -> Result<String, ServiceRejection> {
        let command: NotificationCommand = serde_json::from_value(payload.clone())
            .map_err(|err| ServiceRejection::new(format!("malformed notification command: {err}")))?;
        match command {
            NotificationCommand::Send {
                booking_id,
                guest_email,
            } => self.notifier.send(booking_id, &guest_email).await,
            NotificationCommand::Cancel { booking_id } => self.notifier.cancel(booking_id).await,
        }
    }
}

/// What [`ParticipantWorker::handle`] did with one command record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// First delivery: the command was executed and a fresh reply sent.
    Executed,
    /// Redelivery with a cached reply: the original reply was re-sent.
    Replayed,
    /// Redelivery still being executed elsewhere: dropped.
    Dropped,
}

pub struct ParticipantWorker {
    handler: Arc<dyn ParticipantHandler>,
    broker: Arc<dyn BrokerClient>,
    dedup: Arc<dyn DedupStore>,
    dedup_ttl: Duration,
}

impl ParticipantWorker {
    pub fn new(
        handler: Arc<dyn ParticipantHandler>,
        broker: Arc<dyn BrokerClient>,
        dedup: Arc<dyn DedupStore>,
        dedup_ttl: Duration,
    ) -> Self {
        Self {
            handler,
            broker,
            dedup,
            dedup_ttl,
        }
    }

    /// Consumes the channel's request topic until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let channel = self.handler.channel();
        let mut rx = self.broker.subscribe(request_topic(channel)).await;
        info!(%channel, "participant worker started");

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(record) => {
                        self.handle(record).await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        // Missed commands come back through the relay.
                        warn!(%channel, missed, "worker lagged behind the broker");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        warn!(%channel, "request topic closed, worker stopping");
                        return;
                    }
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(%channel, "participant worker shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// Executes one command exactly once, replying through the response
    /// topic either way.
    pub async fn handle(&self, record: BrokerRecord) -> WorkerOutcome {
        let channel = self.handler.channel();

        if !self
            .dedup
            .mark_if_not_processed(record.message_id, self.dedup_ttl)
            .await
        {
            counter!("participant_duplicates", "channel" => channel.as_str()).increment(1);
            let Some(cached) = self.dedup.get_response(record.message_id).await else {
                // First delivery is still executing; its reply will cover
                // this redelivery too.
                return WorkerOutcome::Dropped;
            };
            let reply_id = cached
                .get("id")
                .and_then(|id| serde_json::from_value(id.clone()).ok())
                .unwrap_or(record.message_id);
            let replay = BrokerRecord::new(response_topic(channel), record.key, reply_id, cached);
            if let Err(err) = self.broker.send(replay).await {
                warn!(%err, %channel, "could not replay cached reply");
            }
            return WorkerOutcome::Replayed;
        }

        let reply = match self.handler.execute(&record.payload).await {
            Ok(reference) => {
                ReplyEnvelope::completed(record.key, channel, record.message_id, reference)
            }
            Err(rejection) => {
                info!(%channel, reason = %rejection, "command rejected");
                counter!("participant_rejections", "channel" => channel.as_str()).increment(1);
                ReplyEnvelope::rejected(record.key, channel, record.message_id, rejection.0)
            }
        };

        let payload = match serde_json::to_value(&reply) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, %channel, "could not serialize reply");
                return WorkerOutcome::Executed;
            }
        };
        self.dedup
            .put_response(record.message_id, payload.clone(), self.dedup_ttl)
            .await;

        let outgoing = BrokerRecord::new(response_topic(channel), record.key, reply.id, payload);
        if let Err(err) = self.broker.send(outgoing).await {
            // The reply is cached; the relay's redelivery of the command
            // will replay it.
            warn!(%err, %channel, "could not send reply");
        }
        WorkerOutcome::Executed
    }
}
