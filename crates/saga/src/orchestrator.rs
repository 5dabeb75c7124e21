//! The booking saga orchestrator.
//!
//! All durable state lives in the outbox rows; the orchestrator holds
//! nothing between replies and can therefore run on every instance of
//! the service at once. Races between instances are settled by the
//! repository's version compare-and-swap: the loser logs and yields,
//! trusting that the winner drove the saga forward.

use std::sync::Arc;

use metrics::counter;
use tracing::{info, instrument, warn};

use common::{BookingId, BookingStatus};
use domain::{BookingStore, DomainError, ReplyEnvelope};
use messaging::OutboxPublisher;
use outbox::{OutboxMessage, OutboxRepository, SagaId, SagaStatus};

use crate::booking_flow::{booking_steps, SAGA_TYPE};
use crate::error::SagaError;
use crate::steps::{SagaStep, StepContext};

/// Statuses under which a reply can still act on a row.
const OUTSTANDING: [SagaStatus; 2] = [SagaStatus::Started, SagaStatus::Compensating];

pub struct SagaOrchestrator {
    repository: Arc<dyn OutboxRepository>,
    publisher: Arc<OutboxPublisher>,
    booking_store: Arc<dyn BookingStore>,
    steps: Vec<Arc<dyn SagaStep>>,
}

impl SagaOrchestrator {
    pub fn new(
        repository: Arc<dyn OutboxRepository>,
        publisher: Arc<OutboxPublisher>,
        booking_store: Arc<dyn BookingStore>,
    ) -> Self {
        Self {
            repository,
            publisher,
            booking_store,
            steps: booking_steps(),
        }
    }

    /// Starts a saga for a pending booking.
    ///
    /// Validation failures surface here synchronously; everything after
    /// this point is reported through booking status changes.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn begin(&self, booking_id: BookingId) -> Result<SagaId, SagaError> {
        let booking = self
            .booking_store
            .get(booking_id)
            .await?
            .ok_or(DomainError::BookingNotFound(booking_id))?;
        booking.validate_for_reservation()?;

        let saga_id = SagaId::new();
        let ctx = StepContext { saga_id, booking };
        let first = self.steps[0].clone();
        info!(saga_id = %saga_id, step = first.name(), "saga started");
        counter!("sagas_started").increment(1);

        self.emit_forward(&ctx, first.as_ref()).await?;
        Ok(saga_id)
    }

    /// Applies a participant reply to its saga.
    ///
    /// Replies with no outstanding row, or whose correlation ID points
    /// at a superseded row, are discarded without error; at-least-once
    /// delivery makes both cases routine.
    #[instrument(
        skip(self, reply),
        fields(saga_id = %reply.saga_id, channel = %reply.channel, success = reply.success)
    )]
    pub async fn on_reply(&self, reply: ReplyEnvelope) -> Result<(), SagaError> {
        let Some(row) = self
            .repository
            .find_by_saga(reply.channel, SAGA_TYPE, reply.saga_id, &OUTSTANDING)
            .await?
        else {
            info!("no outstanding row for reply, discarding");
            counter!("saga_replies_discarded").increment(1);
            return Ok(());
        };

        if row.id != reply.correlation_id {
            info!(
                outstanding = %row.id,
                correlation_id = %reply.correlation_id,
                "reply correlates to a superseded row, discarding"
            );
            counter!("saga_replies_discarded").increment(1);
            return Ok(());
        }

        if row.saga_status == SagaStatus::Compensating {
            self.apply_compensation_reply(row, &reply).await
        } else {
            self.apply_forward_reply(row, &reply).await
        }
    }

    async fn apply_forward_reply(
        &self,
        row: OutboxMessage,
        reply: &ReplyEnvelope,
    ) -> Result<(), SagaError> {
        let booking_id = booking_id_of(&row)?;

        if !reply.success {
            info!(
                booking_id = %booking_id,
                reason = reply.reason.as_deref().unwrap_or("unspecified"),
                "step rejected, compensating"
            );
            return self.compensate(row, booking_id).await;
        }

        let step_index = self.step_index(&row);
        let step = self.steps[step_index].clone();

        let mut updated = row;
        updated.saga_status = SagaStatus::Processing;
        if let Some(status) = step.status_on_success() {
            updated.booking_status = status;
        }
        let saga_id = updated.saga_id;
        if self.save_or_yield(updated).await?.is_none() {
            return Ok(());
        }

        if let Some(status) = step.status_on_success() {
            self.booking_store.update_status(booking_id, status).await?;
        }

        if let Some(next) = self.steps.get(step_index + 1).cloned() {
            let booking = self
                .booking_store
                .get(booking_id)
                .await?
                .ok_or(DomainError::BookingNotFound(booking_id))?;
            let ctx = StepContext { saga_id, booking };
            self.emit_forward(&ctx, next.as_ref()).await
        } else {
            self.complete(saga_id, booking_id).await
        }
    }

    /// Final step: every row succeeded, confirm the booking.
    async fn complete(&self, saga_id: SagaId, booking_id: BookingId) -> Result<(), SagaError> {
        for step in &self.steps {
            if let Some(row) = self
                .repository
                .find_by_saga(step.channel(), SAGA_TYPE, saga_id, &[SagaStatus::Processing])
                .await?
            {
                let mut done = row;
                done.saga_status = SagaStatus::Succeeded;
                done.booking_status = BookingStatus::Confirmed;
                self.save_or_yield(done).await?;
            }
        }
        self.booking_store
            .update_status(booking_id, BookingStatus::Confirmed)
            .await?;
        info!(saga_id = %saga_id, booking_id = %booking_id, "saga succeeded");
        counter!("sagas_succeeded").increment(1);
        Ok(())
    }

    /// Unwinds completed steps in reverse after `failing_row`'s step was
    /// rejected.
    ///
    /// The failing row settles to `Compensated` in place since its
    /// effect never landed. Each completed earlier step settles its
    /// original row and gets a fresh `Compensating` row carrying the
    /// undo command, so the reply correlation path stays single-rowed
    /// per channel.
    async fn compensate(
        &self,
        failing_row: OutboxMessage,
        booking_id: BookingId,
    ) -> Result<(), SagaError> {
        counter!("saga_compensations_started").increment(1);
        let saga_id = failing_row.saga_id;
        let failed_index = self.step_index(&failing_row);

        let mut settled = failing_row;
        settled.saga_status = SagaStatus::Compensated;
        if self.save_or_yield(settled).await?.is_none() {
            // Another instance is already unwinding this saga.
            return Ok(());
        }

        let booking = self
            .booking_store
            .get(booking_id)
            .await?
            .ok_or(DomainError::BookingNotFound(booking_id))?;
        let ctx = StepContext { saga_id, booking };

        for step in self.steps[..failed_index].iter().rev() {
            let Some(row) = self
                .repository
                .find_by_saga(step.channel(), SAGA_TYPE, saga_id, &[SagaStatus::Processing])
                .await?
            else {
                continue;
            };
            let mut done = row;
            done.saga_status = SagaStatus::Compensated;
            if self.save_or_yield(done).await?.is_none() {
                continue;
            }
            self.emit_compensation(&ctx, step.as_ref()).await?;
        }

        self.try_finish_cancellation(saga_id, booking_id).await
    }

    async fn apply_compensation_reply(
        &self,
        row: OutboxMessage,
        reply: &ReplyEnvelope,
    ) -> Result<(), SagaError> {
        let booking_id = booking_id_of(&row)?;
        let saga_id = row.saga_id;

        let mut settled = row;
        settled.saga_status = if reply.success {
            SagaStatus::Compensated
        } else {
            SagaStatus::Failed
        };
        let channel = settled.channel;
        if self.save_or_yield(settled).await?.is_none() {
            return Ok(());
        }

        if !reply.success {
            // Manual intervention territory: the forward effect stands
            // but its undo was rejected.
            warn!(
                saga_id = %saga_id,
                booking_id = %booking_id,
                %channel,
                reason = reply.reason.as_deref().unwrap_or("unspecified"),
                "compensation rejected"
            );
            counter!("saga_compensations_failed", "channel" => channel.as_str()).increment(1);
        }

        self.try_finish_cancellation(saga_id, booking_id).await
    }

    /// Cancels the booking once no row of the saga is still in flight.
    async fn try_finish_cancellation(
        &self,
        saga_id: SagaId,
        booking_id: BookingId,
    ) -> Result<(), SagaError> {
        for step in &self.steps {
            if self
                .repository
                .find_by_saga(step.channel(), SAGA_TYPE, saga_id, &SagaStatus::RETRYABLE)
                .await?
                .is_some()
            {
                return Ok(());
            }
        }

        if let Some(booking) = self.booking_store.get(booking_id).await?
            && !booking.status.is_terminal()
        {
            self.booking_store
                .update_status(booking_id, BookingStatus::Cancelled)
                .await?;
            info!(saga_id = %saga_id, booking_id = %booking_id, "saga compensated, booking cancelled");
            counter!("sagas_cancelled").increment(1);
        }
        Ok(())
    }

    async fn emit_forward(&self, ctx: &StepContext, step: &dyn SagaStep) -> Result<(), SagaError> {
        let message = OutboxMessage::builder()
            .saga_id(ctx.saga_id)
            .saga_type(SAGA_TYPE)
            .channel(step.channel())
            .payload_raw(step.command(ctx)?)
            .booking_status(ctx.booking.status)
            .build();
        let stored = self.repository.save(message).await?;
        self.publisher.publish(stored).await?;
        Ok(())
    }

    async fn emit_compensation(
        &self,
        ctx: &StepContext,
        step: &dyn SagaStep,
    ) -> Result<(), SagaError> {
        let message = OutboxMessage::builder()
            .saga_id(ctx.saga_id)
            .saga_type(SAGA_TYPE)
            .channel(step.channel())
            .payload_raw(step.compensation(ctx)?)
            .saga_status(SagaStatus::Compensating)
            .booking_status(ctx.booking.status)
            .build();
        let stored = self.repository.save(message).await?;
        self.publisher.publish(stored).await?;
        Ok(())
    }

    /// Saves a row, treating a version conflict as "another instance
    /// won"; the caller stops driving this reply.
    async fn save_or_yield(
        &self,
        message: OutboxMessage,
    ) -> Result<Option<OutboxMessage>, SagaError> {
        match self.repository.save(message).await {
            Ok(saved) => Ok(Some(saved)),
            Err(err) if err.is_conflict() => {
                info!(%err, "yielding to concurrent writer");
                counter!("saga_version_conflicts").increment(1);
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn step_index(&self, row: &OutboxMessage) -> usize {
        self.steps
            .iter()
            .position(|step| step.channel() == row.channel)
            .unwrap_or(0)
    }
}

/// Every command payload carries the booking ID under `data.booking_id`.
fn booking_id_of(row: &OutboxMessage) -> Result<BookingId, SagaError> {
    let value = row
        .payload
        .get("data")
        .and_then(|data| data.get("booking_id"))
        .cloned()
        .ok_or(SagaError::MalformedPayload(row.id))?;
    Ok(serde_json::from_value(value)?)
}
