//! The step abstraction the orchestrator walks.
//!
//! A step is declarative: it names its channel, builds its forward
//! command and its compensation, and says which booking status a
//! success implies. The orchestrator owns sequencing and persistence.

use common::BookingStatus;
use domain::{Booking, NotificationCommand, PaymentCommand, RoomCommand};
use outbox::{Channel, SagaId};

use crate::error::SagaError;

/// Everything a step needs to build its commands.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub saga_id: SagaId,
    pub booking: Booking,
}

pub trait SagaStep: Send + Sync {
    fn name(&self) -> &'static str;

    /// Channel this step's commands travel on.
    fn channel(&self) -> Channel;

    /// The forward command for this step.
    fn command(&self, ctx: &StepContext) -> Result<serde_json::Value, SagaError>;

    /// The command that undoes this step's effect.
    fn compensation(&self, ctx: &StepContext) -> Result<serde_json::Value, SagaError>;

    /// Booking status reached when this step's reply succeeds, if the
    /// step moves the booking at all.
    fn status_on_success(&self) -> Option<BookingStatus>;
}

/// Charges the booking deposit.
pub struct InitiateDeposit;

impl SagaStep for InitiateDeposit {
    fn name(&self) -> &'static str {
        crate::booking_flow::STEP_INITIATE_DEPOSIT
    }

    fn channel(&self) -> Channel {
        Channel::Payment
    }

    fn command(&self, ctx: &StepContext) -> Result<serde_json::Value, SagaError> {
        Ok(serde_json::to_value(PaymentCommand::Charge {
            booking_id: ctx.booking.id,
            amount_cents: ctx.booking.deposit.cents(),
        })?)
    }

    fn compensation(&self, ctx: &StepContext) -> Result<serde_json::Value, SagaError> {
        Ok(serde_json::to_value(PaymentCommand::Refund {
            booking_id: ctx.booking.id,
        })?)
    }

    fn status_on_success(&self) -> Option<BookingStatus> {
        Some(BookingStatus::DepositPaid)
    }
}

/// Reserves the booked rooms.
pub struct ReserveRoom;

impl SagaStep for ReserveRoom {
    fn name(&self) -> &'static str {
        crate::booking_flow::STEP_RESERVE_ROOM
    }

    fn channel(&self) -> Channel {
        Channel::Room
    }

    fn command(&self, ctx: &StepContext) -> Result<serde_json::Value, SagaError> {
        Ok(serde_json::to_value(RoomCommand::Reserve {
            booking_id: ctx.booking.id,
            room_ids: ctx.booking.room_ids.clone(),
            check_in: ctx.booking.check_in,
            check_out: ctx.booking.check_out,
        })?)
    }

    fn compensation(&self, ctx: &StepContext) -> Result<serde_json::Value, SagaError> {
        Ok(serde_json::to_value(RoomCommand::Release {
            booking_id: ctx.booking.id,
        })?)
    }

    fn status_on_success(&self) -> Option<BookingStatus> {
        Some(BookingStatus::Reserved)
    }
}

/// Sends the guest confirmation.
pub struct SendNotification;

impl SagaStep for SendNotification {
    fn name(&self) -> &'static str {
        crate::booking_flow::STEP_SEND_NOTIFICATION
    }

    fn channel(&self) -> Channel {
        Channel::Notification
    }

    fn command(&self, ctx: &StepContext) -> Result<serde_json::Value, SagaError> {
        Ok(serde_json::to_value(NotificationCommand::Send {
            booking_id: ctx.booking.id,
            guest_email: ctx.booking.guest_email.clone(),
        })?)
    }

    fn compensation(&self, ctx: &StepContext) -> Result<serde_json::Value, SagaError> {
        Ok(serde_json::to_value(NotificationCommand::Cancel {
            booking_id: ctx.booking.id,
        })?)
    }

    // Confirmation happens when the whole saga completes, not per step.
    fn status_on_success(&self) -> Option<BookingStatus> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use domain::{Money, RoomId};

    fn context() -> StepContext {
        StepContext {
            saga_id: SagaId::new(),
            booking: Booking::new(
                "guest@example.com",
                vec![RoomId::new("R-204")],
                NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 9, 4).unwrap(),
                Money::from_cents(15000),
            ),
        }
    }

    #[test]
    fn test_deposit_command_carries_amount() {
        let ctx = context();
        let command = InitiateDeposit.command(&ctx).unwrap();
        assert_eq!(command["type"], "Charge");
        assert_eq!(command["data"]["amount_cents"], 15000);
    }

    #[test]
    fn test_compensations_are_keyed_by_booking_only() {
        let ctx = context();
        let booking_id = serde_json::to_value(ctx.booking.id).unwrap();

        for step in crate::booking_flow::booking_steps() {
            let compensation = step.compensation(&ctx).unwrap();
            assert_eq!(compensation["data"]["booking_id"], booking_id);
        }
    }

    #[test]
    fn test_steps_cover_all_channels_in_order() {
        let steps = crate::booking_flow::booking_steps();
        let channels: Vec<Channel> = steps.iter().map(|step| step.channel()).collect();
        assert_eq!(channels, Channel::ALL.to_vec());
    }
}
