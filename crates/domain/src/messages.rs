//! Wire shapes exchanged with the participant services.
//!
//! Commands flow out through the outbox; replies come back on the
//! response topics. Compensations are keyed by booking ID alone so the
//! orchestrator never has to persist participant references.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use common::{BookingId, MessageId, SagaId};
use outbox::Channel;

use crate::booking::RoomId;

/// Commands for the payment service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum PaymentCommand {
    /// Charge the deposit for a booking.
    Charge {
        booking_id: BookingId,
        amount_cents: i64,
    },
    /// Refund whatever was charged for a booking.
    Refund { booking_id: BookingId },
}

/// Commands for the room inventory service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum RoomCommand {
    Reserve {
        booking_id: BookingId,
        room_ids: Vec<RoomId>,
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    Release { booking_id: BookingId },
}

/// Commands for the guest notification service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum NotificationCommand {
    Send {
        booking_id: BookingId,
        guest_email: String,
    },
    Cancel { booking_id: BookingId },
}

/// A participant's reply to a command, published on the channel's
/// response topic.
///
/// `correlation_id` is the outbox message ID of the command being
/// answered; the orchestrator uses it to find the row to settle, and
/// the listener uses `id` for deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub id: MessageId,
    pub saga_id: SagaId,
    pub channel: Channel,
    pub correlation_id: MessageId,
    pub success: bool,
    /// Participant-side reference for a successful operation, e.g. a
    /// payment ID.
    pub reference: Option<String>,
    /// Human-readable reason for a rejection.
    pub reason: Option<String>,
}

impl ReplyEnvelope {
    /// Builds a success reply for a command.
    pub fn completed(
        saga_id: SagaId,
        channel: Channel,
        correlation_id: MessageId,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            saga_id,
            channel,
            correlation_id,
            success: true,
            reference: Some(reference.into()),
            reason: None,
        }
    }

    /// Builds a failure reply for a command.
    pub fn rejected(
        saga_id: SagaId,
        channel: Channel,
        correlation_id: MessageId,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            saga_id,
            channel,
            correlation_id,
            success: false,
            reference: None,
            reason: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_command_serializes_tagged() {
        let command = PaymentCommand::Charge {
            booking_id: BookingId::new(),
            amount_cents: 15000,
        };
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["type"], "Charge");
        assert_eq!(json["data"]["amount_cents"], 15000);

        let back: PaymentCommand = serde_json::from_value(json).unwrap();
        assert_eq!(back, command);
    }

    #[test]
    fn test_room_command_roundtrip() {
        let command = RoomCommand::Reserve {
            booking_id: BookingId::new(),
            room_ids: vec![RoomId::new("R-101"), RoomId::new("R-102")],
            check_in: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2026, 10, 3).unwrap(),
        };
        let json = serde_json::to_string(&command).unwrap();
        let back: RoomCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, command);
    }

    #[test]
    fn test_completed_reply_carries_reference() {
        let reply = ReplyEnvelope::completed(
            SagaId::new(),
            Channel::Payment,
            MessageId::new(),
            "PAY-0001",
        );
        assert!(reply.success);
        assert_eq!(reply.reference.as_deref(), Some("PAY-0001"));
        assert!(reply.reason.is_none());
    }

    #[test]
    fn test_rejected_reply_carries_reason() {
        let reply = ReplyEnvelope::rejected(
            SagaId::new(),
            Channel::Room,
            MessageId::new(),
            "no rooms available",
        );
        assert!(!reply.success);
        assert!(reply.reference.is_none());
        assert_eq!(reply.reason.as_deref(), Some("no rooms available"));
    }
}
