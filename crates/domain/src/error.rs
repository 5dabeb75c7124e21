use chrono::NaiveDate;
use thiserror::Error;

use common::{BookingId, BookingStatus};
use crate::booking::Money;

/// Validation failures on the booking aggregate itself.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("booking is not pending (status is {actual})")]
    NotPending { actual: BookingStatus },

    #[error("booking has no rooms")]
    NoRooms,

    #[error("check-out {check_out} must be after check-in {check_in}")]
    InvalidStay {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    #[error("deposit must be positive, got {0}")]
    InvalidDeposit(Money),

    #[error("invalid booking status transition from {from} to {to}")]
    InvalidStateTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
}

/// Errors crossing the domain boundary.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("booking not found: {0}")]
    BookingNotFound(BookingId),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
