//! Shared types used across the booking backend.

pub mod booking_status;
pub mod types;

pub use booking_status::BookingStatus;
pub use types::{BookingId, MessageId, SagaId};
