//! Booking domain layer.
//!
//! Holds the booking aggregate snapshot the saga coordinates, the
//! `BookingStore` collaborator boundary, and the wire shapes of the
//! commands and replies exchanged with the participant services. The
//! pricing/availability rules themselves live behind the collaborators;
//! this crate only carries their request/response shapes.

pub mod booking;
pub mod error;
pub mod messages;
pub mod store;

pub use booking::{Booking, Money, RoomId};
pub use common::{BookingId, BookingStatus};
pub use error::{BookingError, DomainError};
pub use messages::{
    NotificationCommand, PaymentCommand, ReplyEnvelope, RoomCommand,
};
pub use store::{BookingStore, InMemoryBookingStore};
