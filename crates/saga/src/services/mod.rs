//! Participant service boundaries.
//!
//! Real deployments put HTTP or gRPC clients behind these traits; the
//! in-memory implementations carry failure toggles for tests.

pub mod notification;
pub mod payment;
pub mod room;

use thiserror::Error;

pub use notification::{InMemoryNotifier, Notifier};
pub use payment::{InMemoryPaymentGateway, PaymentGateway};
pub use room::{InMemoryRoomInventory, RoomInventory};

/// A participant's business-level rejection of a command.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ServiceRejection(pub String);

impl ServiceRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}
