//! Transactional outbox for the booking saga.
//!
//! An outbox row is written in the same local transaction as the state
//! change it represents and relayed asynchronously to the broker, which
//! avoids the dual-write problem. Every mutation is a compare-and-swap
//! against the row's version so concurrent relay instances and publisher
//! callbacks cannot double-send or overwrite each other.

pub mod error;
pub mod memory;
pub mod message;
pub mod postgres;
pub mod repository;
pub mod status;

pub use common::{BookingStatus, MessageId, SagaId};
pub use error::{OutboxError, Result};
pub use memory::InMemoryOutboxRepository;
pub use message::{Channel, OutboxMessage, OutboxMessageBuilder, Version};
pub use postgres::PostgresOutboxRepository;
pub use repository::OutboxRepository;
pub use status::{OutboxStatus, SagaStatus};
