//! Messaging layer: broker abstraction, outbox publisher, relay, and
//! the dedup store that keeps at-least-once delivery safe.
//!
//! The broker moves bytes; delivery guarantees come from the outbox
//! rows plus the dedup store, not from the broker itself.

pub mod broker;
pub mod dedup;
pub mod error;
pub mod publisher;
pub mod relay;
pub mod topics;

pub use broker::{BrokerClient, BrokerRecord, InMemoryBroker};
pub use dedup::{DedupStore, InMemoryDedupStore};
pub use error::MessagingError;
pub use publisher::OutboxPublisher;
pub use relay::{OutboxRelay, RelayConfig, RelayTickSummary};
pub use topics::{request_topic, response_topic};
