use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{BookingStatus, MessageId, SagaId};

use crate::status::{OutboxStatus, SagaStatus};

/// Version number for an outbox row, used for optimistic concurrency control.
///
/// Versions start at 1 when a row is first stored and increment by 1 on
/// every successful save. Callers must present the version they last read;
/// a mismatch means someone else already advanced the row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) for a row that has never been stored.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the first stored version (1).
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// The participating domain that owns an outbox row and its broker topics.
///
/// All rows share one structure; the channel provides runtime discrimination
/// instead of a duplicated type per domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Payment service (deposit charge / refund).
    Payment,
    /// Room inventory service (reserve / release).
    Room,
    /// Notification service (send / cancel).
    Notification,
}

impl Channel {
    /// All channels, in forward saga order.
    pub const ALL: [Channel; 3] = [Channel::Payment, Channel::Room, Channel::Notification];

    /// Returns the channel name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Payment => "Payment",
            Channel::Room => "Room",
            Channel::Notification => "Notification",
        }
    }

    /// Parses a channel from its string name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Payment" => Some(Channel::Payment),
            "Room" => Some(Channel::Room),
            "Notification" => Some(Channel::Notification),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A durable outgoing domain message.
///
/// Written in the same local transaction as the aggregate state change it
/// represents, then sent asynchronously by the publisher/relay. The payload
/// is opaque to this layer; it is never inspected here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    /// Unique identifier for this message, generated at creation, immutable.
    pub id: MessageId,

    /// Correlates all rows and replies belonging to one business transaction.
    pub saga_id: SagaId,

    /// The business-process name this row belongs to; scopes repository
    /// queries so unrelated sagas never collide.
    pub saga_type: String,

    /// The domain that owns this row's topics.
    pub channel: Channel,

    /// Serialized domain event body.
    pub payload: serde_json::Value,

    /// The orchestrator's view of this participant's progress.
    pub saga_status: SagaStatus,

    /// Delivery status of this specific row.
    pub outbox_status: OutboxStatus,

    /// Snapshot of the booking's status at write time.
    pub booking_status: BookingStatus,

    /// When the row was created.
    pub created_at: DateTime<Utc>,

    /// Last delivery attempt / ack time.
    pub processed_at: Option<DateTime<Utc>>,

    /// Optimistic-concurrency counter; every save is a compare-and-swap
    /// against this value.
    pub version: Version,
}

impl OutboxMessage {
    /// Creates a new outbox message builder.
    pub fn builder() -> OutboxMessageBuilder {
        OutboxMessageBuilder::default()
    }

    /// Returns the row's age relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }

    /// Returns true if both status machines have reached a terminal state.
    pub fn is_settled(&self) -> bool {
        self.outbox_status.is_terminal() && self.saga_status.is_terminal()
    }
}

/// Builder for constructing outbox messages.
#[derive(Debug, Default)]
pub struct OutboxMessageBuilder {
    id: Option<MessageId>,
    saga_id: Option<SagaId>,
    saga_type: Option<String>,
    channel: Option<Channel>,
    payload: Option<serde_json::Value>,
    saga_status: Option<SagaStatus>,
    booking_status: Option<BookingStatus>,
    created_at: Option<DateTime<Utc>>,
}

impl OutboxMessageBuilder {
    /// Sets the message ID. If not set, a new ID will be generated.
    pub fn id(mut self, id: MessageId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the saga ID.
    pub fn saga_id(mut self, saga_id: SagaId) -> Self {
        self.saga_id = Some(saga_id);
        self
    }

    /// Sets the business-process name.
    pub fn saga_type(mut self, saga_type: impl Into<String>) -> Self {
        self.saga_type = Some(saga_type.into());
        self
    }

    /// Sets the owning channel.
    pub fn channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Sets the initial saga status. Defaults to `Started`.
    pub fn saga_status(mut self, status: SagaStatus) -> Self {
        self.saga_status = Some(status);
        self
    }

    /// Sets the booking status snapshot. Defaults to `Pending`.
    pub fn booking_status(mut self, status: BookingStatus) -> Self {
        self.booking_status = Some(status);
        self
    }

    /// Sets the creation timestamp. If not set, the current time will be used.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Builds the outbox message.
    ///
    /// # Panics
    ///
    /// Panics if required fields (saga_id, saga_type, channel, payload)
    /// are not set.
    pub fn build(self) -> OutboxMessage {
        OutboxMessage {
            id: self.id.unwrap_or_default(),
            saga_id: self.saga_id.expect("saga_id is required"),
            saga_type: self.saga_type.expect("saga_type is required"),
            channel: self.channel.expect("channel is required"),
            payload: self.payload.expect("payload is required"),
            saga_status: self.saga_status.unwrap_or_default(),
            outbox_status: OutboxStatus::Started,
            booking_status: self.booking_status.unwrap_or_default(),
            created_at: self.created_at.unwrap_or_else(Utc::now),
            processed_at: None,
            version: Version::initial(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering() {
        let v1 = Version::new(1);
        let v2 = Version::new(2);
        assert!(v1 < v2);
        assert_eq!(v1.next(), v2);
    }

    #[test]
    fn version_initial_and_first() {
        assert_eq!(Version::initial().as_i64(), 0);
        assert_eq!(Version::first().as_i64(), 1);
        assert_eq!(Version::initial().next(), Version::first());
    }

    #[test]
    fn channel_parse_roundtrip() {
        for channel in Channel::ALL {
            assert_eq!(Channel::parse(channel.as_str()), Some(channel));
        }
        assert_eq!(Channel::parse("Shipping"), None);
    }

    #[test]
    fn outbox_message_builder() {
        let saga_id = SagaId::new();
        let payload = serde_json::json!({"amount_cents": 5000});

        let message = OutboxMessage::builder()
            .saga_id(saga_id)
            .saga_type("HotelBooking")
            .channel(Channel::Payment)
            .payload_raw(payload.clone())
            .build();

        assert_eq!(message.saga_id, saga_id);
        assert_eq!(message.saga_type, "HotelBooking");
        assert_eq!(message.channel, Channel::Payment);
        assert_eq!(message.payload, payload);
        assert_eq!(message.saga_status, SagaStatus::Started);
        assert_eq!(message.outbox_status, OutboxStatus::Started);
        assert_eq!(message.version, Version::initial());
        assert!(message.processed_at.is_none());
    }

    #[test]
    fn outbox_message_age() {
        let created = Utc::now() - chrono::Duration::seconds(90);
        let message = OutboxMessage::builder()
            .saga_id(SagaId::new())
            .saga_type("HotelBooking")
            .channel(Channel::Room)
            .payload_raw(serde_json::json!({}))
            .created_at(created)
            .build();

        assert!(message.age(Utc::now()) >= chrono::Duration::seconds(90));
    }

    #[test]
    fn outbox_message_is_settled() {
        let mut message = OutboxMessage::builder()
            .saga_id(SagaId::new())
            .saga_type("HotelBooking")
            .channel(Channel::Notification)
            .payload_raw(serde_json::json!({}))
            .build();

        assert!(!message.is_settled());
        message.outbox_status = OutboxStatus::Completed;
        assert!(!message.is_settled());
        message.saga_status = SagaStatus::Succeeded;
        assert!(message.is_settled());
    }

    #[test]
    fn serialization_roundtrip() {
        let message = OutboxMessage::builder()
            .saga_id(SagaId::new())
            .saga_type("HotelBooking")
            .channel(Channel::Payment)
            .payload_raw(serde_json::json!({"k": "v"}))
            .build();

        let json = serde_json::to_string(&message).unwrap();
        let deserialized: OutboxMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.id, message.id);
        assert_eq!(deserialized.channel, message.channel);
        assert_eq!(deserialized.payload, message.payload);
    }
}
