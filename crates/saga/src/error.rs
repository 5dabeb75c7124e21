use thiserror::Error;

use common::MessageId;

#[derive(Debug, Error)]
pub enum SagaError {
    #[error(transparent)]
    Outbox(#[from] outbox::OutboxError),

    #[error(transparent)]
    Domain(#[from] domain::DomainError),

    #[error(transparent)]
    Messaging(#[from] messaging::MessagingError),

    #[error("outbox row {0} carries a malformed command payload")]
    MalformedPayload(MessageId),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<domain::BookingError> for SagaError {
    fn from(error: domain::BookingError) -> Self {
        SagaError::Domain(error.into())
    }
}
