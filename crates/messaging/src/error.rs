use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("broker send to topic '{topic}' failed: {reason}")]
    SendFailed { topic: String, reason: String },

    #[error("broker send to topic '{topic}' timed out")]
    SendTimeout { topic: String },

    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error(transparent)]
    Outbox(#[from] outbox::OutboxError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
