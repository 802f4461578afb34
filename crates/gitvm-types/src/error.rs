use thiserror::Error;

/// Errors produced while decoding records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("invalid payload for {event_type}: {reason}")]
    InvalidPayload { event_type: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}
