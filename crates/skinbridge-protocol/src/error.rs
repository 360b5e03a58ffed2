use thiserror::Error;

/// Errors raised while decoding or encoding bridge messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message has no string `type` field")]
    MissingKind,

    #[error("invalid `{kind}` message: {reason}")]
    InvalidPayload { kind: String, reason: String },
}
