use thiserror::Error;

/// Failure taxonomy for bridge operations. Address and descriptor problems
/// abort an operation before any field is touched; `Encode`/`Decode` are
/// field-scoped and reported in-band by the snapshot engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("ambiguous reference: {0}")]
    Ambiguity(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

impl BridgeError {
    pub fn validation(message: impl Into<String>) -> Self {
        BridgeError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        BridgeError::NotFound(message.into())
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        BridgeError::TypeMismatch(message.into())
    }

    pub fn ambiguity(message: impl Into<String>) -> Self {
        BridgeError::Ambiguity(message.into())
    }

    pub fn encode(message: impl Into<String>) -> Self {
        BridgeError::Encode(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        BridgeError::Decode(message.into())
    }
}
