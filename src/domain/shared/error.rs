//! Domain errors

use thiserror::Error;

/// Domain result type
pub type Result<T> = std::result::Result<T, DomainError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Handle not registered: {0}")]
    NotRegistered(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("No free local id below {0}")]
    NoFreeId(usize),

    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

impl DomainError {
    /// Short label used for log fields and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::PoolExhausted(_) => "pool_exhausted",
            DomainError::NotFound(_) => "not_found",
            DomainError::NotRegistered(_) => "not_registered",
            DomainError::Conflict(_) => "conflict",
            DomainError::MalformedInput(_) => "malformed_input",
            DomainError::NoFreeId(_) => "no_free_id",
            DomainError::TransportUnavailable(_) => "transport_unavailable",
            DomainError::ProtocolError(_) => "protocol_error",
        }
    }
}
