//! Parse failures for the shared value types.

use thiserror::Error;

/// A request or stored value that does not parse into a gateway type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Method token outside the set the gateway routes.
    #[error("unsupported HTTP method '{0}'")]
    UnsupportedMethod(String),

    #[error("invalid {kind}: {reason}")]
    InvalidId { kind: &'static str, reason: String },
}
