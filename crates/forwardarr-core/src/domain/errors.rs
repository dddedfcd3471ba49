//! Domain error types
//!
//! Errors raised when a raw value cannot become a domain value.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The text is not a base-10 integer
    #[error("invalid port value: {0}")]
    InvalidPort(String),

    /// The integer is outside `1..=65535`
    #[error("port out of valid range: {0}")]
    PortOutOfRange(i64),
}
