//! Domain entities
//!
//! - [`ForwardedPort`] - a listening port in `1..=65535`
//! - [`DomainError`] - validation failures for domain values

pub mod errors;
pub mod port;

pub use errors::DomainError;
pub use port::ForwardedPort;
