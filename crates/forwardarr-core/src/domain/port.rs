//! Validated forwarded port newtype
//!
//! A [`ForwardedPort`] can only be built from a value in `1..=65535`, so
//! code holding one never has to re-check the range.

use std::fmt::{self, Display, Formatter};
use std::num::NonZeroU16;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// A TCP/UDP port assigned by the VPN provider for inbound connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u16")]
pub struct ForwardedPort(NonZeroU16);

impl ForwardedPort {
    /// Smallest valid port
    pub const MIN: i64 = 1;
    /// Largest valid port
    pub const MAX: i64 = 65535;

    /// Builds a port from any integer, rejecting values outside `1..=65535`
    pub fn new(value: i64) -> Result<Self, DomainError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(DomainError::PortOutOfRange(value));
        }
        u16::try_from(value)
            .ok()
            .and_then(NonZeroU16::new)
            .map(Self)
            .ok_or(DomainError::PortOutOfRange(value))
    }

    /// Returns the port number
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0.get()
    }
}

impl Display for ForwardedPort {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ForwardedPort {
    type Err = DomainError;

    /// Parses surrounding-whitespace-tolerant base-10 text
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value: i64 = trimmed
            .parse()
            .map_err(|_| DomainError::InvalidPort(trimmed.to_string()))?;
        Self::new(value)
    }
}

impl TryFrom<i64> for ForwardedPort {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ForwardedPort> for u16 {
    fn from(port: ForwardedPort) -> Self {
        port.get()
    }
}

impl PartialEq<u16> for ForwardedPort {
    fn eq(&self, other: &u16) -> bool {
        self.get() == *other
    }
}
