//! # Shared Types
//!
//! Small value types that appear on both sides of the client/facade boundary.

use std::time::Duration;

/// TTL state returned by the store, mirroring Redis semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Key is missing or already expired.
    Missing,
    /// Key exists without expiration.
    NoExpiry,
    /// Key expires after the provided duration.
    ExpiresIn(Duration),
}

impl Ttl {
    /// Interprets a `TTL` integer reply (-2 missing, -1 persistent).
    pub fn from_reply(value: i64) -> Option<Self> {
        match value {
            -2 => Some(Ttl::Missing),
            -1 => Some(Ttl::NoExpiry),
            secs if secs >= 0 => Some(Ttl::ExpiresIn(Duration::from_secs(secs as u64))),
            _ => None,
        }
    }

    /// Returns the remaining lifetime, if any.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Ttl::ExpiresIn(remaining) => Some(*remaining),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_reply_mapping() {
        assert_eq!(Ttl::from_reply(-2), Some(Ttl::Missing));
        assert_eq!(Ttl::from_reply(-1), Some(Ttl::NoExpiry));
        assert_eq!(
            Ttl::from_reply(7),
            Some(Ttl::ExpiresIn(Duration::from_secs(7)))
        );
        assert_eq!(Ttl::from_reply(-3), None);
        assert_eq!(Ttl::NoExpiry.remaining(), None);
    }
}
