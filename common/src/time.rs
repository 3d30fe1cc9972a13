//! Time utilities and constants for RateScout.

use chrono::{DateTime, Utc};

/// Timing constants.
pub mod constants {
    use std::time::Duration;

    /// Default per-provider deadline (3 seconds).
    pub fn default_provider_timeout() -> Duration {
        Duration::from_secs(3)
    }

    /// Longest per-provider deadline accepted from configuration (60 seconds).
    pub fn max_provider_timeout() -> Duration {
        Duration::from_secs(60)
    }
}

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Serde helpers that encode a [`std::time::Duration`] as whole milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
