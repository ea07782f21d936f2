//! `#[serde(with = "...")]` helpers for storing `chrono::DateTime<Utc>` fields
//! as Firestore timestamps.
//!
//! Calendar date-times are written with whole-second precision; use
//! [`Timestamp`] directly when the nanoseconds matter.
//!
//! ```
//! use chrono::{DateTime, Utc};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Event {
//!     #[serde(with = "firestore_admin_core::firestore::value::datetime")]
//!     at: DateTime<Utc>,
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::firestore::model::Timestamp;

pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    Timestamp::from_datetime_seconds(value).serialize(serializer)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let timestamp = Timestamp::deserialize(deserializer)?;
    timestamp
        .to_datetime()
        .ok_or_else(|| D::Error::custom(format!("timestamp {} is out of range", timestamp.seconds)))
}

/// Same as the parent module, for `Option<DateTime<Utc>>` fields.
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value
            .as_ref()
            .map(Timestamp::from_datetime_seconds)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<Timestamp>::deserialize(deserializer)?
            .map(|timestamp| {
                timestamp.to_datetime().ok_or_else(|| {
                    D::Error::custom(format!("timestamp {} is out of range", timestamp.seconds))
                })
            })
            .transpose()
    }
}
