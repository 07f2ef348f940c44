//! Seconds and nanoseconds timestamps stored as native BSON dates.
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use mongodb::bson::Bson;
use mongodb::bson::DateTime;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

/// Point in time as seconds and nanoseconds since the UNIX epoch, in UTC.
///
/// Timestamps are stored as BSON dates, exactly as [`DateTime`] values are,
/// so documents written with either type are byte-identical.
/// BSON dates have millisecond precision and sub-millisecond nanoseconds are dropped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: i32) -> Timestamp {
        Timestamp { seconds, nanos }
    }

    pub fn now() -> Timestamp {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp {
            seconds: elapsed.as_secs() as i64,
            nanos: elapsed.subsec_nanos() as i32,
        }
    }

    pub fn to_datetime(self) -> DateTime {
        let millis = self
            .seconds
            .saturating_mul(1000)
            .saturating_add(i64::from(self.nanos) / 1_000_000);
        DateTime::from_millis(millis)
    }
}

impl From<DateTime> for Timestamp {
    fn from(value: DateTime) -> Self {
        let millis = value.timestamp_millis();
        Timestamp {
            seconds: millis.div_euclid(1000),
            nanos: (millis.rem_euclid(1000) * 1_000_000) as i32,
        }
    }
}

impl From<Timestamp> for DateTime {
    fn from(value: Timestamp) -> Self {
        value.to_datetime()
    }
}

impl From<Timestamp> for Bson {
    fn from(value: Timestamp) -> Self {
        Bson::DateTime(value.to_datetime())
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_datetime().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        DateTime::deserialize(deserializer).map(Timestamp::from)
    }
}
