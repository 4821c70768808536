use std::fmt;
use std::str::FromStr;
use std::thread::sleep;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Custom epoch (2024-01-01T00:00:00Z) in milliseconds.
const EPOCH_MILLIS: u64 = 1_704_067_200_000;
const WORKER_ID_BITS: u8 = 10;
const SEQUENCE_BITS: u8 = 12;
const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

pub const MAX_WORKER_ID: u16 = (1 << WORKER_ID_BITS) - 1;

/// Snowflake-style event identifier: milliseconds since the custom epoch,
/// worker id, and a per-millisecond sequence packed into 64 bits. Ordered by
/// mint time.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventId").field(&self.0).finish()
    }
}

impl FromStr for EventId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(EventId)
    }
}

// Serialized as a string: the raw u64 exceeds what JSON consumers can
// represent losslessly.
impl Serialize for EventId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value
            .parse::<EventId>()
            .map_err(|err| serde::de::Error::custom(err.to_string()))
    }
}

#[derive(Debug)]
pub struct EventIdGenerator {
    worker_id: u16,
    last_millis: u64,
    sequence: u16,
}

impl EventIdGenerator {
    pub fn new(worker_id: u16) -> Self {
        Self {
            worker_id,
            last_millis: 0,
            sequence: 0,
        }
    }

    pub fn next_id(&mut self) -> EventId {
        let mut now = current_millis();
        // Clock went backwards: hold until it catches up.
        while now < self.last_millis {
            sleep(Duration::from_millis(self.last_millis - now));
            now = current_millis();
        }

        if now == self.last_millis {
            self.sequence = (self.sequence + 1) & MAX_SEQUENCE;
            if self.sequence == 0 {
                now = spin_until_after(self.last_millis);
            }
        } else {
            self.sequence = 0;
        }
        self.last_millis = now;

        let elapsed = now - EPOCH_MILLIS;
        EventId(
            (elapsed << (WORKER_ID_BITS + SEQUENCE_BITS))
                | (u64::from(self.worker_id) << SEQUENCE_BITS)
                | u64::from(self.sequence),
        )
    }
}

fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before unix epoch")
        .as_millis() as u64
}

fn spin_until_after(last_millis: u64) -> u64 {
    loop {
        let now = current_millis();
        if now > last_millis {
            return now;
        }
        sleep(Duration::from_micros(100));
    }
}
