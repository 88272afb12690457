//! Append-only record of completed turns.
//!
//! The orchestrator hands each finished [`Turn`] to a [`TurnLogger`] and
//! forgets it.  [`JsonlTurnLog`] writes one JSON object per line to a file
//! named after the session's UTC start time.

pub mod jsonl;

pub use jsonl::JsonlTurnLog;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One completed user-utterance-to-reply cycle.  Never mutated after
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(rename = "ts", with = "millis_utc")]
    pub timestamp: DateTime<Utc>,
    /// 1-based; only successful turns consume an id.
    pub turn_id: u64,
    pub user_text: String,
    /// Empty in transcribe-only sessions.
    pub assistant_text: String,
}

impl Turn {
    /// A turn stamped with the current time.
    pub fn now(turn_id: u64, user_text: impl Into<String>, assistant_text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            turn_id,
            user_text: user_text.into(),
            assistant_text: assistant_text.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("turn log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialise turn: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Receives completed turns.  A record is durable once `record` returns
/// `Ok`.
pub trait TurnLogger: Send + Sync {
    fn record(&self, turn: &Turn) -> Result<(), HistoryError>;
}

/// `2024-05-01T12:30:45.123Z`: RFC 3339, millisecond precision, UTC.
mod millis_utc {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
