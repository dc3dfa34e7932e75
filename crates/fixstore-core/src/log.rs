use std::fmt;

use serde::{Deserialize, Serialize};

use crate::session_key::SessionKey;

/// Which rows a log instance writes and clears.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LogScope {
    /// Rows carry this session's key.
    PerSession(SessionKey),
    /// Administrative log: key columns are all NULL, and `clear` empties the
    /// tables outright.
    Global,
}

impl LogScope {
    pub fn session_key(&self) -> Option<&SessionKey> {
        match self {
            Self::PerSession(key) => Some(key),
            Self::Global => None,
        }
    }
}

impl fmt::Display for LogScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerSession(key) => write!(f, "{key}"),
            Self::Global => write!(f, "global"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStream {
    Incoming,
    Outgoing,
    Event,
}

impl LogStream {
    pub const ALL: [LogStream; 3] = [Self::Incoming, Self::Outgoing, Self::Event];
}

impl fmt::Display for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incoming => write!(f, "incoming"),
            Self::Outgoing => write!(f, "outgoing"),
            Self::Event => write!(f, "event"),
        }
    }
}

impl std::str::FromStr for LogStream {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incoming" => Ok(Self::Incoming),
            "outgoing" => Ok(Self::Outgoing),
            "event" => Ok(Self::Event),
            other => Err(format!("unknown log stream: {other}")),
        }
    }
}

/// Result of a best-effort audit append. Callers may inspect it but are
/// free to ignore it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended { id: i64 },
    Dropped { reason: String },
}

impl AppendOutcome {
    pub fn is_appended(&self) -> bool {
        matches!(self, Self::Appended { .. })
    }
}

/// Append-only audit trail of raw traffic and session events.
///
/// Appends never fail the caller: a lost audit line must not interrupt the
/// session. Clearing does report errors.
pub trait Log {
    type Error: std::error::Error;

    fn on_incoming(&self, text: &str) -> AppendOutcome;
    fn on_outgoing(&self, text: &str) -> AppendOutcome;
    fn on_event(&self, text: &str) -> AppendOutcome;

    /// Remove every row in scope, across all three streams, atomically.
    fn clear(&self) -> Result<usize, Self::Error>;

    fn backup(&self) -> Result<(), Self::Error>;
}
