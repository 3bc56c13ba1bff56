//! Call lifecycle vocabulary shared by the webhook handlers.
//!
//! Call statuses are stored as free text, the way the provider reports them,
//! plus two values of our own (`redirecting-to-sequential`).

use std::fmt;
use std::str::FromStr;

pub const STATUS_INITIATED: &str = "initiated";
pub const STATUS_RINGING: &str = "ringing";
pub const STATUS_IN_PROGRESS: &str = "in-progress";
pub const STATUS_REDIRECTING_TO_SEQUENTIAL: &str = "redirecting-to-sequential";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";
pub const STATUS_BUSY: &str = "busy";
pub const STATUS_NO_ANSWER: &str = "no-answer";
pub const STATUS_CANCELED: &str = "canceled";

pub const DIRECTION_INBOUND: &str = "inbound";
pub const DIRECTION_OUTBOUND: &str = "outbound";

pub const CHANNEL_CALL: &str = "call";

/// Prefix the provider uses for browser client endpoints (`client:alice`).
pub const CLIENT_PREFIX: &str = "client:";

pub fn is_terminal(status: &str) -> bool {
    matches!(
        status,
        STATUS_COMPLETED | STATUS_FAILED | STATUS_BUSY | STATUS_NO_ANSWER | STATUS_CANCELED
    )
}

/// Strips the `client:` prefix from an address, if present.
pub fn client_identity(address: &str) -> Option<&str> {
    address
        .strip_prefix(CLIENT_PREFIX)
        .map(str::trim)
        .filter(|identity| !identity.is_empty())
}

/// Aggregate result of a `<Dial>` reported back through `DialCallStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialOutcome {
    Completed,
    Answered,
    NoAnswer,
    Busy,
    Failed,
    Canceled,
}

impl DialOutcome {
    /// Outcomes after which the caller should be offered the next target.
    pub fn should_fall_back(self) -> bool {
        matches!(self, Self::NoAnswer | Self::Busy | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => STATUS_COMPLETED,
            Self::Answered => "answered",
            Self::NoAnswer => STATUS_NO_ANSWER,
            Self::Busy => STATUS_BUSY,
            Self::Failed => STATUS_FAILED,
            Self::Canceled => STATUS_CANCELED,
        }
    }
}

impl FromStr for DialOutcome {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "completed" => Ok(Self::Completed),
            "answered" => Ok(Self::Answered),
            "no-answer" => Ok(Self::NoAnswer),
            "busy" => Ok(Self::Busy),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            other => Err(format!("unknown dial status: {other}")),
        }
    }
}

impl fmt::Display for DialOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
