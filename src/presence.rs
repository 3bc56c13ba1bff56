use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Agent availability as shown in the phone HUD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhoneStatus {
    #[default]
    Available,
    Away,
    Unavailable,
    Busy,
    WrapUp,
    Offline,
}

impl PhoneStatus {
    pub const ALL: [PhoneStatus; 6] = [
        PhoneStatus::Available,
        PhoneStatus::Away,
        PhoneStatus::Unavailable,
        PhoneStatus::Busy,
        PhoneStatus::WrapUp,
        PhoneStatus::Offline,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Away => "away",
            Self::Unavailable => "unavailable",
            Self::Busy => "busy",
            Self::WrapUp => "wrap-up",
            Self::Offline => "offline",
        }
    }

    /// Whether a group ring should include this agent's client endpoint.
    pub fn is_reachable(self) -> bool {
        matches!(self, Self::Available | Self::Away)
    }

    /// Interprets a stored value; unknown or missing values count as available.
    pub fn from_stored(value: Option<&str>) -> Self {
        value
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for PhoneStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("unknown phone status: {value}"))
    }
}

impl fmt::Display for PhoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
