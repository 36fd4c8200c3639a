use serde::{Deserialize, Serialize};
use std::fmt;

/// Projector power state
///
/// Only ever obtained live from the projector; never cached between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
    Unknown,
}

impl PowerState {
    /// Interpret a projector `PWR?` response
    ///
    /// `PWR=01` (lamp on) and `PWR=02` (warming up) count as on, anything else as off.
    pub fn from_response(response: &str) -> Self {
        if response.contains("PWR=01") || response.contains("PWR=02") {
            Self::On
        } else {
            Self::Off
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Believed position of the projection screen
///
/// The screen has no feedback channel; this is what the orchestrator last commanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenPosition {
    #[default]
    Raised,
    Lowered,
}

impl fmt::Display for ScreenPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raised => f.write_str("raised"),
            Self::Lowered => f.write_str("lowered"),
        }
    }
}

/// Amplifier power status as named by its control API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmpPower {
    Active,
    Off,
}

impl AmpPower {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Off => "off",
        }
    }
}

/// Snapshot reported by the status query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Projector reported on (or warming up) at query time
    pub projector_on: bool,

    /// A screen transition is in flight
    pub screen_moving: bool,

    /// Screen is believed lowered
    pub screen_lowered: bool,
}
