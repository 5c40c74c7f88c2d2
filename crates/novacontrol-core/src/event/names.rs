//! Closed name sets carried by events
//!
//! Every event tag that used to travel as a free-form string is one of these
//! enums. Parsing from the wire is case-insensitive.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hand gesture classified by the perception collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    Pinch,
    Fist,
    OpenPalm,
    Point,
    Unknown,
    None,
}

impl Gesture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pinch => "PINCH",
            Self::Fist => "FIST",
            Self::OpenPalm => "OPEN_PALM",
            Self::Point => "POINT",
            Self::Unknown => "UNKNOWN",
            Self::None => "NONE",
        }
    }

    /// Lenient parse: anything unrecognised is `Unknown`
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "PINCH" => Self::Pinch,
            "FIST" => Self::Fist,
            "OPEN_PALM" => Self::OpenPalm,
            "POINT" => Self::Point,
            "NONE" => Self::None,
            _ => Self::Unknown,
        }
    }
}

/// Coarse horizontal gaze bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GazeDirection {
    Left,
    Center,
    Right,
    None,
}

impl GazeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "LEFT",
            Self::Center => "CENTER",
            Self::Right => "RIGHT",
            Self::None => "NONE",
        }
    }

    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "LEFT" => Self::Left,
            "CENTER" => Self::Center,
            "RIGHT" => Self::Right,
            _ => Self::None,
        }
    }
}

/// Which hand produced a gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

/// Arming state requested by a `mode` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArmMode {
    Armed,
    Safe,
}

impl ArmMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Armed => "ARMED",
            Self::Safe => "SAFE",
        }
    }

    /// Case-insensitive; every value other than `ARMED` disarms.
    pub fn parse(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("ARMED") {
            Self::Armed
        } else {
            Self::Safe
        }
    }
}

impl From<&str> for ArmMode {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

/// Out-of-band control signals carried by `system` events
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SystemSignal {
    EmergencyStop,
    ClearEmergency,
    TrackingLost,
    /// Any other system tag; observed but never acted upon
    Other(String),
}

impl SystemSignal {
    pub fn as_str(&self) -> &str {
        match self {
            Self::EmergencyStop => "EMERGENCY_STOP",
            Self::ClearEmergency => "CLEAR_EMERGENCY",
            Self::TrackingLost => "TRACKING_LOST",
            Self::Other(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "EMERGENCY_STOP" => Self::EmergencyStop,
            "CLEAR_EMERGENCY" => Self::ClearEmergency,
            "TRACKING_LOST" => Self::TrackingLost,
            _ => Self::Other(name.to_string()),
        }
    }
}

/// Which perceptual stream drives the cursor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMode {
    #[default]
    Eye,
    Hand,
}

impl ControlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eye => "EYE",
            Self::Hand => "HAND",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "EYE" => Some(Self::Eye),
            "HAND" => Some(Self::Hand),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Eye => Self::Hand,
            Self::Hand => Self::Eye,
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(Gesture, GazeDirection, Handedness, ArmMode, SystemSignal, ControlMode);
