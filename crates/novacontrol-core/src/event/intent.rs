//! Intents
//!
//! Higher-level actions derived from perception. The safety guard gates
//! them by [`IntentClass`], never by payload.

use super::names::ControlMode;

/// Where a cursor move came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorSource {
    Gaze,
    Hand,
}

impl CursorSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gaze => "gaze",
            Self::Hand => "hand",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gaze" => Some(Self::Gaze),
            "hand" => Some(Self::Hand),
            _ => None,
        }
    }
}

/// An action proposed by the intent engine
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    CursorMove {
        x_norm: f64,
        y_norm: f64,
        source: Option<CursorSource>,
    },
    /// `precise` is set for clicks fired by a held fist
    Click { precise: bool },
    DoubleClick,
    RightClick,
    DragStart,
    DragStop,
    Scroll { delta: f64 },
    /// Control mode toggled; carries the mode now in effect
    Cancel { mode: ControlMode },
    /// Any intent name outside the known set.
    ///
    /// These are approved by default once they clear the emergency and
    /// confidence gates, and they never reach the actuator.
    Other(String),
}

/// Gating class of an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentClass {
    /// Requires arming, subject to the click cooldown
    Click,
    /// Requires arming, subject to the scroll cooldown
    Scroll,
    /// Requires arming, updates drag bookkeeping
    DragStart,
    DragStop,
    /// Requires arming only
    Pointer,
    /// Cancel: not armed-gated, releases drag bookkeeping
    Cancel,
    /// Default-approved after the emergency and confidence gates
    Unclassified,
}

impl IntentClass {
    /// Action-class intents cause actuation and require arming
    pub fn requires_arming(&self) -> bool {
        !matches!(self, Self::Cancel | Self::Unclassified)
    }
}

impl Intent {
    pub fn name(&self) -> &str {
        match self {
            Self::CursorMove { .. } => "CURSOR_MOVE",
            Self::Click { .. } => "CLICK",
            Self::DoubleClick => "DOUBLE_CLICK",
            Self::RightClick => "RIGHT_CLICK",
            Self::DragStart => "DRAG_START",
            Self::DragStop => "DRAG_STOP",
            Self::Scroll { .. } => "SCROLL",
            Self::Cancel { .. } => "CANCEL",
            Self::Other(name) => name,
        }
    }

    pub fn class(&self) -> IntentClass {
        match self {
            Self::CursorMove { .. } => IntentClass::Pointer,
            Self::Click { .. } | Self::DoubleClick | Self::RightClick => IntentClass::Click,
            Self::Scroll { .. } => IntentClass::Scroll,
            Self::DragStart => IntentClass::DragStart,
            Self::DragStop => IntentClass::DragStop,
            Self::Cancel { .. } => IntentClass::Cancel,
            Self::Other(_) => IntentClass::Unclassified,
        }
    }
}
