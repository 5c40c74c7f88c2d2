//! Events
//!
//! The immutable value that flows through the bus. Each event kind carries
//! its own structured payload instead of an open metadata map.

mod intent;
mod names;
mod wire;

pub use intent::{CursorSource, Intent, IntentClass};
pub use names::{ArmMode, ControlMode, GazeDirection, Gesture, Handedness, SystemSignal};
pub use wire::RawEvent;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Event type tag, used as the subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Gesture,
    Gaze,
    Point,
    Mode,
    System,
    Intent,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        Self::Gesture,
        Self::Gaze,
        Self::Point,
        Self::Mode,
        Self::System,
        Self::Intent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gesture => "gesture",
            Self::Gaze => "gaze",
            Self::Point => "point",
            Self::Mode => "mode",
            Self::System => "system",
            Self::Intent => "intent",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific event content
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Gesture {
        gesture: Gesture,
        handedness: Option<Handedness>,
    },
    Gaze {
        direction: GazeDirection,
        ratio: Option<f64>,
        y_ratio: Option<f64>,
    },
    /// Raw fingertip position, normalised to [0, 1]
    Point { x_norm: f64, y_norm: f64 },
    Mode(ArmMode),
    System(SystemSignal),
    Intent(Intent),
}

/// A timestamped, immutable event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Seconds; wall clock unless the producer supplies its own base
    pub timestamp: f64,
    pub confidence: Option<f64>,
    pub payload: Payload,
}

/// Current wall-clock time in seconds
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

impl Event {
    pub fn new(timestamp: f64, confidence: Option<f64>, payload: Payload) -> Self {
        Self {
            timestamp,
            confidence,
            payload,
        }
    }

    pub fn gesture(timestamp: f64, gesture: Gesture, confidence: Option<f64>) -> Self {
        Self::new(
            timestamp,
            confidence,
            Payload::Gesture {
                gesture,
                handedness: None,
            },
        )
    }

    pub fn point(timestamp: f64, x_norm: f64, y_norm: f64) -> Self {
        Self::new(timestamp, None, Payload::Point { x_norm, y_norm })
    }

    pub fn gaze(timestamp: f64, ratio: f64, y_ratio: Option<f64>, confidence: Option<f64>) -> Self {
        let direction = if ratio < 0.4 {
            GazeDirection::Left
        } else if ratio > 0.6 {
            GazeDirection::Right
        } else {
            GazeDirection::Center
        };
        Self::new(
            timestamp,
            confidence,
            Payload::Gaze {
                direction,
                ratio: Some(ratio),
                y_ratio,
            },
        )
    }

    pub fn mode(timestamp: f64, mode: ArmMode) -> Self {
        Self::new(timestamp, None, Payload::Mode(mode))
    }

    pub fn system(timestamp: f64, signal: SystemSignal) -> Self {
        Self::new(timestamp, None, Payload::System(signal))
    }

    pub fn intent(timestamp: f64, intent: Intent, confidence: Option<f64>) -> Self {
        Self::new(timestamp, confidence, Payload::Intent(intent))
    }

    pub fn kind(&self) -> EventKind {
        match self.payload {
            Payload::Gesture { .. } => EventKind::Gesture,
            Payload::Gaze { .. } => EventKind::Gaze,
            Payload::Point { .. } => EventKind::Point,
            Payload::Mode(_) => EventKind::Mode,
            Payload::System(_) => EventKind::System,
            Payload::Intent(_) => EventKind::Intent,
        }
    }

    /// Upper-case tag whose meaning depends on the kind
    pub fn name(&self) -> &str {
        match &self.payload {
            Payload::Gesture { gesture, .. } => gesture.as_str(),
            Payload::Gaze { direction, .. } => direction.as_str(),
            Payload::Point { .. } => "CURSOR",
            Payload::Mode(mode) => mode.as_str(),
            Payload::System(signal) => signal.as_str(),
            Payload::Intent(intent) => intent.name(),
        }
    }

    pub fn as_intent(&self) -> Option<&Intent> {
        match &self.payload {
            Payload::Intent(intent) => Some(intent),
            _ => None,
        }
    }
}
