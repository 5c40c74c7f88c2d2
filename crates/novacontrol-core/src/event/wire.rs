//! Wire form of events
//!
//! JSON records shaped `{ts, type, name, confidence, meta}`. Producers that
//! live outside the process (replay files, external trackers) speak this
//! form; it is converted to a typed [`Event`] at the boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::intent::{CursorSource, Intent};
use super::names::{ArmMode, ControlMode, GazeDirection, Gesture, Handedness, SystemSignal};
use super::{now_secs, Event, EventKind, Payload};
use crate::error::WireError;

/// Untyped event record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub ts: Option<f64>,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl RawEvent {
    fn meta_f64(&self, key: &str) -> Option<f64> {
        self.meta.get(key).and_then(Value::as_f64)
    }

    fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(Value::as_str)
    }

    fn require_f64(&self, key: &'static str) -> Result<f64, WireError> {
        self.meta_f64(key).ok_or(WireError::MissingMeta {
            kind: self.kind.clone(),
            key,
        })
    }
}

impl TryFrom<RawEvent> for Event {
    type Error = WireError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let kind = EventKind::parse(&raw.kind)
            .ok_or_else(|| WireError::UnknownType(raw.kind.clone()))?;
        if let Some(confidence) = raw.confidence {
            if !confidence.is_finite() {
                return Err(WireError::InvalidConfidence(confidence));
            }
        }

        let payload = match kind {
            EventKind::Gesture => Payload::Gesture {
                gesture: Gesture::parse(&raw.name),
                handedness: raw.meta_str("handedness").and_then(Handedness::parse),
            },
            EventKind::Gaze => Payload::Gaze {
                direction: GazeDirection::parse(&raw.name),
                ratio: raw.meta_f64("ratio"),
                y_ratio: raw.meta_f64("y_ratio"),
            },
            EventKind::Point => Payload::Point {
                x_norm: raw.require_f64("x_norm")?,
                y_norm: raw.require_f64("y_norm")?,
            },
            EventKind::Mode => Payload::Mode(ArmMode::parse(&raw.name)),
            EventKind::System => Payload::System(SystemSignal::parse(&raw.name)),
            EventKind::Intent => Payload::Intent(parse_intent(&raw)?),
        };

        Ok(Event {
            timestamp: raw.ts.unwrap_or_else(now_secs),
            confidence: raw.confidence,
            payload,
        })
    }
}

fn parse_intent(raw: &RawEvent) -> Result<Intent, WireError> {
    let intent = match raw.name.trim().to_ascii_uppercase().as_str() {
        "CURSOR_MOVE" => Intent::CursorMove {
            x_norm: raw.require_f64("x_norm")?,
            y_norm: raw.require_f64("y_norm")?,
            source: raw.meta_str("source").and_then(CursorSource::parse),
        },
        "CLICK" => Intent::Click {
            precise: raw
                .meta_str("mode")
                .is_some_and(|mode| mode.eq_ignore_ascii_case("PRECISE")),
        },
        "DOUBLE_CLICK" => Intent::DoubleClick,
        "RIGHT_CLICK" => Intent::RightClick,
        "DRAG_START" => Intent::DragStart,
        "DRAG_STOP" => Intent::DragStop,
        "SCROLL" => Intent::Scroll {
            delta: raw.meta_f64("dy").unwrap_or(0.0),
        },
        "CANCEL" => Intent::Cancel {
            mode: raw
                .meta_str("mode")
                .and_then(ControlMode::parse)
                .unwrap_or_default(),
        },
        _ => Intent::Other(raw.name.clone()),
    };
    Ok(intent)
}

impl From<&Event> for RawEvent {
    fn from(event: &Event) -> Self {
        let mut meta = Map::new();
        match &event.payload {
            Payload::Gesture { handedness, .. } => {
                if let Some(hand) = handedness {
                    meta.insert("handedness".into(), hand.as_str().into());
                }
            }
            Payload::Gaze { ratio, y_ratio, .. } => {
                if let Some(ratio) = ratio {
                    meta.insert("ratio".into(), (*ratio).into());
                }
                if let Some(y_ratio) = y_ratio {
                    meta.insert("y_ratio".into(), (*y_ratio).into());
                }
            }
            Payload::Point { x_norm, y_norm } => {
                meta.insert("x_norm".into(), (*x_norm).into());
                meta.insert("y_norm".into(), (*y_norm).into());
            }
            Payload::Mode(_) | Payload::System(_) => {}
            Payload::Intent(intent) => match intent {
                Intent::CursorMove {
                    x_norm,
                    y_norm,
                    source,
                } => {
                    meta.insert("x_norm".into(), (*x_norm).into());
                    meta.insert("y_norm".into(), (*y_norm).into());
                    if let Some(source) = source {
                        meta.insert("source".into(), source.as_str().into());
                    }
                }
                Intent::Click { precise: true } => {
                    meta.insert("mode".into(), "PRECISE".into());
                }
                Intent::Scroll { delta } => {
                    meta.insert("dy".into(), (*delta).into());
                }
                Intent::Cancel { mode } => {
                    meta.insert("mode".into(), mode.as_str().into());
                }
                _ => {}
            },
        }

        RawEvent {
            ts: Some(event.timestamp),
            kind: event.kind().as_str().to_string(),
            name: event.name().to_string(),
            confidence: event.confidence,
            meta,
        }
    }
}
