//! Intent engine state
//!
//! Private to one engine instance. Tracks control mode, hold timers and the
//! engine's own view of the drag lifecycle.

use crate::event::{ControlMode, Gesture};

/// Vertical gaze ratio assumed before any vertical reading arrives
const DEFAULT_GAZE_Y: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    pub control_mode: ControlMode,
    /// Most recent fingertip position
    pub last_point: Option<(f64, f64)>,
    /// Gesture seen on the previous gesture event
    pub last_gesture: Gesture,
    /// When the current pinch hold started
    pub pinch_start: Option<f64>,
    /// When the current fist hold started
    pub fist_start: Option<f64>,
    /// Mirrors the guard's drag flag; set only when a drag start is approved
    pub drag_active: bool,
    /// Fallback when a gaze event carries no vertical ratio
    pub last_gaze_y: f64,
}

impl EngineState {
    pub fn new(control_mode: ControlMode) -> Self {
        Self {
            control_mode,
            last_point: None,
            last_gesture: Gesture::None,
            pinch_start: None,
            fist_start: None,
            drag_active: false,
            last_gaze_y: DEFAULT_GAZE_Y,
        }
    }

    /// Flip control mode, dropping any hold in progress and the drag flag
    pub fn toggle_control_mode(&mut self) -> ControlMode {
        self.control_mode = self.control_mode.toggled();
        self.pinch_start = None;
        self.fist_start = None;
        self.drag_active = false;
        self.control_mode
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new(ControlMode::default())
    }
}

/// Milliseconds a hold has lasted, starting it at `now` if not running
pub(super) fn hold_ms(start: &mut Option<f64>, now: f64) -> f64 {
    let started = *start.get_or_insert(now);
    (now - started) * 1000.0
}
