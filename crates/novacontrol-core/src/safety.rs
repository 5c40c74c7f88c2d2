//! Safety guard
//!
//! The single authority on whether a proposed intent may execute. The
//! decision looks only at the intent's class and confidence, plus a small
//! amount of state: arming, emergency stop, per-class cooldowns and drag
//! bookkeeping.
//!
//! Gate order in [`SafetyGuard::approve`], first failure wins:
//!
//! 1. emergency stop rejects everything
//! 2. confidence below `min_confidence` rejects (absent confidence passes)
//! 3. action-class intents require arming
//! 4. click-class intents respect `click_cooldown_ms`
//! 5. scrolls respect the same cooldown on their own timestamp
//! 6. drag start/stop (and cancel) update `drag_active`
//! 7. anything else is approved
//!
//! Intents outside the known classes ([`Intent::Other`]) are approved once
//! they clear gates 1 and 2. They carry no actuation, so approving them
//! executes nothing privileged.

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SafetyConfig;
use crate::event::{ArmMode, Event, Intent, IntentClass};

/// Mutable guard state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SafetyState {
    pub armed: bool,
    pub emergency: bool,
    /// Timestamp (seconds) of the last approved click-class intent
    pub last_click_time: Option<f64>,
    /// Timestamp (seconds) of the last approved scroll
    pub last_scroll_time: Option<f64>,
    pub drag_active: bool,
}

/// Why an intent was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Emergency,
    LowConfidence,
    Disarmed,
    Cooldown,
}

pub struct SafetyGuard {
    config: SafetyConfig,
    state: Mutex<SafetyState>,
}

impl SafetyGuard {
    pub fn new(config: SafetyConfig) -> Self {
        let state = SafetyState {
            armed: config.default_mode == ArmMode::Armed,
            ..SafetyState::default()
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> SafetyState {
        self.state.lock().clone()
    }

    pub fn is_armed(&self) -> bool {
        self.state.lock().armed
    }

    pub fn set_mode(&self, mode: impl Into<ArmMode>) {
        let armed = mode.into() == ArmMode::Armed;
        let mut state = self.state.lock();
        if state.armed != armed {
            info!(armed, "Arming changed");
        }
        state.armed = armed;
    }

    /// Latch the emergency stop and disarm. Sticky until cleared.
    pub fn emergency_stop(&self) {
        let mut state = self.state.lock();
        state.emergency = true;
        state.armed = false;
        warn!("Emergency stop engaged");
    }

    /// Release the emergency latch; arming is not restored
    pub fn clear_emergency(&self) {
        self.state.lock().emergency = false;
        info!("Emergency stop cleared");
    }

    pub fn notify_tracking_lost(&self) {
        if self.config.auto_disarm_on_tracking_loss {
            let mut state = self.state.lock();
            if state.armed {
                info!("Tracking lost, disarming");
            }
            state.armed = false;
        }
    }

    /// Decide whether `intent` may execute. Never fails.
    ///
    /// Cooldowns are measured against the intent's own timestamp. An event
    /// that is not an intent is treated like an unclassified intent.
    pub fn approve(&self, intent: &Event) -> bool {
        match self.evaluate(intent) {
            Ok(()) => true,
            Err(reason) => {
                debug!(intent = intent.name(), ?reason, "Intent rejected");
                false
            }
        }
    }

    /// [`SafetyGuard::approve`] with the rejection reason
    pub fn evaluate(&self, intent: &Event) -> Result<(), Rejection> {
        let mut state = self.state.lock();

        if state.emergency {
            return Err(Rejection::Emergency);
        }
        if intent
            .confidence
            .is_some_and(|confidence| confidence < self.config.min_confidence)
        {
            return Err(Rejection::LowConfidence);
        }

        let class = intent
            .as_intent()
            .map_or(IntentClass::Unclassified, Intent::class);
        if class.requires_arming() && !state.armed {
            return Err(Rejection::Disarmed);
        }

        let now = intent.timestamp;
        let cooldown_ms = self.config.click_cooldown_ms as f64;
        match class {
            IntentClass::Click => {
                if within_cooldown(state.last_click_time, now, cooldown_ms) {
                    return Err(Rejection::Cooldown);
                }
                state.last_click_time = Some(now);
            }
            IntentClass::Scroll => {
                if within_cooldown(state.last_scroll_time, now, cooldown_ms) {
                    return Err(Rejection::Cooldown);
                }
                state.last_scroll_time = Some(now);
            }
            IntentClass::DragStart => state.drag_active = true,
            IntentClass::DragStop | IntentClass::Cancel => state.drag_active = false,
            IntentClass::Pointer | IntentClass::Unclassified => {}
        }
        Ok(())
    }
}

/// Elapsed exactly equal to the cooldown counts as expired
fn within_cooldown(last: Option<f64>, now: f64, cooldown_ms: f64) -> bool {
    last.is_some_and(|last| (now - last) * 1000.0 < cooldown_ms)
}
