//! Intent engine
//!
//! Interprets raw perception into intents. Runs one consumption loop over a
//! wildcard subscription; every intent it decides on goes through the
//! safety guard, and only approved intents are republished on the bus and
//! handed to the actuation worker.
//!
//! Gesture handling in `HAND` mode:
//!
//! - `FIST` held for `fist_click_ms` fires a precise click and restarts the
//!   hold, so a held fist keeps clicking (throttled only by the guard's
//!   click cooldown).
//! - `PINCH` held for `drag_hold_ms` starts a drag. Leaving the pinch stops
//!   an active drag, or clicks if the pinch was short.
//! - `POINT` moves the cursor to the last fingertip position.
//!
//! `OPEN_PALM` toggles between `EYE` and `HAND` and is the only gesture
//! honoured in `EYE` mode, where gaze drives the cursor instead.

mod gaze;
mod state;

pub use gaze::GazeMapper;
pub use state::EngineState;

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use self::state::hold_ms;
use crate::actuation::{ActuationCommand, ActuationHandle};
use crate::bus::{EventBus, Subscription, Topic};
use crate::config::AppConfig;
use crate::event::{ControlMode, CursorSource, Event, Gesture, Intent, Payload, SystemSignal};
use crate::safety::SafetyGuard;

pub struct IntentEngine {
    bus: EventBus,
    guard: Arc<SafetyGuard>,
    actuation: ActuationHandle,
    gaze_mapper: Option<Box<dyn GazeMapper>>,
    drag_hold_ms: f64,
    fist_click_ms: f64,
    state: EngineState,
}

impl IntentEngine {
    pub fn new(
        bus: EventBus,
        guard: Arc<SafetyGuard>,
        actuation: ActuationHandle,
        config: &AppConfig,
    ) -> Self {
        Self {
            bus,
            guard,
            actuation,
            gaze_mapper: None,
            drag_hold_ms: config.safety.drag_hold_ms as f64,
            fist_click_ms: config.intent.fist_click_ms as f64,
            state: EngineState::new(config.intent.initial_control_mode),
        }
    }

    pub fn with_gaze_mapper(mut self, mapper: impl GazeMapper + 'static) -> Self {
        self.gaze_mapper = Some(Box::new(mapper));
        self
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn control_mode(&self) -> ControlMode {
        self.state.control_mode
    }

    /// Subscribe to everything and run the loop on a new task
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        let events = self.bus.subscribe(Topic::All);
        tokio::spawn(self.run(events, cancel))
    }

    /// Consume events until cancelled or the bus closes.
    ///
    /// Events already queued when cancellation arrives are still handled,
    /// so a trailing drag stop or emergency stop is never skipped.
    pub async fn run(mut self, mut events: Subscription, cancel: CancellationToken) {
        info!(mode = %self.state.control_mode, "Intent engine started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let mut drained = 0;
                    while let Some(event) = events.try_recv() {
                        self.handle_event(&event);
                        drained += 1;
                    }
                    debug!(drained, "Drained queued events on shutdown");
                    break;
                }
                next = events.recv() => match next {
                    Some(event) => self.handle_event(&event),
                    None => break,
                },
            }
        }
        info!("Intent engine stopped");
    }

    pub fn handle_event(&mut self, event: &Event) {
        match &event.payload {
            Payload::Mode(mode) => self.guard.set_mode(*mode),
            Payload::System(signal) => match signal {
                SystemSignal::EmergencyStop => self.guard.emergency_stop(),
                SystemSignal::ClearEmergency => self.guard.clear_emergency(),
                SystemSignal::TrackingLost => self.guard.notify_tracking_lost(),
                SystemSignal::Other(name) => trace!(name = %name, "Ignoring system event"),
            },
            Payload::Point { x_norm, y_norm } => self.state.last_point = Some((*x_norm, *y_norm)),
            Payload::Gaze { ratio, y_ratio, .. } => self.handle_gaze(event, *ratio, *y_ratio),
            Payload::Gesture { gesture, .. } => self.handle_gesture(event, *gesture),
            // Our own republished intents come back through the wildcard
            Payload::Intent(_) => {}
        }
    }

    fn handle_gesture(&mut self, event: &Event, gesture: Gesture) {
        let now = event.timestamp;

        if gesture == Gesture::OpenPalm {
            let mode = self.state.toggle_control_mode();
            info!(mode = %mode, "Control mode toggled");
            self.emit(event, Intent::Cancel { mode });
            self.state.last_gesture = gesture;
            return;
        }

        if self.state.control_mode == ControlMode::Eye {
            self.state.last_gesture = gesture;
            return;
        }

        // FIST does not return early: leaving a pinch for a fist still
        // runs the pinch-release branch below (drag stop or click).
        if gesture == Gesture::Fist {
            if hold_ms(&mut self.state.fist_start, now) >= self.fist_click_ms {
                self.emit(event, Intent::Click { precise: true });
                self.state.fist_start = None;
            }
        } else {
            self.state.fist_start = None;
        }

        if gesture == Gesture::Pinch {
            let held = hold_ms(&mut self.state.pinch_start, now);
            if !self.state.drag_active
                && held >= self.drag_hold_ms
                && self.emit(event, Intent::DragStart)
            {
                self.state.drag_active = true;
            }
        } else {
            if self.state.drag_active {
                if self.emit(event, Intent::DragStop) {
                    self.state.drag_active = false;
                }
            } else if self.state.pinch_start.is_some() && self.state.last_gesture == Gesture::Pinch {
                self.emit(event, Intent::Click { precise: false });
            }
            self.state.pinch_start = None;
        }

        if gesture == Gesture::Point {
            if let Some((x_norm, y_norm)) = self.state.last_point {
                self.emit(
                    event,
                    Intent::CursorMove {
                        x_norm,
                        y_norm,
                        source: None,
                    },
                );
            }
        }

        self.state.last_gesture = gesture;
    }

    fn handle_gaze(&mut self, event: &Event, ratio: Option<f64>, y_ratio: Option<f64>) {
        if self.state.control_mode != ControlMode::Eye {
            return;
        }
        let Some(x) = ratio else {
            trace!("Gaze event without ratio");
            return;
        };
        let y = y_ratio.unwrap_or(self.state.last_gaze_y);
        let (x_norm, y_norm) = match &self.gaze_mapper {
            Some(mapper) => mapper.map(x, y),
            None => (x, y),
        };
        self.emit(
            event,
            Intent::CursorMove {
                x_norm,
                y_norm,
                source: Some(CursorSource::Gaze),
            },
        );
        self.state.last_gaze_y = y_norm;
    }

    /// Gate an intent; on approval publish it and queue its actuation.
    /// Returns whether it was approved.
    fn emit(&mut self, cause: &Event, intent: Intent) -> bool {
        let event = Event::intent(cause.timestamp, intent, cause.confidence);
        if !self.guard.approve(&event) {
            return false;
        }
        debug!(intent = event.name(), ts = event.timestamp, "Intent approved");

        let command = event.as_intent().and_then(ActuationCommand::for_intent);
        self.bus.publish(event);
        if let Some(command) = command {
            self.actuation.dispatch(command);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuation::Button;
    use crate::event::{ArmMode, EventKind};
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Harness {
        engine: IntentEngine,
        guard: Arc<SafetyGuard>,
        intents: Subscription,
        commands: UnboundedReceiver<ActuationCommand>,
    }

    impl Harness {
        fn new(mode: ControlMode) -> Self {
            let mut config = AppConfig::default();
            config.intent.initial_control_mode = mode;
            config.safety.default_mode = ArmMode::Armed;
            Self::with_config(config)
        }

        fn with_config(config: AppConfig) -> Self {
            Self::build(config, |engine| engine)
        }

        fn build(config: AppConfig, wrap: impl FnOnce(IntentEngine) -> IntentEngine) -> Self {
            let bus = EventBus::new(64);
            let guard = Arc::new(SafetyGuard::new(config.safety.clone()));
            let (actuation, commands) = ActuationHandle::channel();
            let intents = bus.subscribe(EventKind::Intent);
            let engine = wrap(IntentEngine::new(bus, guard.clone(), actuation, &config));
            Self {
                engine,
                guard,
                intents,
                commands,
            }
        }

        fn gesture(&mut self, ts: f64, gesture: Gesture) {
            self.engine
                .handle_event(&Event::gesture(ts, gesture, Some(0.9)));
        }

        fn intents(&mut self) -> Vec<(f64, Intent)> {
            std::iter::from_fn(|| self.intents.try_recv())
                .filter_map(|e| e.as_intent().cloned().map(|i| (e.timestamp, i)))
                .collect()
        }

        fn commands(&mut self) -> Vec<ActuationCommand> {
            std::iter::from_fn(|| self.commands.try_recv().ok()).collect()
        }
    }

    fn frames(step: f64, count: usize) -> impl Iterator<Item = f64> {
        (0..count).map(move |i| i as f64 * step)
    }

    #[test]
    fn test_pinch_hold_emits_single_drag_start() {
        let mut h = Harness::new(ControlMode::Hand);
        // 62.5ms frames up to 687.5ms
        for ts in frames(0.0625, 12) {
            h.gesture(ts, Gesture::Pinch);
        }

        assert_eq!(h.intents(), vec![(0.625, Intent::DragStart)]);
        assert!(h.engine.state().drag_active);
        assert!(h.guard.snapshot().drag_active);
        assert_eq!(h.commands(), vec![ActuationCommand::DragStart(Button::Left)]);
        assert_eq!(
            h.engine.bus.latest(EventKind::Intent).map(|e| e.timestamp),
            Some(0.625)
        );
    }

    #[test]
    fn test_short_pinch_release_clicks() {
        let mut h = Harness::new(ControlMode::Hand);
        h.gesture(0.0, Gesture::Pinch);
        h.gesture(0.125, Gesture::Pinch);
        h.gesture(0.25, Gesture::None);

        assert_eq!(h.intents(), vec![(0.25, Intent::Click { precise: false })]);
        assert_eq!(h.engine.state().pinch_start, None);
        assert_eq!(h.commands(), vec![ActuationCommand::Click(Button::Left)]);
    }

    #[test]
    fn test_drag_release_emits_drag_stop() {
        let mut h = Harness::new(ControlMode::Hand);
        h.gesture(0.0, Gesture::Pinch);
        h.gesture(0.75, Gesture::Pinch);
        h.gesture(0.875, Gesture::Unknown);

        let names: Vec<_> = h.intents().into_iter().map(|(_, i)| i).collect();
        assert_eq!(names, vec![Intent::DragStart, Intent::DragStop]);
        assert!(!h.engine.state().drag_active);
        assert!(!h.guard.snapshot().drag_active);
        assert_eq!(
            h.commands(),
            vec![
                ActuationCommand::DragStart(Button::Left),
                ActuationCommand::DragStop(Button::Left)
            ]
        );
    }

    #[test]
    fn test_fist_after_pinch_releases_drag() {
        let mut h = Harness::new(ControlMode::Hand);
        h.gesture(0.0, Gesture::Pinch);
        h.gesture(0.75, Gesture::Pinch);
        h.gesture(0.875, Gesture::Fist);

        let names: Vec<_> = h.intents().into_iter().map(|(_, i)| i).collect();
        assert_eq!(names, vec![Intent::DragStart, Intent::DragStop]);
        assert_eq!(h.engine.state().fist_start, Some(0.875));
    }

    #[test]
    fn test_rejected_drag_start_retries_next_frame() {
        let mut config = AppConfig::default();
        config.intent.initial_control_mode = ControlMode::Hand;
        let mut h = Harness::with_config(config);

        h.gesture(0.0, Gesture::Pinch);
        h.gesture(0.75, Gesture::Pinch);
        assert!(h.intents().is_empty());
        assert!(!h.engine.state().drag_active);

        h.engine.handle_event(&Event::mode(0.8, ArmMode::Armed));
        h.gesture(0.875, Gesture::Pinch);
        assert_eq!(h.intents(), vec![(0.875, Intent::DragStart)]);
        assert!(h.engine.state().drag_active);
    }

    #[test]
    fn test_fist_hold_repeats_clicks() {
        let mut h = Harness::new(ControlMode::Hand);
        for ts in frames(0.125, 6) {
            h.gesture(ts, Gesture::Fist);
        }
        // Fires at 0.125, 0.375, 0.625: the hold restarts after every click
        let clicks: Vec<_> = h.intents().into_iter().map(|(ts, _)| ts).collect();
        assert_eq!(clicks, vec![0.125, 0.375, 0.625]);
        assert_eq!(h.commands().len(), 3);
    }

    #[test]
    fn test_fist_repeat_is_throttled_by_cooldown() {
        let mut h = Harness::new(ControlMode::Hand);
        for ts in frames(0.0625, 6) {
            h.gesture(ts, Gesture::Fist);
        }
        // Candidates at 0.125 and 0.3125; the second is inside the cooldown
        assert_eq!(
            h.intents(),
            vec![(0.125, Intent::Click { precise: true })]
        );
    }

    #[test]
    fn test_point_moves_to_last_fingertip() {
        let mut h = Harness::new(ControlMode::Hand);
        h.gesture(0.0, Gesture::Point);
        assert!(h.intents().is_empty());

        h.engine.handle_event(&Event::point(0.1, 0.25, 0.75));
        assert!(h.intents().is_empty());
        h.gesture(0.2, Gesture::Point);

        assert_eq!(
            h.intents(),
            vec![(
                0.2,
                Intent::CursorMove {
                    x_norm: 0.25,
                    y_norm: 0.75,
                    source: None
                }
            )]
        );
    }

    #[test]
    fn test_point_after_short_pinch_clicks_and_moves() {
        let mut h = Harness::new(ControlMode::Hand);
        h.engine.handle_event(&Event::point(0.0, 0.5, 0.5));
        h.gesture(0.0, Gesture::Pinch);
        h.gesture(0.125, Gesture::Point);

        let names: Vec<_> = h.intents().into_iter().map(|(_, i)| i.name().to_string()).collect();
        assert_eq!(names, vec!["CLICK", "CURSOR_MOVE"]);
    }

    #[test]
    fn test_open_palm_cancels_drag_regardless_of_approval() {
        let mut h = Harness::new(ControlMode::Hand);
        h.gesture(0.0, Gesture::Pinch);
        h.gesture(0.75, Gesture::Pinch);
        assert!(h.engine.state().drag_active);
        h.intents();
        h.commands();

        h.engine
            .handle_event(&Event::system(0.8, SystemSignal::EmergencyStop));
        h.gesture(0.875, Gesture::OpenPalm);

        assert!(h.intents().is_empty());
        assert!(!h.engine.state().drag_active);
        assert_eq!(h.engine.control_mode(), ControlMode::Eye);
    }

    #[test]
    fn test_open_palm_emits_cancel_with_new_mode() {
        let mut h = Harness::new(ControlMode::Hand);
        h.gesture(0.0, Gesture::Pinch);
        h.gesture(0.75, Gesture::Pinch);
        h.intents();
        h.commands();

        h.gesture(0.875, Gesture::OpenPalm);
        assert_eq!(
            h.intents(),
            vec![(
                0.875,
                Intent::Cancel {
                    mode: ControlMode::Eye
                }
            )]
        );
        assert!(!h.engine.state().drag_active);
        assert!(!h.guard.snapshot().drag_active);
        assert_eq!(h.commands(), vec![ActuationCommand::DragStop(Button::Left)]);
        assert_eq!(h.engine.state().last_gesture, Gesture::OpenPalm);
    }

    #[test]
    fn test_eye_mode_ignores_hand_gestures() {
        let mut h = Harness::new(ControlMode::Eye);
        h.engine.handle_event(&Event::point(0.0, 0.5, 0.5));
        for ts in frames(0.125, 8) {
            h.gesture(ts, Gesture::Pinch);
        }
        h.gesture(1.0, Gesture::Fist);
        h.gesture(1.125, Gesture::Fist);
        h.gesture(1.25, Gesture::Point);

        assert!(h.intents().is_empty());
        assert_eq!(h.engine.state().pinch_start, None);
        assert_eq!(h.engine.state().last_gesture, Gesture::Point);
    }

    #[test]
    fn test_gaze_inert_in_hand_mode() {
        let mut h = Harness::new(ControlMode::Hand);
        h.engine
            .handle_event(&Event::gaze(0.0, 0.5, Some(0.5), Some(0.9)));
        assert!(h.intents().is_empty());
        assert!(h.commands().is_empty());
    }

    #[test]
    fn test_gaze_moves_cursor_in_eye_mode() {
        let mut h = Harness::new(ControlMode::Eye);
        h.engine.handle_event(&Event::gaze(0.0, 0.25, None, Some(0.9)));
        h.engine
            .handle_event(&Event::gaze(0.1, 0.75, Some(0.125), Some(0.9)));
        h.engine.handle_event(&Event::gaze(0.2, 0.5, None, Some(0.9)));

        let moves: Vec<_> = h
            .intents()
            .into_iter()
            .map(|(_, i)| match i {
                Intent::CursorMove {
                    x_norm,
                    y_norm,
                    source,
                } => {
                    assert_eq!(source, Some(CursorSource::Gaze));
                    (x_norm, y_norm)
                }
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(moves, vec![(0.25, 0.5), (0.75, 0.125), (0.5, 0.125)]);
    }

    #[test]
    fn test_gaze_mapper_applied() {
        let mut config = AppConfig::default();
        config.safety.default_mode = ArmMode::Armed;
        let mut h = Harness::build(config, |engine| {
            engine.with_gaze_mapper(|x: f64, y: f64| (1.0 - x, y))
        });

        h.engine.handle_event(&Event::gaze(0.0, 0.25, Some(0.5), None));
        assert_eq!(
            h.intents(),
            vec![(
                0.0,
                Intent::CursorMove {
                    x_norm: 0.75,
                    y_norm: 0.5,
                    source: Some(CursorSource::Gaze)
                }
            )]
        );
    }

    #[test]
    fn test_low_confidence_gesture_is_dropped() {
        let mut h = Harness::new(ControlMode::Hand);
        h.engine
            .handle_event(&Event::gesture(0.0, Gesture::Pinch, Some(0.3)));
        h.engine
            .handle_event(&Event::gesture(0.125, Gesture::None, Some(0.3)));
        assert!(h.intents().is_empty());
    }

    #[test]
    fn test_mode_and_system_events_drive_guard() {
        let mut config = AppConfig::default();
        config.intent.initial_control_mode = ControlMode::Hand;
        let mut h = Harness::with_config(config);
        assert!(!h.guard.is_armed());

        h.engine.handle_event(&Event::mode(0.0, ArmMode::Armed));
        assert!(h.guard.is_armed());

        h.engine
            .handle_event(&Event::system(0.1, SystemSignal::TrackingLost));
        assert!(!h.guard.is_armed());

        h.engine
            .handle_event(&Event::system(0.2, SystemSignal::EmergencyStop));
        assert!(h.guard.snapshot().emergency);

        h.engine
            .handle_event(&Event::system(0.3, SystemSignal::ClearEmergency));
        assert!(!h.guard.snapshot().emergency);
    }

    #[test]
    fn test_republished_intents_are_ignored() {
        let mut h = Harness::new(ControlMode::Hand);
        let before = h.engine.state().clone();
        h.engine
            .handle_event(&Event::intent(0.0, Intent::DragStart, None));
        assert_eq!(h.engine.state(), &before);
        assert!(h.commands().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_run_handles_queued_events() {
        let mut config = AppConfig::default();
        config.intent.initial_control_mode = ControlMode::Hand;
        let Harness {
            engine,
            guard,
            mut intents,
            mut commands,
        } = Harness::with_config(config);
        let bus = engine.bus.clone();
        let events = bus.subscribe(Topic::All);

        bus.publish(Event::mode(0.0, ArmMode::Armed));
        bus.publish(Event::gesture(0.0, Gesture::Pinch, Some(0.9)));
        bus.publish(Event::gesture(0.0, Gesture::None, Some(0.9)));

        let cancel = CancellationToken::new();
        cancel.cancel();
        engine.run(events, cancel).await;

        assert!(guard.is_armed());
        let click = intents.try_recv().and_then(|e| e.as_intent().cloned());
        assert_eq!(click, Some(Intent::Click { precise: false }));
        assert_eq!(commands.try_recv().ok(), Some(ActuationCommand::Click(Button::Left)));
        assert!(bus.latest(EventKind::Intent).is_some());
    }

    #[tokio::test]
    async fn test_cancelled_run_latches_queued_emergency() {
        let h = Harness::new(ControlMode::Hand);
        let bus = h.engine.bus.clone();
        let events = bus.subscribe(Topic::All);
        bus.publish(Event::system(0.0, SystemSignal::EmergencyStop));

        let cancel = CancellationToken::new();
        cancel.cancel();
        h.engine.run(events, cancel).await;

        assert!(h.guard.snapshot().emergency);
    }
}
