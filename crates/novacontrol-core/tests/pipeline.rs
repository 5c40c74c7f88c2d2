//! End-to-end: producer thread -> bus -> engine -> guard -> actuator

use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

use novacontrol_core::event::{ArmMode, CursorSource, Gesture, SystemSignal};
use novacontrol_core::{
    ActuationWorker, Actuator, AppConfig, Button, Event, EventBus, EventKind, Intent,
    IntentEngine, SafetyGuard, Shutdown, Subscription,
};

#[derive(Default, Clone)]
struct RecordingActuator {
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingActuator {
    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl Actuator for RecordingActuator {
    fn move_cursor(&mut self, x: f64, y: f64, _source: Option<CursorSource>) -> Result<()> {
        self.record(format!("move {x},{y}"))
    }
    fn click(&mut self, button: Button) -> Result<()> {
        self.record(format!("click {button:?}"))
    }
    fn double_click(&mut self, button: Button) -> Result<()> {
        self.record(format!("double_click {button:?}"))
    }
    fn scroll(&mut self, delta: f64) -> Result<()> {
        self.record(format!("scroll {delta}"))
    }
    fn drag_start(&mut self, button: Button) -> Result<()> {
        self.record(format!("drag_start {button:?}"))
    }
    fn drag_stop(&mut self, button: Button) -> Result<()> {
        self.record(format!("drag_stop {button:?}"))
    }
}

async fn next_intent(sub: &mut Subscription) -> Intent {
    let event = timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("timed out waiting for intent")
        .expect("bus closed");
    event.as_intent().cloned().expect("not an intent")
}

fn hand_mode_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.intent.initial_control_mode = novacontrol_core::event::ControlMode::Hand;
    config
}

#[tokio::test]
async fn test_threaded_producer_drives_drag_and_pointer() {
    let config = hand_mode_config();
    let bus = EventBus::new(config.event_queue_size);
    bus.bind().unwrap();
    let shutdown = Shutdown::new();

    let guard = Arc::new(SafetyGuard::new(config.safety.clone()));
    let actuator = RecordingActuator::default();
    let calls = actuator.calls.clone();
    let (actuation, worker) = ActuationWorker::spawn(Box::new(actuator));

    let mut intents = bus.subscribe(EventKind::Intent);
    let engine = IntentEngine::new(bus.clone(), guard.clone(), actuation, &config)
        .spawn(shutdown.child_token());

    let producer = {
        let bus = bus.clone();
        std::thread::spawn(move || {
            let frames = [
                Event::mode(0.0, ArmMode::Armed),
                Event::gesture(0.0, Gesture::Pinch, Some(0.9)),
                Event::gesture(0.25, Gesture::Pinch, Some(0.9)),
                Event::gesture(0.5, Gesture::Pinch, Some(0.9)),
                Event::gesture(0.75, Gesture::Pinch, Some(0.9)),
                Event::gesture(1.0, Gesture::None, Some(0.9)),
                Event::point(1.125, 0.5, 0.25),
                Event::gesture(1.25, Gesture::Point, Some(0.9)),
            ];
            for event in frames {
                bus.publish_threadsafe(event).unwrap();
            }
        })
    };
    producer.join().unwrap();

    assert_eq!(next_intent(&mut intents).await, Intent::DragStart);
    assert_eq!(next_intent(&mut intents).await, Intent::DragStop);
    assert_eq!(
        next_intent(&mut intents).await,
        Intent::CursorMove {
            x_norm: 0.5,
            y_norm: 0.25,
            source: None
        }
    );
    assert!(guard.is_armed());
    assert!(!guard.snapshot().drag_active);

    shutdown.request();
    engine.await.unwrap();
    bus.close();
    // The engine held the last actuation handle
    worker.await.unwrap();

    assert_eq!(
        *calls.lock().unwrap(),
        vec!["drag_start Left", "drag_stop Left", "move 0.5,0.25"]
    );
}

#[tokio::test]
async fn test_emergency_blocks_until_cleared_and_rearmed() {
    let mut config = hand_mode_config();
    config.safety.default_mode = ArmMode::Armed;
    let bus = EventBus::new(config.event_queue_size);
    let shutdown = Shutdown::new();
    let guard = Arc::new(SafetyGuard::new(config.safety.clone()));
    let (actuation, _commands) = novacontrol_core::ActuationHandle::channel();

    let mut intents = bus.subscribe(EventKind::Intent);
    let engine = IntentEngine::new(bus.clone(), guard.clone(), actuation, &config)
        .spawn(shutdown.child_token());

    bus.publish(Event::system(0.0, SystemSignal::EmergencyStop));
    bus.publish(Event::gesture(0.0, Gesture::Fist, Some(0.9)));
    bus.publish(Event::gesture(0.25, Gesture::Fist, Some(0.9)));
    bus.publish(Event::system(0.3, SystemSignal::ClearEmergency));
    bus.publish(Event::mode(0.4, ArmMode::Armed));
    bus.publish(Event::gesture(0.5, Gesture::Fist, Some(0.9)));
    bus.publish(Event::gesture(0.75, Gesture::Fist, Some(0.9)));

    // The first click candidate at 0.25 was rejected; the hold restarted
    let event = timeout(Duration::from_secs(2), intents.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.timestamp, 0.75);
    assert_eq!(event.as_intent(), Some(&Intent::Click { precise: true }));

    bus.close();
    engine.await.unwrap();
    assert!(intents.recv().await.is_none());
}

#[tokio::test]
async fn test_gaze_drives_cursor_in_eye_mode() {
    let mut config = AppConfig::default();
    config.safety.default_mode = ArmMode::Armed;
    let bus = EventBus::new(8);
    let shutdown = Shutdown::new();
    let guard = Arc::new(SafetyGuard::new(config.safety.clone()));
    let (actuation, mut commands) = novacontrol_core::ActuationHandle::channel();

    let mut intents = bus.subscribe(EventKind::Intent);
    let engine = IntentEngine::new(bus.clone(), guard, actuation, &config)
        .spawn(shutdown.child_token());

    bus.publish(Event::gaze(0.0, 0.75, Some(0.25), Some(0.8)));
    assert_eq!(
        next_intent(&mut intents).await,
        Intent::CursorMove {
            x_norm: 0.75,
            y_norm: 0.25,
            source: Some(CursorSource::Gaze)
        }
    );
    assert!(commands.recv().await.is_some());
    assert_eq!(bus.latest(EventKind::Gaze).map(|e| e.timestamp), Some(0.0));

    shutdown.request();
    engine.await.unwrap();
}
