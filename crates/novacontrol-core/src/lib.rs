//! NovaControl core
//!
//! The decision pipeline between perception producers and the pointer:
//! events flow over an in-process [`EventBus`], the [`IntentEngine`] turns
//! gestures, fingertip points and gaze into intents, the [`SafetyGuard`]
//! gates every intent, and approved intents are published back on the bus
//! and handed to an [`Actuator`].

pub mod actuation;
pub mod bus;
pub mod cancellation;
pub mod config;
pub mod error;
pub mod event;
pub mod intent;
pub mod safety;

pub use actuation::{ActuationCommand, ActuationHandle, ActuationWorker, Actuator, Button};
pub use bus::{EventBus, Subscription, Topic};
pub use cancellation::Shutdown;
pub use config::AppConfig;
pub use error::{BusError, ConfigError, WireError};
pub use event::{Event, EventKind, Intent, Payload, RawEvent};
pub use intent::IntentEngine;
pub use safety::{Rejection, SafetyGuard, SafetyState};
