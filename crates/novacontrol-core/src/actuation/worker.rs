//! Actuation worker
//!
//! Runs the actuator on a blocking thread fed by an unbounded channel.
//! Errors are logged and the worker moves on to the next command.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{ActuationCommand, Actuator};

/// Sending side used by the intent engine
#[derive(Clone, Debug)]
pub struct ActuationHandle {
    tx: mpsc::UnboundedSender<ActuationCommand>,
}

impl ActuationHandle {
    /// A handle plus the raw receiving end, for callers that drive
    /// commands themselves
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ActuationCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a command without waiting for it to run
    pub fn dispatch(&self, command: ActuationCommand) {
        if let Err(e) = self.tx.send(command) {
            warn!(command = ?e.0, "Actuation worker gone, dropping command");
        }
    }
}

pub struct ActuationWorker;

impl ActuationWorker {
    /// Spawn the worker on the blocking pool.
    ///
    /// It stops once every [`ActuationHandle`] has been dropped.
    pub fn spawn(actuator: Box<dyn Actuator>) -> (ActuationHandle, JoinHandle<()>) {
        let (handle, rx) = ActuationHandle::channel();
        let task = tokio::task::spawn_blocking(move || Self::run(actuator, rx));
        (handle, task)
    }

    fn run(mut actuator: Box<dyn Actuator>, mut rx: mpsc::UnboundedReceiver<ActuationCommand>) {
        while let Some(command) = rx.blocking_recv() {
            if let Err(e) = command.apply(actuator.as_mut()) {
                warn!(error = %e, ?command, "Actuation failed");
            }
        }
        debug!("Actuation worker stopped");
    }
}
