//! Pipeline orchestration
//!
//! Binds the bus to the runtime, starts the intent engine, actuation
//! worker and observer tasks, then waits for a shutdown request (signal,
//! emergency stop, or end of replay) and tears everything down in order.

use anyhow::{Context, Result};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use novacontrol_core::actuation::{DryRunBackend, MouseController};
use novacontrol_core::config::StatusConfig;
use novacontrol_core::event::{ArmMode, SystemSignal};
use novacontrol_core::{
    ActuationWorker, AppConfig, EventBus, EventKind, IntentEngine, Payload, SafetyGuard, Shutdown,
    Subscription, Topic,
};

use crate::keyboard::KeyboardHook;
use crate::replay;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// JSON-lines file to replay as the perception source
    pub replay: Option<PathBuf>,
    pub keyboard: bool,
}

pub struct Orchestrator {
    config: AppConfig,
    options: RunOptions,
    bus: EventBus,
    guard: Arc<SafetyGuard>,
    shutdown: Shutdown,
}

impl Orchestrator {
    pub fn new(config: AppConfig, options: RunOptions) -> Self {
        let bus = EventBus::new(config.event_queue_size);
        let guard = Arc::new(SafetyGuard::new(config.safety.clone()));
        Self {
            config,
            options,
            bus,
            guard,
            shutdown: Shutdown::new(),
        }
    }

    pub async fn run(self) -> Result<()> {
        self.bus.bind().context("Failed to bind event bus")?;

        let mouse = MouseController::new(DryRunBackend::default());
        let (actuation, worker) = ActuationWorker::spawn(Box::new(mouse));
        let engine = IntentEngine::new(self.bus.clone(), self.guard.clone(), actuation, &self.config)
            .spawn(self.shutdown.child_token());

        let mut tasks: Vec<JoinHandle<()>> = vec![
            tokio::spawn(log_events(
                self.bus.subscribe(Topic::All),
                self.shutdown.child_token(),
            )),
            tokio::spawn(watch_for_stop(
                self.bus.subscribe(EventKind::System),
                self.shutdown.clone(),
            )),
        ];
        if let Some(period) = status_period(&self.config.status) {
            tasks.push(tokio::spawn(report_status(
                self.bus.clone(),
                self.guard.clone(),
                period,
                self.shutdown.child_token(),
            )));
        }

        if let Some(path) = self.options.replay.clone() {
            let bus = self.bus.clone();
            let shutdown = self.shutdown.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = replay::run(bus, &path, shutdown.child_token()).await {
                    error!(error = %e, "Replay failed");
                }
                // Nothing else drives the pipeline once the replay is exhausted
                shutdown.request();
            }));
        }

        let keyboard = if self.options.keyboard {
            let armed = self.config.safety.default_mode == ArmMode::Armed;
            let hook = KeyboardHook::new(
                self.bus.clone(),
                self.config.keyboard.clone(),
                armed,
                self.shutdown.clone(),
            );
            match hook.spawn() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!(error = %e, "Keyboard hook not started");
                    None
                }
            }
        } else {
            None
        };

        info!(
            armed = self.guard.is_armed(),
            queue_size = self.bus.capacity(),
            "Orchestrator started"
        );

        tokio::select! {
            _ = self.shutdown.requested() => {}
            signal = wait_for_signal() => {
                match signal {
                    Ok(name) => info!(signal = name, "Shutdown signal received"),
                    Err(e) => error!(error = %e, "Signal handler failed"),
                }
            }
        }

        self.stop(engine, tasks, worker, keyboard).await;
        Ok(())
    }

    async fn stop(
        &self,
        engine: JoinHandle<()>,
        tasks: Vec<JoinHandle<()>>,
        worker: JoinHandle<()>,
        keyboard: Option<std::thread::JoinHandle<()>>,
    ) {
        self.shutdown.request();

        if let Some(handle) = keyboard {
            let joined = tokio::task::spawn_blocking(move || handle.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                warn!("Keyboard hook thread panicked");
            }
        }
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Task ended abnormally");
            }
        }
        // The engine handles whatever is still queued before exiting, so the
        // bus stays open until then for its final intents
        if let Err(e) = engine.await {
            warn!(error = %e, "Intent engine ended abnormally");
        }
        self.bus.close();
        // The engine owned the last actuation handle, so the worker drains and exits
        if let Err(e) = worker.await {
            warn!(error = %e, "Actuation worker ended abnormally");
        }

        let state = self.guard.snapshot();
        info!(
            armed = state.armed,
            emergency = state.emergency,
            "Orchestrator stopped"
        );
    }
}

async fn log_events(events: Subscription, cancel: CancellationToken) {
    let mut stream = std::pin::pin!(events.into_stream());
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = stream.next() => {
                let Some(event) = next else { break };
                debug!(
                    kind = %event.kind(),
                    name = event.name(),
                    confidence = ?event.confidence,
                    "Event"
                );
            }
        }
    }
}

/// Request shutdown on the first emergency stop
async fn watch_for_stop(mut events: Subscription, shutdown: Shutdown) {
    loop {
        tokio::select! {
            _ = shutdown.requested() => break,
            next = events.recv() => match next {
                Some(event) if event.payload == Payload::System(SystemSignal::EmergencyStop) => {
                    warn!("Emergency stop received, shutting down");
                    shutdown.request();
                    break;
                }
                Some(_) => {}
                None => break,
            },
        }
    }
}

/// Reporter period, `None` when `interval_ms` is 0
fn status_period(config: &StatusConfig) -> Option<Duration> {
    (config.interval_ms > 0).then_some(Duration::from_millis(config.interval_ms))
}

async fn report_status(
    bus: EventBus,
    guard: Arc<SafetyGuard>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let state = guard.snapshot();
                let mode = bus.latest(EventKind::Mode);
                let intent = bus.latest(EventKind::Intent);
                info!(
                    armed = state.armed,
                    emergency = state.emergency,
                    drag_active = state.drag_active,
                    mode = mode.as_ref().map_or("-", |e| e.name()),
                    last_intent = intent.as_ref().map_or("-", |e| e.name()),
                    "Status"
                );
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            Ok("SIGINT")
        }
        _ = term.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    Ok("Ctrl-C")
}
