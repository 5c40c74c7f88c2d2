//! Keyboard hook
//!
//! Reads terminal key events on its own OS thread and turns the arm and
//! emergency keys into `mode` and `system` events. Events cross into the
//! runtime through [`EventBus::publish_threadsafe`].

use anyhow::{Context, Result};
use crossterm::event::{
    self, Event as TermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use std::io;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use novacontrol_core::config::KeyboardConfig;
use novacontrol_core::event::{now_secs, ArmMode, SystemSignal};
use novacontrol_core::{Event, EventBus, Shutdown};

/// How often the hook thread checks for shutdown between key events
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Arm/emergency key handling, independent of the terminal
#[derive(Debug)]
pub struct KeyState {
    config: KeyboardConfig,
    arm_key: String,
    emergency_key: String,
    armed: bool,
}

impl KeyState {
    pub fn new(config: KeyboardConfig, armed: bool) -> Self {
        Self {
            arm_key: normalize_key(&config.arm_key),
            emergency_key: normalize_key(&config.emergency_key),
            config,
            armed,
        }
    }

    pub fn on_press(&mut self, key: &str, ts: f64) -> Option<Event> {
        if key == self.emergency_key {
            return Some(Event::system(ts, SystemSignal::EmergencyStop));
        }
        if key != self.arm_key {
            return None;
        }
        if self.config.toggle_arm {
            self.armed = !self.armed;
        } else if !self.armed {
            self.armed = true;
        } else {
            return None;
        }
        Some(Event::mode(ts, self.mode()))
    }

    pub fn on_release(&mut self, key: &str, ts: f64) -> Option<Event> {
        if key == self.arm_key && self.armed && self.config.safe_on_release {
            self.armed = false;
            return Some(Event::mode(ts, ArmMode::Safe));
        }
        None
    }

    fn mode(&self) -> ArmMode {
        if self.armed {
            ArmMode::Armed
        } else {
            ArmMode::Safe
        }
    }
}

fn normalize_key(name: &str) -> String {
    match name.trim().to_lowercase().as_str() {
        "escape" => "esc".to_string(),
        " " => "space".to_string(),
        other => other.to_string(),
    }
}

/// Config-style name for a terminal key
pub fn key_name(code: KeyCode) -> Option<String> {
    let name = match code {
        KeyCode::Char(' ') => "space".to_string(),
        KeyCode::Char(c) => c.to_lowercase().to_string(),
        KeyCode::Esc => "esc".to_string(),
        KeyCode::Enter => "enter".to_string(),
        KeyCode::Tab => "tab".to_string(),
        KeyCode::Backspace => "backspace".to_string(),
        KeyCode::F(n) => format!("f{n}"),
        _ => return None,
    };
    Some(name)
}

pub struct KeyboardHook {
    bus: EventBus,
    state: KeyState,
    shutdown: Shutdown,
}

impl KeyboardHook {
    pub fn new(bus: EventBus, config: KeyboardConfig, armed: bool, shutdown: Shutdown) -> Self {
        Self {
            bus,
            state: KeyState::new(config, armed),
            shutdown,
        }
    }

    pub fn spawn(self) -> Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("keyboard-hook".to_string())
            .spawn(move || self.run())
            .context("Failed to spawn keyboard hook thread")
    }

    fn run(mut self) {
        let _raw = match RawMode::enable() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Terminal raw mode unavailable, keyboard hook disabled");
                return;
            }
        };
        info!(
            arm = %self.state.arm_key,
            emergency = %self.state.emergency_key,
            "Keyboard hook active"
        );

        while !self.shutdown.is_requested() {
            match event::poll(POLL_INTERVAL) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    error!(error = %e, "Keyboard poll failed");
                    break;
                }
            }
            match event::read() {
                Ok(TermEvent::Key(key)) => self.handle_key(key),
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Keyboard read failed");
                    break;
                }
            }
        }
        debug!("Keyboard hook stopped");
    }

    fn handle_key(&mut self, key: KeyEvent) {
        // Raw mode swallows SIGINT
        if key.kind == KeyEventKind::Press
            && key.modifiers.contains(KeyModifiers::CONTROL)
            && key.code == KeyCode::Char('c')
        {
            info!("Ctrl-C pressed, shutting down");
            self.shutdown.request();
            return;
        }

        let Some(name) = key_name(key.code) else {
            return;
        };
        let ts = now_secs();
        let event = match key.kind {
            KeyEventKind::Press => self.state.on_press(&name, ts),
            KeyEventKind::Release => self.state.on_release(&name, ts),
            KeyEventKind::Repeat => None,
        };
        if let Some(event) = event {
            debug!(kind = %event.kind(), name = event.name(), "Keyboard event");
            if let Err(e) = self.bus.publish_threadsafe(event) {
                error!(error = %e, "Keyboard hook publish failed");
            }
        }
    }
}

/// Raw mode for the lifetime of the hook, restored on drop
struct RawMode {
    enhanced: bool,
}

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        // Release events need the kitty protocol
        let enhanced = terminal::supports_keyboard_enhancement().unwrap_or(false)
            && execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .is_ok();
        Ok(Self { enhanced })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
        }
        if let Err(e) = terminal::disable_raw_mode() {
            warn!(error = %e, "Failed to restore terminal mode");
        }
    }
}
