//! Mouse controller
//!
//! Turns normalised commands into device operations on a
//! [`PointerBackend`]. Keeps its own drag flag so repeated drag start/stop
//! calls never double-press or double-release a button.

use anyhow::{anyhow, Result};
use tracing::{debug, info};

use super::{Actuator, Button};
use crate::event::CursorSource;

/// Raw pointer device
pub trait PointerBackend: Send {
    /// Screen size in pixels, if known
    fn screen_size(&self) -> Option<(u32, u32)>;
    fn move_to(&mut self, x: u32, y: u32) -> Result<()>;
    fn press(&mut self, button: Button) -> Result<()>;
    fn release(&mut self, button: Button) -> Result<()>;
    fn click(&mut self, button: Button, count: u32) -> Result<()>;
    fn scroll(&mut self, dy: f64) -> Result<()>;
}

pub struct MouseController<B> {
    backend: B,
    dragging: Option<Button>,
}

impl<B: PointerBackend> MouseController<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            dragging: None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging.is_some()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

fn to_pixel(norm: f64, extent: u32) -> u32 {
    let max = extent.saturating_sub(1);
    ((norm.clamp(0.0, 1.0) * extent as f64) as u32).min(max)
}

impl<B: PointerBackend> Actuator for MouseController<B> {
    fn move_cursor(&mut self, x_norm: f64, y_norm: f64, source: Option<CursorSource>) -> Result<()> {
        let (w, h) = self
            .backend
            .screen_size()
            .ok_or_else(|| anyhow!("screen size unavailable"))?;
        let (x, y) = (to_pixel(x_norm, w), to_pixel(y_norm, h));
        debug!(x, y, ?source, "Move cursor");
        self.backend.move_to(x, y)
    }

    fn click(&mut self, button: Button) -> Result<()> {
        self.backend.click(button, 1)
    }

    fn double_click(&mut self, button: Button) -> Result<()> {
        self.backend.click(button, 2)
    }

    fn scroll(&mut self, delta: f64) -> Result<()> {
        self.backend.scroll(delta)
    }

    fn drag_start(&mut self, button: Button) -> Result<()> {
        if self.dragging.is_some() {
            return Ok(());
        }
        self.backend.press(button)?;
        self.dragging = Some(button);
        Ok(())
    }

    fn drag_stop(&mut self, button: Button) -> Result<()> {
        if self.dragging.is_none() {
            return Ok(());
        }
        self.backend.release(button)?;
        self.dragging = None;
        Ok(())
    }
}

/// Backend that only logs what a real device would do
#[derive(Debug, Clone)]
pub struct DryRunBackend {
    size: (u32, u32),
}

impl DryRunBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
        }
    }
}

impl Default for DryRunBackend {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl PointerBackend for DryRunBackend {
    fn screen_size(&self) -> Option<(u32, u32)> {
        Some(self.size)
    }

    fn move_to(&mut self, x: u32, y: u32) -> Result<()> {
        debug!(x, y, "[dry-run] move");
        Ok(())
    }

    fn press(&mut self, button: Button) -> Result<()> {
        info!(?button, "[dry-run] press");
        Ok(())
    }

    fn release(&mut self, button: Button) -> Result<()> {
        info!(?button, "[dry-run] release");
        Ok(())
    }

    fn click(&mut self, button: Button, count: u32) -> Result<()> {
        info!(?button, count, "[dry-run] click");
        Ok(())
    }

    fn scroll(&mut self, dy: f64) -> Result<()> {
        info!(dy, "[dry-run] scroll");
        Ok(())
    }
}
