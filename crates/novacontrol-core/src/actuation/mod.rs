//! Actuation boundary
//!
//! Approved intents become [`ActuationCommand`]s, applied to an
//! [`Actuator`] on a dedicated worker so a slow or failing device never
//! stalls intent recognition.

mod mouse;
mod worker;

pub use mouse::{DryRunBackend, MouseController, PointerBackend};
pub use worker::{ActuationHandle, ActuationWorker};

use anyhow::Result;

use crate::event::{CursorSource, Intent};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Button {
    #[default]
    Left,
    Right,
    Middle,
}

/// Pointer device operations, all fire-and-forget from the caller's view
pub trait Actuator: Send {
    fn move_cursor(&mut self, x_norm: f64, y_norm: f64, source: Option<CursorSource>) -> Result<()>;
    fn click(&mut self, button: Button) -> Result<()>;
    fn double_click(&mut self, button: Button) -> Result<()>;
    fn right_click(&mut self) -> Result<()> {
        self.click(Button::Right)
    }
    fn scroll(&mut self, delta: f64) -> Result<()>;
    fn drag_start(&mut self, button: Button) -> Result<()>;
    fn drag_stop(&mut self, button: Button) -> Result<()>;
}

/// One primitive pointer operation
#[derive(Debug, Clone, PartialEq)]
pub enum ActuationCommand {
    MoveCursor {
        x_norm: f64,
        y_norm: f64,
        source: Option<CursorSource>,
    },
    Click(Button),
    DoubleClick(Button),
    RightClick,
    Scroll { delta: f64 },
    DragStart(Button),
    DragStop(Button),
}

impl ActuationCommand {
    /// Command executing an approved intent.
    ///
    /// Cancel maps to a drag stop so a toggle of control mode always
    /// releases an in-flight drag. Unclassified intents have no command.
    pub fn for_intent(intent: &Intent) -> Option<Self> {
        let command = match intent {
            Intent::CursorMove {
                x_norm,
                y_norm,
                source,
            } => Self::MoveCursor {
                x_norm: *x_norm,
                y_norm: *y_norm,
                source: *source,
            },
            Intent::Click { .. } => Self::Click(Button::Left),
            Intent::DoubleClick => Self::DoubleClick(Button::Left),
            Intent::RightClick => Self::RightClick,
            Intent::DragStart => Self::DragStart(Button::Left),
            Intent::DragStop | Intent::Cancel { .. } => Self::DragStop(Button::Left),
            Intent::Scroll { delta } => Self::Scroll { delta: *delta },
            Intent::Other(_) => return None,
        };
        Some(command)
    }

    pub fn apply(&self, actuator: &mut dyn Actuator) -> Result<()> {
        match *self {
            Self::MoveCursor {
                x_norm,
                y_norm,
                source,
            } => actuator.move_cursor(x_norm, y_norm, source),
            Self::Click(button) => actuator.click(button),
            Self::DoubleClick(button) => actuator.double_click(button),
            Self::RightClick => actuator.right_click(),
            Self::Scroll { delta } => actuator.scroll(delta),
            Self::DragStart(button) => actuator.drag_start(button),
            Self::DragStop(button) => actuator.drag_stop(button),
        }
    }
}
