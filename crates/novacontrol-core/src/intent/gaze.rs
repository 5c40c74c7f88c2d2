//! Gaze-to-screen mapping seam
//!
//! Calibration lives outside this crate; the engine only needs a function
//! from raw gaze ratios to normalised screen coordinates.

/// Maps raw gaze ratios to screen-normalised coordinates
pub trait GazeMapper: Send + Sync {
    fn map(&self, x_ratio: f64, y_ratio: f64) -> (f64, f64);
}

impl<F> GazeMapper for F
where
    F: Fn(f64, f64) -> (f64, f64) + Send + Sync,
{
    fn map(&self, x_ratio: f64, y_ratio: f64) -> (f64, f64) {
        self(x_ratio, y_ratio)
    }
}
