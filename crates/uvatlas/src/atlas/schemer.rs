//! Progress reporting and cooperative cancellation.

use super::error::AtlasError;
use super::options::Progress;

/// Adapts absolute stage fractions to the user callback, throttled by the
/// configured frequency. Cancellation surfaces as [`AtlasError::Canceled`]
/// at the next checkpoint.
pub struct CallbackSchemer<'a> {
    callback: Option<&'a mut dyn FnMut(f32) -> Progress>,
    frequency: f64,
    last_reported: f64,
}

impl<'a> CallbackSchemer<'a> {
    pub fn new(
        callback: Option<&'a mut dyn FnMut(f32) -> Progress>,
        frequency: f64,
    ) -> Self {
        Self {
            callback,
            frequency: frequency.clamp(0.0, 1.0),
            last_reported: -1.0,
        }
    }

    /// Report absolute completion in [0, 1].
    pub fn update(&mut self, fraction: f64) -> Result<(), AtlasError> {
        let fraction = fraction.clamp(0.0, 1.0);
        let Some(cb) = self.callback.as_mut() else {
            return Ok(());
        };
        if fraction < 1.0 && fraction - self.last_reported < self.frequency {
            return Ok(());
        }
        self.last_reported = fraction;
        match cb(fraction as f32) {
            Progress::Continue => Ok(()),
            Progress::Cancel => Err(AtlasError::Canceled),
        }
    }
}
