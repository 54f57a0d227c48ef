//! Error taxonomy for the control core.
//!
//! Nothing here is fatal: every service loop catches these, logs them and
//! carries on. Anything outside the control core uses `anyhow` directly.

use thiserror::Error;

/// Errors raised inside the control core.
#[derive(Debug, Error)]
pub enum ControlError {
    /// A sensor or bus access failed. The current iteration is skipped.
    #[error("sensor read failed: {0}")]
    SensorRead(String),

    /// The thermistor conversion was handed a degenerate raw reading
    /// (0 or full scale), for which the model is undefined.
    #[error("degenerate raw reading {0}, thermistor conversion undefined")]
    Computation(u16),

    /// An inbound directive was missing required fields or carried
    /// values of the wrong shape. The directive is dropped, state is
    /// left untouched.
    #[error("malformed directive: {0}")]
    MalformedDirective(String),

    /// The actuator rejected a command.
    #[error("actuator command failed: {0}")]
    Actuator(String),
}
