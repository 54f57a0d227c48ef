//! Device abstractions the control loops run against.
//!
//! The loops never talk to hardware directly; they go through these traits
//! so each loop can be exercised in unit tests with the mock implementations
//! in [`testing`]. The real implementations live in [`crate::drivers`].

use async_trait::async_trait;

use crate::error::ControlError;
use crate::state::PollutionBand;

/// A sensor exposing its reading as a high/low register pair.
#[async_trait]
pub trait RegisterPairChannel: Send + Sync + std::fmt::Debug {
    /// Reads the (high, low) register pair for one sample.
    async fn read_pair(&self) -> Result<(u8, u8), ControlError>;
}

/// A momentary push button.
#[async_trait]
pub trait ButtonInput: Send + Sync + std::fmt::Debug {
    async fn is_pressed(&self) -> Result<bool, ControlError>;
}

/// Color read off the filter surface by the filter probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterColor {
    None,
    Black,
    Blue,
    Green,
    Yellow,
    Red,
    White,
    Brown,
}

impl FilterColor {
    /// Maps the sensor's numeric color code. Out-of-range codes read as
    /// `None`, which counts as dirty.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Black,
            2 => Self::Blue,
            3 => Self::Green,
            4 => Self::Yellow,
            5 => Self::Red,
            6 => Self::White,
            7 => Self::Brown,
            _ => Self::None,
        }
    }

    /// A fresh filter reads white; a lightly used one reads yellow. Both
    /// count as clean, every other color is a dirty filter.
    pub fn is_clean(self) -> bool {
        matches!(self, Self::White | Self::Yellow)
    }
}

/// The probe watching the filter's surface color.
#[async_trait]
pub trait FilterProbe: Send + Sync + std::fmt::Debug {
    async fn classify(&self) -> Result<FilterColor, ControlError>;
}

/// The fan actuator.
#[async_trait]
pub trait FanDriver: Send + Sync + std::fmt::Debug {
    /// Drives the fan at the given percentage (0..=100).
    async fn drive(&self, percent: i32) -> Result<(), ControlError>;
    /// Releases the motor entirely.
    async fn stop(&self) -> Result<(), ControlError>;
}

/// The status indicators (LEDs on the real device).
///
/// Indication is best-effort: implementations log failures internally and
/// never propagate them, so a broken LED cannot take down a control loop.
#[async_trait]
pub trait StatusPanel: Send + Sync + std::fmt::Debug {
    /// Shows the current pollution band.
    async fn show_pollution(&self, band: PollutionBand);
    /// Shows whether the filter is clean.
    async fn show_filter(&self, clean: bool);
    /// Logs the full sample for diagnostics.
    async fn show_readings(&self, air_quality: u16, celsius: f64, filter: FilterColor);
}

/// Applies a speed to the fan, with the off case handled the way the
/// hardware needs it: speed 0 first drives the duty cycle to zero, then
/// releases the motor, so a later restart does not jolt from a stale
/// duty-cycle setpoint.
pub async fn apply_speed(fan: &dyn FanDriver, percent: i32) -> Result<(), ControlError> {
    if percent == 0 {
        fan.drive(0).await?;
        fan.stop().await
    } else {
        fan.drive(percent).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    /// A channel replaying a scripted sequence of register pairs, then
    /// repeating the last one forever.
    #[derive(Debug)]
    pub struct MockChannel {
        samples: Mutex<Vec<(u8, u8)>>,
        fail: AtomicBool,
    }

    impl MockChannel {
        pub fn new(samples: Vec<(u8, u8)>) -> Self {
            let mut samples = samples;
            samples.reverse();
            Self {
                samples: Mutex::new(samples),
                fail: AtomicBool::new(false),
            }
        }

        /// A channel whose every read yields the same raw value.
        pub fn constant(raw: u16) -> Self {
            Self::new(vec![split_raw(raw)])
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    /// Splits a 10-bit raw value into the (high, low) register encoding.
    pub fn split_raw(raw: u16) -> (u8, u8) {
        ((raw >> 2) as u8, (raw & 0b11) as u8)
    }

    #[async_trait]
    impl RegisterPairChannel for MockChannel {
        async fn read_pair(&self) -> Result<(u8, u8), ControlError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ControlError::SensorRead("mock channel failure".into()));
            }
            let mut samples = self.samples.lock().unwrap();
            if samples.len() > 1 {
                Ok(samples.pop().unwrap())
            } else {
                Ok(*samples.last().expect("MockChannel needs at least one sample"))
            }
        }
    }

    /// A button whose pressed state the test flips directly.
    #[derive(Debug, Default)]
    pub struct MockButton {
        pressed: AtomicBool,
    }

    impl MockButton {
        pub fn set_pressed(&self, pressed: bool) {
            self.pressed.store(pressed, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ButtonInput for MockButton {
        async fn is_pressed(&self) -> Result<bool, ControlError> {
            Ok(self.pressed.load(Ordering::SeqCst))
        }
    }

    /// A filter probe returning a fixed color.
    #[derive(Debug)]
    pub struct MockFilter {
        color: Mutex<FilterColor>,
    }

    impl MockFilter {
        pub fn new(color: FilterColor) -> Self {
            Self {
                color: Mutex::new(color),
            }
        }

        pub fn set_color(&self, color: FilterColor) {
            *self.color.lock().unwrap() = color;
        }
    }

    #[async_trait]
    impl FilterProbe for MockFilter {
        async fn classify(&self) -> Result<FilterColor, ControlError> {
            Ok(*self.color.lock().unwrap())
        }
    }

    /// A fan that records every command it receives.
    #[derive(Debug, Default)]
    pub struct RecordingFan {
        pub commands: Mutex<Vec<FanCommand>>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FanCommand {
        Drive(i32),
        Stop,
    }

    impl RecordingFan {
        pub fn commands(&self) -> Vec<FanCommand> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FanDriver for RecordingFan {
        async fn drive(&self, percent: i32) -> Result<(), ControlError> {
            self.commands.lock().unwrap().push(FanCommand::Drive(percent));
            Ok(())
        }

        async fn stop(&self) -> Result<(), ControlError> {
            self.commands.lock().unwrap().push(FanCommand::Stop);
            Ok(())
        }
    }

    /// A panel that swallows everything.
    #[derive(Debug, Default)]
    pub struct NullPanel;

    #[async_trait]
    impl StatusPanel for NullPanel {
        async fn show_pollution(&self, _band: PollutionBand) {}
        async fn show_filter(&self, _clean: bool) {}
        async fn show_readings(&self, _air_quality: u16, _celsius: f64, _filter: FilterColor) {}
    }
}
