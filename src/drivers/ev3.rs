//! EV3 peripherals: fan motor, push button, filter color probe and the
//! brick's status LEDs.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use log::{debug, warn};

use ev3dev_lang_rust::Led;
use ev3dev_lang_rust::motors::{MediumMotor, MotorPort};
use ev3dev_lang_rust::sensors::{ColorSensor, TouchSensor};

use crate::devices::{ButtonInput, FanDriver, FilterColor, FilterProbe, StatusPanel};
use crate::error::ControlError;
use crate::state::PollutionBand;

/// Serializes access to a brick device handle and marks it shareable.
struct DeviceCell<T>(Mutex<T>);

// SAFETY: the sysfs device handles keep non-atomic reference counts
// internally, so the compiler cannot mark them Send/Sync. Every access goes
// through the mutex below, one task at a time, which restores the needed
// exclusivity.
unsafe impl<T> Send for DeviceCell<T> {}
unsafe impl<T> Sync for DeviceCell<T> {}

impl<T> DeviceCell<T> {
    fn new(device: T) -> Self {
        Self(Mutex::new(device))
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        // A poisoned lock only means a panicking test thread; the sysfs
        // handle itself stays usable.
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The fan attached to the medium motor on port A.
///
/// The fan blades are geared so positive airflow needs a negative duty
/// cycle; the negation lives here and nowhere else.
pub struct Ev3Fan {
    motor: DeviceCell<MediumMotor>,
}

impl fmt::Debug for Ev3Fan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ev3Fan")
    }
}

impl Ev3Fan {
    pub fn open() -> Result<Self> {
        let motor = MediumMotor::get(MotorPort::OutA)
            .map_err(|e| anyhow!("fan motor not found on port A: {e:?}"))?;
        Ok(Self {
            motor: DeviceCell::new(motor),
        })
    }
}

#[async_trait]
impl FanDriver for Ev3Fan {
    async fn drive(&self, percent: i32) -> Result<(), ControlError> {
        let motor = self.motor.lock();
        motor
            .set_duty_cycle_sp(-percent)
            .and_then(|_| motor.run_direct())
            .map_err(|e| ControlError::Actuator(format!("fan motor: {e:?}")))
    }

    async fn stop(&self) -> Result<(), ControlError> {
        self.motor
            .lock()
            .stop()
            .map_err(|e| ControlError::Actuator(format!("fan motor: {e:?}")))
    }
}

/// The touch sensor used as the manual speed-cycle button.
pub struct Ev3Button {
    sensor: DeviceCell<TouchSensor>,
}

impl fmt::Debug for Ev3Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ev3Button")
    }
}

impl Ev3Button {
    pub fn open() -> Result<Self> {
        let sensor = TouchSensor::find()
            .map_err(|e| anyhow!("touch sensor not found: {e:?}"))?;
        Ok(Self {
            sensor: DeviceCell::new(sensor),
        })
    }
}

#[async_trait]
impl ButtonInput for Ev3Button {
    async fn is_pressed(&self) -> Result<bool, ControlError> {
        self.sensor
            .lock()
            .get_pressed_state()
            .map_err(|e| ControlError::SensorRead(format!("touch sensor: {e:?}")))
    }
}

/// The color sensor aimed at the filter surface.
pub struct Ev3FilterProbe {
    sensor: DeviceCell<ColorSensor>,
}

impl fmt::Debug for Ev3FilterProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ev3FilterProbe")
    }
}

impl Ev3FilterProbe {
    pub fn open() -> Result<Self> {
        let sensor = ColorSensor::find()
            .map_err(|e| anyhow!("color sensor not found: {e:?}"))?;
        sensor
            .set_mode_col_color()
            .map_err(|e| anyhow!("color sensor mode switch failed: {e:?}"))?;
        Ok(Self {
            sensor: DeviceCell::new(sensor),
        })
    }
}

#[async_trait]
impl FilterProbe for Ev3FilterProbe {
    async fn classify(&self) -> Result<FilterColor, ControlError> {
        let code = self
            .sensor
            .lock()
            .get_color()
            .map_err(|e| ControlError::SensorRead(format!("color sensor: {e:?}")))?;
        Ok(FilterColor::from_code(code))
    }
}

/// Status LEDs on the brick, left showing pollution, right the filter.
///
/// Indication is best-effort; failures are logged and swallowed so a broken
/// LED cannot take down a control loop.
pub struct Ev3Panel {
    led: DeviceCell<Led>,
}

impl fmt::Debug for Ev3Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ev3Panel")
    }
}

impl Ev3Panel {
    pub fn open() -> Result<Self> {
        let led = Led::new().map_err(|e| anyhow!("status LEDs not available: {e:?}"))?;
        Ok(Self {
            led: DeviceCell::new(led),
        })
    }
}

#[async_trait]
impl StatusPanel for Ev3Panel {
    async fn show_pollution(&self, band: PollutionBand) {
        let color = match band {
            PollutionBand::High => Led::COLOR_RED,
            PollutionBand::Moderate => Led::COLOR_YELLOW,
            PollutionBand::Clean => Led::COLOR_GREEN,
        };
        if let Err(e) = self.led.lock().set_left_color(color) {
            warn!("Failed to set pollution LED: {e:?}");
        }
    }

    async fn show_filter(&self, clean: bool) {
        let color = if clean {
            Led::COLOR_GREEN
        } else {
            Led::COLOR_RED
        };
        if let Err(e) = self.led.lock().set_right_color(color) {
            warn!("Failed to set filter LED: {e:?}");
        }
    }

    async fn show_readings(&self, air_quality: u16, celsius: f64, filter: FilterColor) {
        debug!(
            "Sample: air quality {air_quality}, temperature {celsius:.1}°C, filter {filter:?}"
        );
    }
}

/// The full set of EV3 peripherals, opened together at startup.
pub struct Ev3Devices {
    pub fan: std::sync::Arc<Ev3Fan>,
    pub button: std::sync::Arc<Ev3Button>,
    pub filter_probe: std::sync::Arc<Ev3FilterProbe>,
    pub panel: std::sync::Arc<Ev3Panel>,
}

impl Ev3Devices {
    /// Opens every peripheral; any missing device fails startup.
    pub fn probe() -> Result<Self> {
        Ok(Self {
            fan: std::sync::Arc::new(Ev3Fan::open()?),
            button: std::sync::Arc::new(Ev3Button::open()?),
            filter_probe: std::sync::Arc::new(Ev3FilterProbe::open()?),
            panel: std::sync::Arc::new(Ev3Panel::open()?),
        })
    }
}
