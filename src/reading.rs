//! Raw sensor value conversion.
//!
//! The Grove-style sensors used here expose a 10-bit reading split over two
//! 8-bit registers; the temperature channel additionally needs a thermistor
//! resistance-to-temperature conversion. All functions are pure.

use crate::error::ControlError;

/// Thermistor B constant.
pub const THERMISTOR_B: f64 = 42500.0;

/// Thermistor reference resistance at 25 °C.
pub const THERMISTOR_R0: f64 = 100_000.0;

/// Full-scale raw reading of the 10-bit ADC.
pub const RAW_FULL_SCALE: u16 = 1023;

/// Combines a high/low register pair into one composite reading.
///
/// The sensor packs its 10-bit value as `(high << 2) + low`.
pub fn combine_registers(high: u8, low: u8) -> u16 {
    (u16::from(high) << 2) + u16::from(low)
}

/// Converts a raw temperature-channel reading to degrees Celsius.
///
/// Uses the usual B-parameter thermistor model:
/// `R = (1023/raw - 1) * R0`, `T = 1 / (ln(R/R0)/B + 1/298.15)` in Kelvin.
///
/// Fails with [`ControlError::Computation`] for `raw == 0` (division by
/// zero) and `raw >= 1023` (logarithm of a non-positive resistance).
pub fn thermistor_celsius(raw: u16) -> Result<f64, ControlError> {
    if raw == 0 || raw >= RAW_FULL_SCALE {
        return Err(ControlError::Computation(raw));
    }

    let resistance = (f64::from(RAW_FULL_SCALE) / f64::from(raw) - 1.0) * THERMISTOR_R0;
    let kelvin = 1.0 / ((resistance / THERMISTOR_R0).ln() / THERMISTOR_B + 1.0 / 298.15);
    Ok(kelvin - 273.15)
}

/// Converts degrees Celsius to degrees Fahrenheit.
///
/// Truncation to whole degrees is a formatting concern and happens at the
/// output boundary, never here.
pub fn fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}
