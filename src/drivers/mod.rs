//! Hardware drivers behind the device traits.

pub mod ev3;
pub mod grove;

pub use grove::GroveChannel;
