//! Shared control state and its transition logic.
//!
//! [`ControlState`] is the single source of truth for fan speed, automation
//! mode, last-seen sensor values and the filter-warning latch. It is created
//! once at startup and lives behind one `tokio::sync::Mutex` in
//! [`AppState`](crate::app_context::AppState); every read-decide-write step
//! runs under a single lock acquisition, and the lock is never held across
//! sensor, actuator or event I/O.
//!
//! The transition methods themselves are pure and synchronous so they can be
//! unit-tested without any concurrency in play.

/// Air-quality index at which the air counts as dirty (hysteresis pivot).
pub const DIRTY_THRESHOLD: u16 = 300;

/// Air-quality index at which pollution counts as high.
pub const HIGH_POLLUTION_THRESHOLD: u16 = 700;

/// Speed applied automatically when the air turns dirty.
pub const AUTO_HIGH_PERCENT: i32 = 100;

/// Speed applied automatically when the air turns clean again.
pub const AUTO_LOW_PERCENT: i32 = 25;

/// Three-level pollution classification driving the indicator panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollutionBand {
    Clean,
    Moderate,
    High,
}

impl PollutionBand {
    /// Classifies an air-quality index into its indicator band.
    pub fn classify(aq: u16) -> Self {
        if aq >= HIGH_POLLUTION_THRESHOLD {
            Self::High
        } else if aq >= DIRTY_THRESHOLD {
            Self::Moderate
        } else {
            Self::Clean
        }
    }
}

/// A hysteresis crossing of the dirty threshold between two samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirQualityCrossing {
    /// Previous sample was clean, the new one is dirty.
    BecameDirty,
    /// Previous sample was dirty, the new one is clean.
    BecameClean,
}

impl AirQualityCrossing {
    /// The fan speed the automation applies for this crossing.
    pub fn target_percent(self) -> i32 {
        match self {
            Self::BecameDirty => AUTO_HIGH_PERCENT,
            Self::BecameClean => AUTO_LOW_PERCENT,
        }
    }
}

/// One step of the manual button cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedStep {
    Low,
    Medium,
    High,
    Off,
}

impl SpeedStep {
    /// Fan speed percentage for this step.
    pub fn percent(self) -> i32 {
        match self {
            Self::Off => 0,
            Self::Low => 25,
            Self::Medium => 60,
            Self::High => 100,
        }
    }

    /// Spoken level name used in the `FanSpeed` event.
    pub fn level_name(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// The mutable state shared by all control loops.
///
/// All-zero/false at startup; never reset for the process lifetime.
#[derive(Debug, Default)]
pub struct ControlState {
    /// Current fan speed percentage. The four manual steps are 0/25/60/100,
    /// but a direct speed directive may set any value.
    pub speed: i32,
    /// When true, the automation may change `speed` without confirmation.
    pub auto_mode: bool,
    /// Air-quality index committed by the last control-loop iteration.
    pub last_air_quality: u16,
    /// Temperature in °C committed by the last control-loop iteration.
    pub last_temperature: f64,
    /// Latched once a dirty-filter event has been raised; cleared as soon
    /// as the filter is observed clean.
    pub filter_warning: bool,
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares a fresh air-quality sample against the last committed one
    /// and reports a dirty-threshold crossing, if any.
    ///
    /// Does not commit the sample; call [`commit_sample`](Self::commit_sample)
    /// afterwards in the same critical section.
    pub fn observe_air_quality(&self, aq: u16) -> Option<AirQualityCrossing> {
        if self.last_air_quality < DIRTY_THRESHOLD && aq >= DIRTY_THRESHOLD {
            Some(AirQualityCrossing::BecameDirty)
        } else if self.last_air_quality > DIRTY_THRESHOLD && aq <= DIRTY_THRESHOLD {
            Some(AirQualityCrossing::BecameClean)
        } else {
            None
        }
    }

    /// The next manual step for the current speed.
    ///
    /// Total on any speed value: 0 → low, (0,60) → medium, [60,100) → high,
    /// everything else → off.
    pub fn cycle_step(&self) -> SpeedStep {
        if self.speed == 0 {
            SpeedStep::Low
        } else if self.speed < 60 {
            SpeedStep::Medium
        } else if self.speed < 100 {
            SpeedStep::High
        } else {
            SpeedStep::Off
        }
    }

    /// Feeds one filter observation into the warning latch.
    ///
    /// Returns true exactly when a new `Filter` warning must be emitted:
    /// the first dirty observation after a clean one. Repeated dirty
    /// observations stay silent until the filter is seen clean again.
    pub fn observe_filter(&mut self, clean: bool) -> bool {
        if clean {
            self.filter_warning = false;
            false
        } else if self.filter_warning {
            false
        } else {
            self.filter_warning = true;
            true
        }
    }

    /// Unconditionally commits the just-sampled values.
    pub fn commit_sample(&mut self, aq: u16, celsius: f64) {
        self.last_air_quality = aq;
        self.last_temperature = celsius;
    }
}
