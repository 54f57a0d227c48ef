//! Application state and global context management.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::{
    config::{Config, ConfigManager},
    devices::{ButtonInput, FanDriver, FilterProbe, RegisterPairChannel, StatusPanel},
    drivers::{self, GroveChannel},
    state::ControlState,
};

/// Capacity of the inbound directive queue between the D-Bus interface
/// and the dispatcher loop.
const DIRECTIVE_QUEUE_DEPTH: usize = 32;

/// Shared application state containing all runtime data.
///
/// This structure holds everything the services share, with the mutable
/// control fields behind a single mutex. Each control decision runs as one
/// read-decide-write step under one lock acquisition, and the lock is
/// released before any device or event I/O.
pub struct AppState {
    /// Configuration manager for centralized config handling
    pub config_manager: Arc<ConfigManager>,
    /// Fan speed, automation mode, last readings and the filter latch
    pub control: Mutex<ControlState>,
    /// ADC channel of the air-quality sensor
    pub air_channel: Arc<dyn RegisterPairChannel>,
    /// ADC channel of the thermistor
    pub temp_channel: Arc<dyn RegisterPairChannel>,
    /// Color probe watching the filter surface
    pub filter_probe: Arc<dyn FilterProbe>,
    /// Manual speed-cycle button
    pub button: Arc<dyn ButtonInput>,
    /// Fan actuator
    pub fan: Arc<dyn FanDriver>,
    /// Status indicators
    pub panel: Arc<dyn StatusPanel>,
    /// Queue feeding raw directive payloads to the dispatcher loop
    pub directive_tx: mpsc::Sender<String>,
    /// Receiving end, taken exactly once by the dispatcher service
    pub directive_rx: Mutex<Option<mpsc::Receiver<String>>>,
}

impl AppState {
    /// Opens the real devices described by the configuration and wires
    /// them into a fresh state.
    pub async fn probe(config_manager: ConfigManager) -> anyhow::Result<Self> {
        let config = config_manager.clone_config().await;

        let air_channel = Arc::new(GroveChannel::open(
            &config.hardware.air_bus,
            config.hardware.sensor_address,
        )?);
        let temp_channel = Arc::new(GroveChannel::open(
            &config.hardware.temperature_bus,
            config.hardware.sensor_address,
        )?);

        let devices = drivers::ev3::Ev3Devices::probe()?;

        Ok(Self::with_devices(
            config_manager,
            air_channel,
            temp_channel,
            devices.filter_probe,
            devices.button,
            devices.fan,
            devices.panel,
        ))
    }

    /// Builds a state around explicit device implementations.
    ///
    /// Production goes through [`probe`](Self::probe); tests pass mocks here.
    pub fn with_devices(
        config_manager: ConfigManager,
        air_channel: Arc<dyn RegisterPairChannel>,
        temp_channel: Arc<dyn RegisterPairChannel>,
        filter_probe: Arc<dyn FilterProbe>,
        button: Arc<dyn ButtonInput>,
        fan: Arc<dyn FanDriver>,
        panel: Arc<dyn StatusPanel>,
    ) -> Self {
        let (directive_tx, directive_rx) = mpsc::channel(DIRECTIVE_QUEUE_DEPTH);

        Self {
            config_manager: Arc::new(config_manager),
            control: Mutex::new(ControlState::new()),
            air_channel,
            temp_channel,
            filter_probe,
            button,
            fan,
            panel,
            directive_tx,
            directive_rx: Mutex::new(Some(directive_rx)),
        }
    }

    /// Gets a read-only reference to the current configuration.
    pub async fn config(&self) -> tokio::sync::RwLockReadGuard<'_, Config> {
        self.config_manager.get().await
    }

    /// Gets the configuration manager.
    pub fn config_manager(&self) -> &Arc<ConfigManager> {
        &self.config_manager
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::AppState;
    use crate::config::{Config, ConfigManager};
    use crate::devices::testing::{MockButton, MockChannel, MockFilter, NullPanel, RecordingFan};
    use crate::devices::FilterColor;

    /// The mock devices a test keeps handles to, next to the built state.
    pub struct TestHarness {
        pub state: Arc<AppState>,
        pub air: Arc<MockChannel>,
        pub temp: Arc<MockChannel>,
        pub filter: Arc<MockFilter>,
        pub button: Arc<MockButton>,
        pub fan: Arc<RecordingFan>,
    }

    /// Builds an [`AppState`] over mock devices with the given constant
    /// raw readings and filter color.
    pub fn harness(air_raw: u16, temp_raw: u16, filter: FilterColor) -> TestHarness {
        let air = Arc::new(MockChannel::constant(air_raw));
        let temp = Arc::new(MockChannel::constant(temp_raw));
        let filter = Arc::new(MockFilter::new(filter));
        let button = Arc::new(MockButton::default());
        let fan = Arc::new(RecordingFan::default());

        let config_manager =
            ConfigManager::new(Config::default(), PathBuf::from("/dev/null"));

        let state = Arc::new(AppState::with_devices(
            config_manager,
            air.clone(),
            temp.clone(),
            filter.clone(),
            button.clone(),
            fan.clone(),
            Arc::new(NullPanel),
        ));

        TestHarness {
            state,
            air,
            temp,
            filter,
            button,
            fan,
        }
    }
}
