use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    app_context::AppState,
    devices::apply_speed,
    error::ControlError,
    event::{Event, EventBus},
    gadget::GadgetEvent,
    providers::traits::ServiceProvider,
    reading,
    state::PollutionBand,
    task_manager::TaskManager,
};

/// Automatic air-quality control service provider.
///
/// Provides the critical service that samples both sensors and the filter
/// probe every tick, keeps the indicators current, and reacts to the air
/// turning dirty or clean by adjusting the fan when automation is on.
///
/// # Priority and Criticality
///
/// - **Priority**: 10 (highest)
/// - **Critical**: Yes (the purifier does nothing without it)
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use airpurd::providers::AutoControlServiceProvider;
/// use airpurd::event::EventBus;
/// use airpurd::app_context::AppState;
///
/// # async fn example(state: Arc<AppState>) -> anyhow::Result<()> {
/// let event_bus = EventBus::new();
/// let provider = AutoControlServiceProvider::new(state, event_bus);
/// // Use with TaskManager to start the service
/// # Ok(())
/// # }
/// ```
pub struct AutoControlServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
}

impl AutoControlServiceProvider {
    /// Creates a new automatic control service provider.
    pub fn new(state: Arc<AppState>, event_bus: EventBus) -> Self {
        Self { state, event_bus }
    }
}

#[async_trait]
impl ServiceProvider for AutoControlServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let state = self.state.clone();
        let event_bus = self.event_bus.clone();

        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| async move {
                run_auto_control_service(state, event_bus, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "AutoControlService"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn is_critical(&self) -> bool {
        true
    }
}

async fn run_auto_control_service(
    state: Arc<AppState>,
    event_bus: EventBus,
    cancel_token: CancellationToken,
) -> Result<()> {
    loop {
        // Re-read each iteration so a hot reload takes effect on the next tick.
        let tick = Duration::from_secs(u64::from(state.config().await.tick_seconds));

        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Auto control service cancelled");
                break;
            }
            () = sleep(tick) => {
                if let Err(e) = sample_and_control(&state, &event_bus).await {
                    error!("Control iteration failed: {e}");
                }
            }
        }
    }
    Ok(())
}

/// One control iteration: sample, indicate, decide, actuate.
///
/// The decision runs as a single read-decide-write step under one lock
/// acquisition; the fan and the event bus are only touched after the lock
/// is released. A failed iteration changes neither the committed readings
/// nor the fan.
pub(crate) async fn sample_and_control(
    state: &Arc<AppState>,
    event_bus: &EventBus,
) -> Result<(), ControlError> {
    let (air_high, air_low) = state.air_channel.read_pair().await?;
    let (temp_high, temp_low) = state.temp_channel.read_pair().await?;
    let filter = state.filter_probe.classify().await?;

    let air_quality = reading::combine_registers(air_high, air_low);
    let celsius = reading::thermistor_celsius(reading::combine_registers(temp_high, temp_low))?;
    let filter_clean = filter.is_clean();

    state.panel.show_readings(air_quality, celsius, filter).await;
    state
        .panel
        .show_pollution(PollutionBand::classify(air_quality))
        .await;
    state.panel.show_filter(filter_clean).await;

    let (crossing, filter_event) = {
        let mut control = state.control.lock().await;

        // Auto mode gates the whole hysteresis reaction, not just the fan.
        let crossing = if control.auto_mode {
            control.observe_air_quality(air_quality)
        } else {
            None
        };
        let filter_event = control.observe_filter(filter_clean);
        control.commit_sample(air_quality, celsius);

        if let Some(crossing) = crossing {
            control.speed = crossing.target_percent();
        }

        (crossing, filter_event)
    };

    if let Some(crossing) = crossing {
        let target = crossing.target_percent();
        apply_speed(state.fan.as_ref(), target).await?;
        info!("Air quality crossed threshold, fan set to {target}%");

        let speech = match crossing {
            crate::state::AirQualityCrossing::BecameDirty => {
                "Pollution detected, auto setting fan speed to high"
            }
            crate::state::AirQualityCrossing::BecameClean => {
                "Air is clean now, auto setting fan speed to low"
            }
        };
        publish_gadget(
            event_bus,
            GadgetEvent::FanSpeed {
                speech: speech.to_string(),
            },
        );
    }

    if filter_event {
        info!("Filter observed dirty, raising warning");
        publish_gadget(
            event_bus,
            GadgetEvent::Filter {
                speech: "The filter seems dirty, please check it and see if it needs to be \
                         replaced"
                    .to_string(),
            },
        );
    }

    Ok(())
}

/// Forwards a gadget event, tolerating the no-subscriber case.
fn publish_gadget(event_bus: &EventBus, event: GadgetEvent) {
    if let Err(e) = event_bus.publish(Event::Gadget(event)) {
        debug!("No subscriber for gadget event: {e}");
    }
}
