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
    state::SpeedStep,
    task_manager::TaskManager,
};

/// Manual speed-cycle button service provider.
///
/// Polls the push button and advances the fan one step per press along the
/// off, low, medium, high cycle. A press only fires on the release edge, so
/// holding the button counts as one press.
///
/// # Priority and Criticality
///
/// - **Priority**: 7
/// - **Critical**: Yes (the only local control surface)
pub struct ButtonServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
}

impl ButtonServiceProvider {
    /// Creates a new button service provider.
    pub fn new(state: Arc<AppState>, event_bus: EventBus) -> Self {
        Self { state, event_bus }
    }
}

#[async_trait]
impl ServiceProvider for ButtonServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let state = self.state.clone();
        let event_bus = self.event_bus.clone();

        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| async move {
                run_button_service(state, event_bus, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "ButtonService"
    }

    fn priority(&self) -> i32 {
        7
    }

    fn is_critical(&self) -> bool {
        true
    }
}

async fn run_button_service(
    state: Arc<AppState>,
    event_bus: EventBus,
    cancel_token: CancellationToken,
) -> Result<()> {
    // Armed after a press is seen; the step fires on the release edge.
    let mut armed = false;

    loop {
        let poll = Duration::from_millis(u64::from(state.config().await.button_poll_ms));

        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Button service cancelled");
                break;
            }
            () = sleep(poll) => {
                match state.button.is_pressed().await {
                    Ok(true) => armed = true,
                    Ok(false) => {
                        if armed {
                            armed = false;
                            if let Err(e) = advance_speed(&state, &event_bus).await {
                                error!("Button step failed: {e}");
                            }
                        }
                    }
                    Err(e) => error!("Button read failed: {e}"),
                }
            }
        }
    }
    Ok(())
}

/// Advances the fan one manual step and announces the new level.
pub(crate) async fn advance_speed(
    state: &Arc<AppState>,
    event_bus: &EventBus,
) -> Result<(), ControlError> {
    let step = {
        let mut control = state.control.lock().await;
        let step = control.cycle_step();
        control.speed = step.percent();
        step
    };

    apply_speed(state.fan.as_ref(), step.percent()).await?;
    info!("Button advanced fan to {} ({}%)", step.level_name(), step.percent());

    let speech = match step {
        SpeedStep::Off => "Air purifier is turned off manually".to_string(),
        other => format!("Air purifier is set to {} manually", other.level_name()),
    };
    if let Err(e) = event_bus.publish(Event::Gadget(GadgetEvent::FanSpeed { speech })) {
        debug!("No subscriber for gadget event: {e}");
    }

    Ok(())
}
