use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{
    app_context::AppState,
    devices::apply_speed,
    error::ControlError,
    event::{Event, EventBus},
    gadget::{Directive, GadgetEvent},
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// Directive dispatcher service provider.
///
/// Drains the inbound directive queue fed by the D-Bus interface, parses
/// each JSON payload and applies it to the shared state. Directives with an
/// unknown type are dropped silently; malformed payloads are logged and the
/// loop keeps running.
///
/// # Priority and Criticality
///
/// - **Priority**: 9
/// - **Critical**: Yes (the remote control surface)
pub struct DispatcherServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
}

impl DispatcherServiceProvider {
    /// Creates a new dispatcher service provider.
    pub fn new(state: Arc<AppState>, event_bus: EventBus) -> Self {
        Self { state, event_bus }
    }
}

#[async_trait]
impl ServiceProvider for DispatcherServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let state = self.state.clone();
        let event_bus = self.event_bus.clone();

        let receiver = state
            .directive_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow::anyhow!("Directive queue already claimed"))?;

        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| async move {
                run_dispatcher_service(state, event_bus, receiver, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "DispatcherService"
    }

    fn priority(&self) -> i32 {
        9
    }

    fn is_critical(&self) -> bool {
        true
    }
}

async fn run_dispatcher_service(
    state: Arc<AppState>,
    event_bus: EventBus,
    mut receiver: tokio::sync::mpsc::Receiver<String>,
    cancel_token: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Dispatcher service cancelled");
                break;
            }
            payload = receiver.recv() => {
                match payload {
                    Some(payload) => {
                        if let Err(e) = dispatch(&state, &event_bus, &payload).await {
                            error!("Directive rejected: {e}");
                        }
                    }
                    None => {
                        warn!("Directive queue closed, exiting");
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Parses and applies one directive payload.
pub(crate) async fn dispatch(
    state: &Arc<AppState>,
    event_bus: &EventBus,
    payload: &str,
) -> Result<(), ControlError> {
    match Directive::parse(payload)? {
        Directive::Unknown => {
            debug!("Ignoring directive of unknown type");
            Ok(())
        }
        Directive::AirQuality => report_air_quality(state, event_bus).await,
        Directive::Temperature { unit } => report_temperature(state, event_bus, &unit).await,
        Directive::Speed { speed } => set_speed(state, speed).await,
        Directive::Auto { command } => {
            // Anything but "on" disables automation.
            let enabled = command == "on";
            state.control.lock().await.auto_mode = enabled;
            info!("Automation mode {}", if enabled { "enabled" } else { "disabled" });
            Ok(())
        }
    }
}

async fn report_air_quality(
    state: &Arc<AppState>,
    event_bus: &EventBus,
) -> Result<(), ControlError> {
    let (air_quality, auto_mode) = {
        let control = state.control.lock().await;
        (control.last_air_quality, control.auto_mode)
    };

    let event = if air_quality > 700 {
        if auto_mode {
            GadgetEvent::AirQuality {
                request: 0,
                speech: "We are currently experiencing high pollution, air filter is set to \
                         high automatically"
                    .to_string(),
            }
        } else {
            GadgetEvent::AirQuality {
                request: 1,
                speech: "We are currently experiencing high pollution, would you like to set \
                         the air purifier to high mode?"
                    .to_string(),
            }
        }
    } else if air_quality > 300 {
        if auto_mode {
            GadgetEvent::AirQuality {
                request: 0,
                speech: "We are currently experiencing moderate pollution, air filter is set \
                         to high automatically"
                    .to_string(),
            }
        } else {
            GadgetEvent::AirQuality {
                request: 1,
                speech: "We are currently experiencing moderate pollution, would you like to \
                         set the air purifier to high mode?"
                    .to_string(),
            }
        }
    } else {
        GadgetEvent::AirQuality {
            request: 0,
            speech: "The air quality is fresh and clean.".to_string(),
        }
    };

    publish_gadget(event_bus, event);
    Ok(())
}

async fn report_temperature(
    state: &Arc<AppState>,
    event_bus: &EventBus,
    unit: &str,
) -> Result<(), ControlError> {
    let celsius = state.control.lock().await.last_temperature;

    // Truncation toward zero happens exactly once, at formatting.
    let speech = if unit.eq_ignore_ascii_case("fahrenheit") {
        let fahrenheit = crate::reading::fahrenheit(celsius);
        format!(
            "The temperature in the room is {} degrees fahrenheit",
            fahrenheit as i64
        )
    } else {
        format!(
            "The temperature in the room is {} degrees celsius",
            celsius as i64
        )
    };

    publish_gadget(event_bus, GadgetEvent::Temperature { speech });
    Ok(())
}

async fn set_speed(state: &Arc<AppState>, speed: i32) -> Result<(), ControlError> {
    state.control.lock().await.speed = speed;
    apply_speed(state.fan.as_ref(), speed).await?;
    info!("Fan speed set to {speed}% by directive");
    Ok(())
}

fn publish_gadget(event_bus: &EventBus, event: GadgetEvent) {
    if let Err(e) = event_bus.publish(Event::Gadget(event)) {
        debug!("No subscriber for gadget event: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_context::testing::harness;
    use crate::devices::FilterColor;
    use crate::devices::testing::FanCommand;
    use pretty_assertions::assert_eq;
    use tokio::time::{Duration, timeout};

    async fn next_gadget(receiver: &mut tokio::sync::broadcast::Receiver<Event>) -> GadgetEvent {
        match timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("expected a gadget event")
            .unwrap()
        {
            Event::Gadget(ev) => ev,
            other => panic!("Expected Gadget event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dispatcher_provider_metadata() {
        let h = harness(100, 512, FilterColor::White);
        let provider = DispatcherServiceProvider::new(h.state.clone(), EventBus::new());
        assert_eq!(provider.name(), "DispatcherService");
        assert_eq!(provider.priority(), 9);
        assert!(provider.is_critical());
    }

    #[tokio::test]
    async fn speed_directive_sets_state_and_drives_fan() {
        let h = harness(100, 512, FilterColor::White);
        let event_bus = EventBus::new();

        dispatch(&h.state, &event_bus, r#"{"type": "speed", "speed": 60}"#)
            .await
            .unwrap();

        assert_eq!(h.state.control.lock().await.speed, 60);
        assert_eq!(h.fan.commands(), vec![FanCommand::Drive(60)]);
    }

    #[tokio::test]
    async fn zero_speed_directive_releases_the_motor() {
        let h = harness(100, 512, FilterColor::White);
        let event_bus = EventBus::new();

        dispatch(&h.state, &event_bus, r#"{"type": "speed", "speed": 0}"#)
            .await
            .unwrap();

        assert_eq!(
            h.fan.commands(),
            vec![FanCommand::Drive(0), FanCommand::Stop]
        );
    }

    #[tokio::test]
    async fn auto_directive_toggles_automation() {
        let h = harness(100, 512, FilterColor::White);
        let event_bus = EventBus::new();

        dispatch(&h.state, &event_bus, r#"{"type": "auto", "command": "on"}"#)
            .await
            .unwrap();
        assert!(h.state.control.lock().await.auto_mode);

        dispatch(&h.state, &event_bus, r#"{"type": "auto", "command": "off"}"#)
            .await
            .unwrap();
        assert!(!h.state.control.lock().await.auto_mode);

        // Any unrecognized command disables rather than erroring.
        dispatch(&h.state, &event_bus, r#"{"type": "auto", "command": "ON"}"#)
            .await
            .unwrap();
        assert!(!h.state.control.lock().await.auto_mode);
    }

    #[tokio::test]
    async fn airquality_report_reflects_band_and_mode() {
        let h = harness(100, 512, FilterColor::White);
        let event_bus = EventBus::new();
        let mut receiver = event_bus.subscribe();

        // High pollution, manual mode: confirmation request.
        {
            let mut control = h.state.control.lock().await;
            control.last_air_quality = 750;
            control.auto_mode = false;
        }
        dispatch(&h.state, &event_bus, r#"{"type": "airquality"}"#)
            .await
            .unwrap();
        match next_gadget(&mut receiver).await {
            GadgetEvent::AirQuality { request, speech } => {
                assert_eq!(request, 1);
                assert!(speech.contains("high pollution"));
            }
            other => panic!("Expected AirQuality, got {other:?}"),
        }

        // High pollution, auto mode: informational, purifier already acting.
        {
            let mut control = h.state.control.lock().await;
            control.last_air_quality = 800;
            control.auto_mode = true;
        }
        dispatch(&h.state, &event_bus, r#"{"type": "airquality"}"#)
            .await
            .unwrap();
        match next_gadget(&mut receiver).await {
            GadgetEvent::AirQuality { request, speech } => {
                assert_eq!(request, 0);
                assert!(speech.contains("high pollution"));
                assert!(speech.contains("automatically"));
            }
            other => panic!("Expected AirQuality, got {other:?}"),
        }

        // Moderate pollution, auto mode: informational.
        {
            let mut control = h.state.control.lock().await;
            control.last_air_quality = 400;
            control.auto_mode = true;
        }
        dispatch(&h.state, &event_bus, r#"{"type": "airquality"}"#)
            .await
            .unwrap();
        match next_gadget(&mut receiver).await {
            GadgetEvent::AirQuality { request, speech } => {
                assert_eq!(request, 0);
                assert!(speech.contains("moderate pollution"));
            }
            other => panic!("Expected AirQuality, got {other:?}"),
        }

        // Clean air.
        h.state.control.lock().await.last_air_quality = 120;
        dispatch(&h.state, &event_bus, r#"{"type": "airquality"}"#)
            .await
            .unwrap();
        match next_gadget(&mut receiver).await {
            GadgetEvent::AirQuality { request, speech } => {
                assert_eq!(request, 0);
                assert_eq!(speech, "The air quality is fresh and clean.");
            }
            other => panic!("Expected AirQuality, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn boundary_700_counts_as_moderate() {
        let h = harness(100, 512, FilterColor::White);
        let event_bus = EventBus::new();
        let mut receiver = event_bus.subscribe();

        h.state.control.lock().await.last_air_quality = 700;
        dispatch(&h.state, &event_bus, r#"{"type": "airquality"}"#)
            .await
            .unwrap();
        match next_gadget(&mut receiver).await {
            GadgetEvent::AirQuality { speech, .. } => {
                assert!(speech.contains("moderate pollution"));
            }
            other => panic!("Expected AirQuality, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn temperature_report_truncates_once() {
        let h = harness(100, 512, FilterColor::White);
        let event_bus = EventBus::new();
        let mut receiver = event_bus.subscribe();

        h.state.control.lock().await.last_temperature = 25.9;

        dispatch(&h.state, &event_bus, r#"{"type": "temperature", "unit": "celsius"}"#)
            .await
            .unwrap();
        match next_gadget(&mut receiver).await {
            GadgetEvent::Temperature { speech } => {
                assert_eq!(speech, "The temperature in the room is 25 degrees celsius");
            }
            other => panic!("Expected Temperature, got {other:?}"),
        }

        // 25.9°C is 78.62°F; truncation happens after the conversion.
        dispatch(
            &h.state,
            &event_bus,
            r#"{"type": "temperature", "unit": "Fahrenheit"}"#,
        )
        .await
        .unwrap();
        match next_gadget(&mut receiver).await {
            GadgetEvent::Temperature { speech } => {
                assert_eq!(
                    speech,
                    "The temperature in the room is 78 degrees fahrenheit"
                );
            }
            other => panic!("Expected Temperature, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_directive_is_silently_ignored() {
        let h = harness(100, 512, FilterColor::White);
        let event_bus = EventBus::new();
        let mut receiver = event_bus.subscribe();

        dispatch(&h.state, &event_bus, r#"{"type": "discomode"}"#)
            .await
            .unwrap();

        assert!(
            timeout(Duration::from_millis(50), receiver.recv())
                .await
                .is_err()
        );
        assert!(h.fan.commands().is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected_without_touching_state() {
        let h = harness(100, 512, FilterColor::White);
        let event_bus = EventBus::new();

        h.state.control.lock().await.speed = 60;

        let err = dispatch(&h.state, &event_bus, "{broken").await.unwrap_err();
        assert!(matches!(err, ControlError::MalformedDirective(_)));

        // A speed directive missing its field must fail before any mutation.
        let err = dispatch(&h.state, &event_bus, r#"{"type": "speed"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::MalformedDirective(_)));

        assert_eq!(h.state.control.lock().await.speed, 60);
        assert!(h.fan.commands().is_empty());
    }

    #[tokio::test]
    async fn dispatcher_service_drains_the_queue() {
        let h = harness(100, 512, FilterColor::White);
        let event_bus = EventBus::new();
        let mut task_manager = TaskManager::new();

        let provider = DispatcherServiceProvider::new(h.state.clone(), event_bus);
        provider.start(&mut task_manager).await.unwrap();

        h.state
            .directive_tx
            .send(r#"{"type": "speed", "speed": 25}"#.to_string())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.state.control.lock().await.speed, 25);

        task_manager.shutdown_all().await.unwrap();
    }

    #[tokio::test]
    async fn queue_can_only_be_claimed_once() {
        let h = harness(100, 512, FilterColor::White);
        let event_bus = EventBus::new();
        let mut task_manager = TaskManager::new();

        let first = DispatcherServiceProvider::new(h.state.clone(), event_bus.clone());
        first.start(&mut task_manager).await.unwrap();

        let second = DispatcherServiceProvider::new(h.state.clone(), event_bus);
        assert!(second.start(&mut task_manager).await.is_err());

        task_manager.shutdown_all().await.unwrap();
    }
}
