use std::sync::Arc;

use event_listener::Event;
use zbus::{interface, object_server::SignalEmitter};

use crate::app_context::AppState;

/// The gadget-facing D-Bus interface.
///
/// Inbound directives arrive through [`dispatch`](GadgetInterface::dispatch)
/// and are queued for the dispatcher service; outbound notifications leave
/// on the `GadgetEvent` signal, emitted by the D-Bus service when it drains
/// the event bus.
pub struct GadgetInterface {
    pub state: Arc<AppState>,

    // Events
    pub stop: Arc<Event>,
    pub version: String,
}

impl GadgetInterface {
    pub fn new(state: Arc<AppState>, version: String, stop: Arc<Event>) -> Self {
        Self {
            state,
            stop,
            version,
        }
    }
}

#[interface(name = "io.github.airpurd1")]
impl GadgetInterface {
    #[zbus(signal)]
    async fn stopped(emitter: &SignalEmitter<'_>) -> zbus::Result<()>;

    #[zbus(signal)]
    pub async fn gadget_event(
        emitter: &SignalEmitter<'_>,
        name: String,
        payload: String,
    ) -> zbus::Result<()>;

    async fn stop(
        &self,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> zbus::fdo::Result<()> {
        emitter.stopped().await?;
        self.stop.notify(1);

        Ok(())
    }

    /// Queues a raw JSON directive for the dispatcher service.
    async fn dispatch(&self, payload: String) -> zbus::fdo::Result<()> {
        self.state
            .directive_tx
            .send(payload)
            .await
            .map_err(|e| zbus::fdo::Error::Failed(format!("Directive queue unavailable: {e}")))
    }

    #[zbus(property)]
    async fn version(&self) -> String {
        self.version.clone()
    }

    #[zbus(property)]
    async fn fan_speed(&self) -> i32 {
        self.state.control.lock().await.speed
    }

    #[zbus(property)]
    async fn auto_mode(&self) -> bool {
        self.state.control.lock().await.auto_mode
    }

    #[zbus(property)]
    async fn air_quality(&self) -> u16 {
        self.state.control.lock().await.last_air_quality
    }

    #[zbus(property)]
    async fn temperature(&self) -> f64 {
        self.state.control.lock().await.last_temperature
    }

    #[zbus(property)]
    async fn filter_warning(&self) -> bool {
        self.state.control.lock().await.filter_warning
    }
}
