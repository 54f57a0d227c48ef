//! D-Bus service provider for dependency injection.

use anyhow::Result;
use async_trait::async_trait;
use log::{error, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use zbus::Connection;

use crate::{
    app_context::AppState,
    event::{Event as AppEvent, EventBus},
    interface::GadgetInterface,
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

const OBJECT_PATH: &str = "/io/github/airpurd";
const SERVICE_NAME: &str = "io.github.airpurd";

/// D-Bus service provider for the gadget channel.
///
/// Exposes the daemon on the session bus so the voice front end can submit
/// directives and observe state, and forwards gadget events from the event
/// bus as D-Bus signals.
///
/// # Priority and Criticality
///
/// - **Priority**: 8
/// - **Critical**: Yes when a session bus exists; the coordinator skips the
///   service entirely when connecting fails, leaving local control running
///
/// # Interface
///
/// - **Service Name**: `io.github.airpurd`
/// - **Object Path**: `/io/github/airpurd`
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use airpurd::providers::DBusServiceProvider;
/// use airpurd::event::EventBus;
/// use airpurd::app_context::AppState;
///
/// # async fn example(state: Arc<AppState>) -> anyhow::Result<()> {
/// let event_bus = EventBus::new();
/// // Note: This may fail if D-Bus session is not available
/// let provider = DBusServiceProvider::new(state, event_bus).await?;
/// // Use with TaskManager to start the service
/// # Ok(())
/// # }
/// ```
pub struct DBusServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
    connection: Connection,
}

impl DBusServiceProvider {
    /// Creates a new D-Bus service provider with session bus connection.
    pub async fn new(state: Arc<AppState>, event_bus: EventBus) -> Result<Self> {
        let connection = Connection::session().await?;
        Ok(Self {
            state,
            event_bus,
            connection,
        })
    }
}

#[async_trait]
impl ServiceProvider for DBusServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let state = self.state.clone();
        let event_bus = self.event_bus.clone();
        let connection = self.connection.clone();

        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| async move {
                run_dbus_service(state, event_bus, connection, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "DBusService"
    }

    fn priority(&self) -> i32 {
        8
    }

    fn is_critical(&self) -> bool {
        true
    }
}

/// Serves the gadget interface and pumps gadget events out as signals.
async fn run_dbus_service(
    state: Arc<AppState>,
    event_bus: EventBus,
    connection: Connection,
    cancel_token: CancellationToken,
) -> Result<()> {
    let stop = Arc::new(event_listener::Event::new());
    let interface = GadgetInterface::new(
        state,
        env!("CARGO_PKG_VERSION").to_string(),
        stop.clone(),
    );
    connection.object_server().at(OBJECT_PATH, interface).await?;
    connection.request_name(SERVICE_NAME).await?;

    let iface_ref = connection
        .object_server()
        .interface::<_, GadgetInterface>(OBJECT_PATH)
        .await?;

    let mut events = event_bus.subscribe();

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("D-Bus service cancelled");
                break;
            }
            () = stop.listen() => {
                info!("Stop requested over D-Bus");
                if let Err(e) = event_bus.publish(AppEvent::SystemShutdown) {
                    error!("Failed to publish shutdown event: {e}");
                }
            }
            event = events.recv() => {
                match event {
                    Ok(AppEvent::Gadget(gadget_event)) => {
                        let emit = GadgetInterface::gadget_event(
                            iface_ref.signal_emitter(),
                            gadget_event.name().to_string(),
                            gadget_event.payload().to_string(),
                        )
                        .await;
                        if let Err(e) = emit {
                            error!("Failed to emit gadget event signal: {e}");
                        }
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("D-Bus service lagged, skipped {skipped} events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        warn!("Event bus closed, exiting");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
