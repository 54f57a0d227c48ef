use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use notify::{Event, EventHandler, RecursiveMode, Watcher, recommended_watcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    app_context::AppState,
    event::{ConfigChangeType, Event as AppEvent, EventBus},
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// Configuration file monitoring service provider.
///
/// Provides a non-critical service that watches the configuration file via
/// filesystem notifications (inotify on Linux) and publishes a classified
/// change event when the file is modified. Timing changes hot-reload; the
/// hardware section requires a restart.
///
/// # Priority and Criticality
///
/// - **Priority**: 6 (medium)
/// - **Critical**: No (optional service)
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use airpurd::providers::ConfigWatcherServiceProvider;
/// use airpurd::event::EventBus;
/// use airpurd::app_context::AppState;
///
/// # async fn example(state: Arc<AppState>) -> anyhow::Result<()> {
/// let event_bus = EventBus::new();
/// let provider = ConfigWatcherServiceProvider::new(state, event_bus);
/// // Use with TaskManager to start the service
/// # Ok(())
/// # }
/// ```
pub struct ConfigWatcherServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
}

impl ConfigWatcherServiceProvider {
    /// Creates a new configuration watcher service provider.
    pub fn new(state: Arc<AppState>, event_bus: EventBus) -> Self {
        Self { state, event_bus }
    }
}

#[async_trait]
impl ServiceProvider for ConfigWatcherServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let state = self.state.clone();
        let event_bus = self.event_bus.clone();

        task_manager
            .spawn_task(self.name().to_string(), |cancel_token| async move {
                run_config_watcher_service(state, event_bus, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "ConfigWatcherService"
    }

    fn priority(&self) -> i32 {
        6
    }

    fn is_critical(&self) -> bool {
        false
    }
}

/// Bridges the notify callback into the async loop.
#[derive(Debug)]
struct AsyncEventHandler {
    sender: mpsc::UnboundedSender<notify::Result<Event>>,
}

impl AsyncEventHandler {
    fn new(sender: mpsc::UnboundedSender<notify::Result<Event>>) -> Self {
        Self { sender }
    }
}

impl EventHandler for AsyncEventHandler {
    fn handle_event(&mut self, event: notify::Result<Event>) {
        if let Err(e) = self.sender.send(event) {
            error!("Failed to send filesystem event to async handler: {}", e);
        }
    }
}

/// Watches the config file's directory and debounces rapid edit bursts
/// before analyzing and publishing the change.
async fn run_config_watcher_service(
    state: Arc<AppState>,
    event_bus: EventBus,
    cancel_token: CancellationToken,
) -> Result<()> {
    let config_path = state.config_manager().path().to_path_buf();
    info!("Config watcher started for: {}", config_path.display());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut watcher = recommended_watcher(AsyncEventHandler::new(event_tx))?;

    // Watch the directory so atomic rename-over saves are seen too.
    let watch_path = if let Some(parent) = config_path.parent() {
        parent.to_path_buf()
    } else {
        config_path.clone()
    };

    watcher.watch(&watch_path, RecursiveMode::NonRecursive)?;
    info!("Watching directory: {}", watch_path.display());

    let mut debounce_interval = tokio::time::interval(Duration::from_millis(2000));
    debounce_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut has_pending_event = false;

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Config watcher service cancelled");
                break;
            }

            event_result = event_rx.recv() => {
                match event_result {
                    Some(Ok(event)) => {
                        let affects_config = event.paths.iter().any(|path| {
                            path == &config_path
                                || path.file_name() == config_path.file_name()
                        });
                        let is_relevant_event = event.kind.is_modify() || event.kind.is_create();

                        if affects_config && is_relevant_event {
                            debug!("Config file touched, marking for debounced reload");
                            has_pending_event = true;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Filesystem watcher error: {}", e);
                    }
                    None => {
                        warn!("Filesystem event channel closed, exiting");
                        break;
                    }
                }
            }

            _ = debounce_interval.tick(), if has_pending_event => {
                has_pending_event = false;

                if config_path.exists() {
                    info!("Configuration file change detected, analyzing changes...");

                    match state.config_manager().analyze_config_changes().await {
                        Ok(change_type) => {
                            match &change_type {
                                ConfigChangeType::HotReload => {
                                    info!("Hot-reloadable changes detected");
                                }
                                ConfigChangeType::ColdRestart { changed_sections } => {
                                    warn!(
                                        "Hardware configuration changes detected in sections: \
                                         {changed_sections:?}"
                                    );
                                    warn!("These changes require daemon restart to take effect");
                                }
                            }
                            if let Err(e) =
                                event_bus.publish(AppEvent::ConfigChangeDetected(change_type))
                            {
                                error!("Failed to publish config change event: {}", e);
                            }
                        }
                        Err(e) => {
                            error!("Failed to analyze configuration changes: {}", e);
                        }
                    }
                } else {
                    warn!("Configuration file {} no longer exists", config_path.display());
                }
            }
        }
    }

    if let Err(e) = watcher.unwatch(&watch_path) {
        warn!("Failed to unwatch path during cleanup: {}", e);
    }

    info!("Config watcher service stopped");
    Ok(())
}
