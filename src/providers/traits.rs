use anyhow::Result;
use async_trait::async_trait;

use crate::task_manager::TaskManager;

/// Provider that constructs a component asynchronously.
///
/// Used for pieces whose construction touches hardware or the filesystem,
/// such as the shared application state.
#[async_trait]
pub trait AsyncProvider<T> {
    async fn provide(&self) -> Result<T>;
}

/// A long-running service that can be started through the [`TaskManager`].
///
/// Services declare a startup priority and whether the daemon can keep
/// running without them; the coordinator starts them in priority order and
/// only tolerates failures of non-critical ones.
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    /// Spawns the service task.
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()>;

    /// Service name for logging and task management.
    fn name(&self) -> &'static str;

    /// Startup priority (higher numbers start first).
    fn priority(&self) -> i32 {
        0
    }

    /// Whether a startup failure should abort the daemon.
    fn is_critical(&self) -> bool {
        false
    }
}
