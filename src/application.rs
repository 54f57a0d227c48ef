//! Daemon entry point wiring the config manager into the coordinator.

use anyhow::Result;
use log::info;

use crate::{config::ConfigManager, coordinator::SystemCoordinator};

/// Top-level daemon lifecycle: initialize devices and services, then run
/// the coordinator's event loop until shutdown.
///
/// ```no_run
/// use airpurd::{application::Application, config::ConfigManager};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config_manager = ConfigManager::load(None).await?;
/// Application::builder()
///     .with_config_manager(config_manager)
///     .build()
///     .await?
///     .run()
///     .await
/// # }
/// ```
pub struct Application {
    pub coordinator: SystemCoordinator,
    config_manager: ConfigManager,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application").finish_non_exhaustive()
    }
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder {
            config_manager: None,
        }
    }

    /// Runs the daemon to completion: probe hardware, start services in
    /// priority order, then serve events until shutdown is requested.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "airpurd {} starting with config {}",
            env!("CARGO_PKG_VERSION"),
            self.config_manager.path().display()
        );

        self.coordinator
            .initialize(self.config_manager.clone())
            .await?;

        self.coordinator.start_all_services().await?;

        self.coordinator.run_main_loop().await?;

        info!("airpurd stopped");
        Ok(())
    }
}

pub struct ApplicationBuilder {
    config_manager: Option<ConfigManager>,
}

impl ApplicationBuilder {
    pub fn with_config_manager(mut self, config_manager: ConfigManager) -> Self {
        self.config_manager = Some(config_manager);
        self
    }

    pub async fn build(self) -> Result<Application> {
        let config_manager = self
            .config_manager
            .ok_or_else(|| anyhow::anyhow!("Configuration manager is required"))?;

        Ok(Application {
            coordinator: SystemCoordinator::new(),
            config_manager,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builder_requires_a_config_manager() {
        let result = Application::builder().build().await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Configuration manager is required")
        );
    }

    #[tokio::test]
    async fn builder_assembles_an_application() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "version: 1\n").unwrap();

        let config_manager = ConfigManager::load(Some(path)).await.unwrap();
        let app = Application::builder()
            .with_config_manager(config_manager)
            .build()
            .await
            .unwrap();
        assert!(app.coordinator.running_services().is_empty());
    }
}
