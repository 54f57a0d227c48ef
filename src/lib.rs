//! # airpurd
//!
//! A Linux daemon for an EV3/Grove air purifier with automatic pollution control.
//!
//! ## Features
//!
//! - **Async Architecture**: Built on Tokio for high performance
//! - **Event-Driven**: Modular services communicate via EventBus
//! - **Air Quality Monitoring**: Grove sensors sampled over I2C
//! - **Automatic Fan Control**: Hysteresis around the dirty-air threshold
//! - **Filter Supervision**: Colour-probe check with a one-shot warning
//! - **D-Bus Interface**: Gadget directives and spoken-feedback signals
//! - **Hot Reload**: Configuration changes without restart
//!
//! ## Architecture
//!
//! The daemon uses a provider-based dependency injection system with:
//! - [`SystemCoordinator`](coordinator::SystemCoordinator) - Main lifecycle manager
//! - [`EventBus`](event::EventBus) - Inter-service communication
//! - [`AppState`](app_context::AppState) - Shared application state
//! - Service providers for modular functionality
//!
//! ## Example
//!
//! ```no_run
//! use airpurd::{application::Application, config::ConfigManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config_manager = ConfigManager::load(None).await?;
//!     Application::builder()
//!         .with_config_manager(config_manager)
//!         .build()
//!         .await?
//!         .run()
//!         .await
//! }
//! ```

pub mod app_context;
pub mod application;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod devices;
pub mod drivers;
pub mod error;
pub mod event;
pub mod gadget;
pub mod interface;
pub mod providers;
pub mod reading;
pub mod state;
pub mod task_manager;
