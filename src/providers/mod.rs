//! Dependency injection providers for service management.
//!
//! This module contains all providers for creating and managing system components
//! using the Dependency Injection pattern for loose coupling and testability.

pub mod app_state;
pub mod auto_control;
pub mod button;
pub mod config_watcher;
pub mod dbus;
pub mod dispatcher;
pub mod traits;

// Re-export core types for convenience
pub use app_state::AppStateProvider;
pub use auto_control::AutoControlServiceProvider;
pub use button::ButtonServiceProvider;
pub use config_watcher::ConfigWatcherServiceProvider;
pub use dbus::DBusServiceProvider;
pub use dispatcher::DispatcherServiceProvider;
pub use traits::{AsyncProvider, ServiceProvider};
