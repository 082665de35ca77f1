// Export modules for use in tests
pub mod content;
pub mod error;
pub mod event_source;
pub mod hooks;
pub mod main_app;
pub mod overlay;
pub mod page;
pub mod panic_handler;
pub mod popup;
pub mod resolve;
pub mod settings;
pub mod template;
pub mod theme;
pub mod widget;
// Test utilities - only available when test-utils feature is enabled or during tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{FacyboxError, LoadError};
pub use hooks::{Hook, Hooks, SubscriptionId};
pub use main_app::{App, AppAction, run_app_with_event_source};
pub use popup::{CloseHandle, Facybox, FacyboxAction, PopupState};
pub use resolve::Source;
pub use settings::{Config, Settings, SettingsOverride};
