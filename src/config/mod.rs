//! Runtime Configuration Module
//!
//! Flat typed options with defaults, loaded from an optional TOML file and
//! overridden per-key by environment variables.
//!
//! ## Loading Order
//!
//! 1. `RELIEFNET_CONFIG` environment variable (path to TOML file)
//! 2. `reliefnet.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Environment variables always win over file values, so deployments can
//! tune a single option (e.g. `USGS_POLL_INTERVAL_S=60`) without a file.
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(AppConfig::load());
//!
//! // Anywhere in the codebase:
//! let interval = config::get().ingestion.usgs_poll_interval_s;
//! ```

mod settings;

pub use settings::*;

use std::sync::OnceLock;

/// Global application configuration, initialized once at startup.
static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Initialize the global configuration.
///
/// Should be called exactly once before any calls to `get()`; repeated
/// calls are ignored with a warning.
pub fn init(config: AppConfig) {
    if APP_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once — ignoring");
    }
}

/// Get a reference to the global configuration.
///
/// Falls back to defaults when `init()` was never called, which keeps unit
/// tests free of init boilerplate while production code always initializes
/// explicitly in `main`.
pub fn get() -> &'static AppConfig {
    APP_CONFIG.get_or_init(AppConfig::default)
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    APP_CONFIG.get().is_some()
}
