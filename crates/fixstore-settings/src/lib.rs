//! # fixstore-settings
//!
//! Layered configuration for the message store and audit log.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`FixStoreSettings::default()`]
//! 2. **Settings file**: `$FIXSTORE_SETTINGS` or `~/.fixstore/settings.json`
//! 3. **Environment variables**: `FIXSTORE_*` overrides (highest priority)
//!
//! Per-session overrides are resolved with [`FixStoreSettings::store_for`]
//! and [`FixStoreSettings::log_for`].

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_overrides, deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
