//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`FixStoreSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::FixStoreSettings;

/// Resolve the settings file: `$FIXSTORE_SETTINGS`, else
/// `~/.fixstore/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(explicit) = read_env_string("FIXSTORE_SETTINGS") {
        return PathBuf::from(explicit);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".fixstore").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<FixStoreSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an invalid table name
/// is an error.
pub fn load_settings_from_path(path: &Path) -> Result<FixStoreSettings> {
    let mut settings = read_settings_file(path)?;
    apply_overrides(&mut settings, read_env_string);
    settings.validate()?;
    Ok(settings)
}

fn read_settings_file(path: &Path) -> Result<FixStoreSettings> {
    let defaults = serde_json::to_value(FixStoreSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply overrides from `lookup` (the process environment in production).
pub fn apply_overrides<F>(settings: &mut FixStoreSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("FIXSTORE_STORE_DATABASE") {
        settings.store.database = PathBuf::from(v);
    }
    if let Some(v) = lookup("FIXSTORE_LOG_DATABASE") {
        settings.log.database = PathBuf::from(v);
    }
}

/// Read a non-empty environment variable.
fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
