//! Settings types with compiled defaults.

use std::collections::BTreeMap;
use std::path::PathBuf;

use fixstore_core::SessionKey;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Database file used when nothing else is configured.
pub const DEFAULT_DATABASE: &str = "fixstore.db";

pub const DEFAULT_SESSIONS_TABLE: &str = "sessions";
pub const DEFAULT_MESSAGES_TABLE: &str = "messages";
pub const DEFAULT_INCOMING_TABLE: &str = "incoming_log";
pub const DEFAULT_OUTGOING_TABLE: &str = "outgoing_log";
pub const DEFAULT_EVENT_TABLE: &str = "event_log";

/// Top-level settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FixStoreSettings {
    pub store: StoreSettings,
    pub log: LogSettings,
    /// Overrides keyed by the display form of a session key,
    /// e.g. `FIX.4.2:BUYER->SELLER`.
    pub sessions: BTreeMap<String, SessionOverrides>,
}

/// Where the message store lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    pub database: PathBuf,
    pub sessions_table: String,
    pub messages_table: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            sessions_table: DEFAULT_SESSIONS_TABLE.to_string(),
            messages_table: DEFAULT_MESSAGES_TABLE.to_string(),
        }
    }
}

/// Where the audit log lives. The three streams may share a table, but
/// rows then can't be told apart by stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogSettings {
    pub database: PathBuf,
    pub incoming_table: String,
    pub outgoing_table: String,
    pub event_table: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            incoming_table: DEFAULT_INCOMING_TABLE.to_string(),
            outgoing_table: DEFAULT_OUTGOING_TABLE.to_string(),
            event_table: DEFAULT_EVENT_TABLE.to_string(),
        }
    }
}

/// Per-session overrides. Unset fields fall back to the top-level settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionOverrides {
    pub store_database: Option<PathBuf>,
    pub sessions_table: Option<String>,
    pub messages_table: Option<String>,
    pub log_database: Option<PathBuf>,
    pub log_incoming_table: Option<String>,
    pub log_outgoing_table: Option<String>,
    pub log_event_table: Option<String>,
}

impl FixStoreSettings {
    /// Store settings for `key`, with any per-session overrides applied.
    pub fn store_for(&self, key: &SessionKey) -> StoreSettings {
        let mut resolved = self.store.clone();
        if let Some(o) = self.sessions.get(&key.to_string()) {
            if let Some(v) = &o.store_database {
                resolved.database.clone_from(v);
            }
            if let Some(v) = &o.sessions_table {
                resolved.sessions_table.clone_from(v);
            }
            if let Some(v) = &o.messages_table {
                resolved.messages_table.clone_from(v);
            }
        }
        resolved
    }

    /// Log settings for `key`, with any per-session overrides applied.
    pub fn log_for(&self, key: &SessionKey) -> LogSettings {
        let mut resolved = self.log.clone();
        if let Some(o) = self.sessions.get(&key.to_string()) {
            if let Some(v) = &o.log_database {
                resolved.database.clone_from(v);
            }
            if let Some(v) = &o.log_incoming_table {
                resolved.incoming_table.clone_from(v);
            }
            if let Some(v) = &o.log_outgoing_table {
                resolved.outgoing_table.clone_from(v);
            }
            if let Some(v) = &o.log_event_table {
                resolved.event_table.clone_from(v);
            }
        }
        resolved
    }

    /// Check every table name and every override key.
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.log.validate()?;
        for (raw, overrides) in &self.sessions {
            let key: SessionKey = raw
                .parse()
                .map_err(|e| SettingsError::InvalidValue(format!("sessions: {e}")))?;
            // Overrides are looked up by the rendered key.
            if key.to_string() != *raw {
                return Err(SettingsError::InvalidValue(format!(
                    "sessions: {raw:?} should be written as {:?}",
                    key.to_string()
                )));
            }
            for name in [
                &overrides.sessions_table,
                &overrides.messages_table,
                &overrides.log_incoming_table,
                &overrides.log_outgoing_table,
                &overrides.log_event_table,
            ]
            .into_iter()
            .flatten()
            {
                validate_table_name(name)?;
            }
        }
        Ok(())
    }
}

impl StoreSettings {
    pub fn validate(&self) -> Result<()> {
        validate_table_name(&self.sessions_table)?;
        validate_table_name(&self.messages_table)
    }
}

impl LogSettings {
    pub fn validate(&self) -> Result<()> {
        validate_table_name(&self.incoming_table)?;
        validate_table_name(&self.outgoing_table)?;
        validate_table_name(&self.event_table)
    }
}

/// Table names are spliced into SQL text, so only plain identifiers pass.
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(SettingsError::InvalidValue(format!("table name {name:?}")))
    }
}
