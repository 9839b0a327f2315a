//! Engine configuration

use std::time::Duration;

use serde::Deserialize;

/// Settings of one engine instance. Every field has a default, so an empty document is valid.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_account_id")]
    pub account_id: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Host (and port) rendered into queue URLs.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_queue_update_interval_ms")]
    pub queue_update_interval_ms: u64,

    /// Whether the periodic sweep drops messages older than `MessageRetentionPeriod`.
    #[serde(default)]
    pub enable_message_retention_period: bool,

    /// Refuse to re-create a queue name within 60 seconds of deleting it.
    #[serde(default)]
    pub delay_recently_deleted: bool,

    /// Refuse a second purge of the same queue within 60 seconds.
    #[serde(default)]
    pub delay_purge_retry: bool,

    /// Lift the 1 to 10 bound on `MaxNumberOfMessages`.
    #[serde(default)]
    pub disable_max_number_of_message_limit: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            account_id: default_account_id(),
            region: default_region(),
            host: default_host(),
            queue_update_interval_ms: default_queue_update_interval_ms(),
            enable_message_retention_period: false,
            delay_recently_deleted: false,
            delay_purge_retry: false,
            disable_max_number_of_message_limit: false,
        }
    }
}

impl EngineConfig {
    pub fn queue_update_interval(&self) -> Duration {
        Duration::from_millis(self.queue_update_interval_ms.max(1))
    }
}

fn default_account_id() -> String {
    "000000000000".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_host() -> String {
    "localhost:4566".to_string()
}

fn default_queue_update_interval_ms() -> u64 {
    1000
}
