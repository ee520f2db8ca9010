use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Service configuration, loaded from `VOLTFLOW_*` environment variables.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // MQTT configuration
    /// Address of the MQTT broker, e.g. mqtt://127.0.0.1:1883
    #[serde(default = "default_mqtt_url")]
    pub mqtt_url: String,

    /// Topic prefix the manager subscribes under
    #[serde(default = "default_mqtt_prefix")]
    pub mqtt_prefix: String,

    /// Shared-subscription group for horizontal scaling
    #[serde(default = "default_mqtt_group")]
    pub mqtt_group: String,

    /// MQTT client id
    #[serde(default = "default_mqtt_client_id")]
    pub mqtt_client_id: String,

    /// Upper bound on concurrently handled envelopes
    #[serde(default = "default_worker_capacity")]
    pub worker_capacity: usize,

    // Protocol behaviour
    /// Heartbeat interval handed to booting stations, in seconds
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Retention for pending server-initiated calls, in seconds (min 300)
    #[serde(default = "default_pending_call_ttl_secs")]
    pub pending_call_ttl_secs: u64,

    // Storage
    /// Storage engine, one of [inmemory]
    #[serde(default = "default_storage_engine")]
    pub storage_engine: String,

    // Certificates
    /// Comma-separated PEM files with the V2G trust anchors
    #[serde(default)]
    pub trust_anchor_pem_files: String,

    /// Maximum OCSP attempts per certificate
    #[serde(default = "default_max_ocsp_attempts")]
    pub max_ocsp_attempts: u32,

    // OPCP integrations (PnC); empty token disables the integration
    /// CSO OPCP environment URL (certificate signing)
    #[serde(default = "default_cso_opcp_url")]
    pub cso_opcp_url: String,

    /// CSO OPCP bearer token
    #[serde(default)]
    pub cso_opcp_token: String,

    /// MO OPCP environment URL (contract certificate provisioning)
    #[serde(default = "default_mo_opcp_url")]
    pub mo_opcp_url: String,

    /// MO OPCP bearer token
    #[serde(default)]
    pub mo_opcp_token: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_mqtt_url() -> String {
    "mqtt://127.0.0.1:1883".to_string()
}

fn default_mqtt_prefix() -> String {
    "cs".to_string()
}

fn default_mqtt_group() -> String {
    "manager".to_string()
}

fn default_mqtt_client_id() -> String {
    "voltflow-csms".to_string()
}

fn default_worker_capacity() -> usize {
    8
}

fn default_heartbeat_interval_secs() -> u64 {
    60
}

fn default_pending_call_ttl_secs() -> u64 {
    600
}

fn default_storage_engine() -> String {
    "inmemory".to_string()
}

fn default_max_ocsp_attempts() -> u32 {
    3
}

fn default_cso_opcp_url() -> String {
    "https://open.plugncharge-test.hubject.com".to_string()
}

fn default_mo_opcp_url() -> String {
    "https://open.plugncharge-test.hubject.com".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("VOLTFLOW"))
            .build()?
            .try_deserialize()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Pending-call retention, clamped to the 5 minute protocol floor.
    pub fn pending_call_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_call_ttl_secs.max(300))
    }

    pub fn trust_anchor_files(&self) -> Vec<String> {
        self.trust_anchor_pem_files
            .split(',')
            .map(str::trim)
            .filter(|file| !file.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_apply_without_environment() {
        let _lock = TEST_LOCK.lock().unwrap();
        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.mqtt_prefix, "cs");
        assert_eq!(config.mqtt_group, "manager");
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(60));
        assert!(config.trust_anchor_files().is_empty());
    }

    #[test]
    fn pending_call_ttl_is_clamped_to_protocol_floor() {
        let _lock = TEST_LOCK.lock().unwrap();
        let config = ServiceConfig {
            pending_call_ttl_secs: 10,
            ..ServiceConfig::from_env().unwrap()
        };
        assert_eq!(config.pending_call_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn trust_anchor_files_are_split_and_trimmed() {
        let _lock = TEST_LOCK.lock().unwrap();
        let config = ServiceConfig {
            trust_anchor_pem_files: "roots/v2g.pem, roots/mo.pem".to_string(),
            ..ServiceConfig::from_env().unwrap()
        };
        assert_eq!(
            config.trust_anchor_files(),
            vec!["roots/v2g.pem".to_string(), "roots/mo.pem".to_string()]
        );
    }
}
