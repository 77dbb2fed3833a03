//! JSON settings file loaded once at startup.
//!
//! The file names the two regions, the adapter endpoints, and the data
//! directory for the audit log and lease file; every tunable has a default
//! matching [`ControllerConfig`].

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use vigil_core::{ControllerConfig, RegionEndpoint, RegionRole};

/// One region in the primary/secondary topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSettings {
    /// Operator-assigned region name, e.g. `"eu-west-1"`.
    pub region_id: String,

    /// Health probe targets; the region is healthy only if all respond.
    pub health_urls: Vec<String>,

    /// Opaque routing target handed to the traffic director.
    pub routing_target: String,
}

impl RegionSettings {
    pub fn endpoint(&self, role: RegionRole) -> RegionEndpoint {
        RegionEndpoint::new(
            self.region_id.as_str(),
            role,
            self.health_urls.clone(),
            self.routing_target.as_str(),
        )
    }
}

fn default_threshold() -> u32 {
    3
}
fn default_probe_interval_secs() -> u64 {
    10
}
fn default_probe_timeout_secs() -> u64 {
    5
}
fn default_lease_ttl_secs() -> u64 {
    30
}
fn default_lease_renew_interval_secs() -> u64 {
    10
}
fn default_max_step_retries() -> u32 {
    5
}
fn default_backoff_base_secs() -> u64 {
    1
}
fn default_backoff_cap_secs() -> u64 {
    30
}
fn default_adapter_timeout_secs() -> u64 {
    10
}
fn default_lease_key() -> String {
    "vigil/failover".to_string()
}

/// Full settings for one controller process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Region currently serving writes.
    pub primary: RegionSettings,

    /// Promotion candidate.
    pub secondary: RegionSettings,

    /// Endpoint the promotion request is posted to.
    pub promotion_url: String,

    /// Endpoint the redirect request is posted to.
    pub traffic_url: String,

    /// Directory holding `audit.log` and `lease.json`.
    pub data_dir: PathBuf,

    #[serde(default = "default_threshold")]
    pub unhealthy_sample_threshold: u32,

    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,

    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,

    #[serde(default = "default_lease_renew_interval_secs")]
    pub lease_renew_interval_secs: u64,

    #[serde(default = "default_max_step_retries")]
    pub max_step_retries: u32,

    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,

    #[serde(default = "default_adapter_timeout_secs")]
    pub adapter_timeout_secs: u64,

    #[serde(default = "default_lease_key")]
    pub lease_key: String,
}

impl ControllerSettings {
    /// Loads and validates settings from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        let settings: Self = serde_json::from_slice(&data)
            .with_context(|| format!("parsing settings file {}", path.display()))?;
        settings
            .controller_config()
            .validate()
            .context("validating settings")?;
        Ok(settings)
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig::default()
            .with_unhealthy_sample_threshold(self.unhealthy_sample_threshold)
            .with_probe_interval(Duration::from_secs(self.probe_interval_secs))
            .with_probe_timeout(Duration::from_secs(self.probe_timeout_secs))
            .with_lease_ttl(Duration::from_secs(self.lease_ttl_secs))
            .with_lease_renew_interval(Duration::from_secs(self.lease_renew_interval_secs))
            .with_max_step_retries(self.max_step_retries)
            .with_backoff(
                Duration::from_secs(self.backoff_base_secs),
                Duration::from_secs(self.backoff_cap_secs),
            )
            .with_lease_key(self.lease_key.as_str())
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "primary": {
            "region_id": "eu-west-1",
            "health_urls": ["https://primary.example/healthz"],
            "routing_target": "primary.db.example"
        },
        "secondary": {
            "region_id": "eu-central-1",
            "health_urls": ["https://secondary.example/healthz"],
            "routing_target": "secondary.db.example"
        },
        "promotion_url": "https://admin.example/promote",
        "traffic_url": "https://admin.example/redirect",
        "data_dir": "/var/lib/vigil"
    }"#;

    #[test]
    fn minimal_settings_fill_defaults() {
        let settings: ControllerSettings = serde_json::from_str(MINIMAL).unwrap();
        assert_eq!(settings.unhealthy_sample_threshold, 3);
        assert_eq!(settings.lease_ttl_secs, 30);
        assert_eq!(settings.lease_key, "vigil/failover");
        assert!(settings.controller_config().validate().is_ok());
    }

    #[test]
    fn tunables_override_defaults() {
        let mut value: serde_json::Value = serde_json::from_str(MINIMAL).unwrap();
        value["unhealthy_sample_threshold"] = 5.into();
        value["lease_ttl_secs"] = 60.into();
        let settings: ControllerSettings = serde_json::from_value(value).unwrap();
        let config = settings.controller_config();
        assert_eq!(config.unhealthy_sample_threshold, 5);
        assert_eq!(config.lease_ttl, Duration::from_secs(60));
    }

    #[test]
    fn invalid_tunables_are_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.json");
        let mut value: serde_json::Value = serde_json::from_str(MINIMAL).unwrap();
        // Renew interval must stay shorter than the ttl.
        value["lease_ttl_secs"] = 5.into();
        value["lease_renew_interval_secs"] = 10.into();
        std::fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        assert!(ControllerSettings::load(&path).is_err());
    }
}
