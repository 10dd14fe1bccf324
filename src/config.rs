//! Configuration loading: TOML file with environment variable overrides,
//! following the `figment` layering used across the wider workspace (e.g.
//! `cloud-servers-oss`'s `CloudServiceConfig::new`).

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MetadataStoreConfig {
    Redis {
        url: String,
        #[serde(default = "default_namespace")]
        namespace: String,
        #[serde(default)]
        ttl_days: Option<u32>,
    },
    InMemory,
}

fn default_namespace() -> String {
    "dms".to_string()
}

impl Default for MetadataStoreConfig {
    fn default() -> Self {
        MetadataStoreConfig::InMemory
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DmsMasterConfig {
    pub http_port: u16,
    pub tracing_filter: String,
    pub scheduler_policy: String,
    pub metadata_store: MetadataStoreConfig,
    /// Read-side heartbeat staleness filter; `None` disables it entirely,
    /// which is the default.
    #[serde(with = "humantime_serde::option", default)]
    pub worker_heartbeat_timeout: Option<Duration>,
    #[serde(with = "humantime_serde", default = "default_next_assignment_timeout")]
    pub next_assignment_timeout: Duration,
}

fn default_next_assignment_timeout() -> Duration {
    Duration::from_secs(1)
}

impl Default for DmsMasterConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            tracing_filter: "dms_master=info,warn".to_string(),
            scheduler_policy: "round_robin".to_string(),
            metadata_store: MetadataStoreConfig::default(),
            worker_heartbeat_timeout: None,
            next_assignment_timeout: default_next_assignment_timeout(),
        }
    }
}

impl DmsMasterConfig {
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(Self::default()))
            .merge(Toml::file("config/dms-master.toml"))
            .merge(Env::prefixed("DMS_MASTER__").split("__"))
            .extract()
    }
}
