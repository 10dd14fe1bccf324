//! Wires the metadata store, scheduler registry and orchestrator together
//! from configuration, mirroring `cloud-component-service`'s
//! `service::Services::new` constructor.

use crate::config::{DmsMasterConfig, MetadataStoreConfig};
use crate::orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorError};
use crate::policy::SchedulerRegistry;
use crate::store::{InMemoryMetadataStore, MetadataStore, RedisMetadataStore, TtlDays};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("failed to initialize metadata store: {0}")]
    Store(#[from] crate::store::StoreError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

#[derive(Clone)]
pub struct Services {
    pub orchestrator: Arc<Orchestrator>,
}

impl Services {
    pub async fn new(config: &DmsMasterConfig) -> Result<Self, BootstrapError> {
        let store: Arc<dyn MetadataStore> = match &config.metadata_store {
            MetadataStoreConfig::Redis {
                url,
                namespace,
                ttl_days,
            } => Arc::new(RedisMetadataStore::new(url, namespace.clone(), TtlDays(*ttl_days))?),
            MetadataStoreConfig::InMemory => Arc::new(InMemoryMetadataStore::new()),
        };

        let registry = SchedulerRegistry::new();
        let orchestrator = Orchestrator::new(
            store,
            &registry,
            &config.scheduler_policy,
            OrchestratorConfig {
                worker_heartbeat_timeout: config
                    .worker_heartbeat_timeout
                    .map(|d| chrono::Duration::from_std(d).unwrap_or(chrono::Duration::zero())),
                next_assignment_timeout: config.next_assignment_timeout,
            },
        )?;

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
        })
    }
}
