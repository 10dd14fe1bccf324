//! Pluggable scheduler policies — a named registry of factories producing
//! stateful policy objects, mirroring the
//! `SchedulerRegistry`/`registry.register(...)` pattern of the reference
//! scheduler module this system is modeled on, expressed here as a
//! trait-object factory table.

use crate::model::WorkerEndpoint;
use std::collections::HashMap;

/// A named, stateful strategy that selects an ordered subset of endpoints
/// from a candidate list. Exclusive to the orchestrator that owns it.
pub trait SchedulerPolicy: Send + Sync {
    /// Returns at most `required` endpoints from `candidates`, in the order
    /// they should be assigned.
    fn select_workers(
        &mut self,
        candidates: &[WorkerEndpoint],
        required: usize,
    ) -> Vec<WorkerEndpoint>;
}

type PolicyFactory = Box<dyn Fn() -> Box<dyn SchedulerPolicy> + Send + Sync>;

/// Maps policy names to factories producing fresh policy instances.
#[derive(Default)]
pub struct SchedulerRegistry {
    factories: HashMap<String, PolicyFactory>,
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("unknown scheduler policy '{0}'")]
    UnknownPolicy(String),
}

impl SchedulerRegistry {
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register("round_robin", || Box::new(RoundRobinPolicy::new()));
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn SchedulerPolicy> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn SchedulerPolicy>, PolicyError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| PolicyError::UnknownPolicy(name.to_string()))
    }

    pub fn available(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

/// Reference round-robin policy. Anchors on the last-assigned
/// endpoint *key* rather than a positional index, since worker membership
/// routinely changes between calls (churn across heartbeats) and a prior
/// index would be meaningless against a different candidate set.
pub struct RoundRobinPolicy {
    last_key: Option<String>,
}

impl RoundRobinPolicy {
    pub fn new() -> Self {
        Self { last_key: None }
    }
}

impl Default for RoundRobinPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerPolicy for RoundRobinPolicy {
    fn select_workers(
        &mut self,
        candidates: &[WorkerEndpoint],
        required: usize,
    ) -> Vec<WorkerEndpoint> {
        if candidates.is_empty() || required == 0 {
            return Vec::new();
        }

        let mut sorted: Vec<&WorkerEndpoint> = candidates.iter().collect();
        sorted.sort_by(|a, b| (&a.worker_id, &a.address).cmp(&(&b.worker_id, &b.address)));

        let start_index = match &self.last_key {
            Some(last_key) => sorted
                .iter()
                .position(|ep| &ep.key() == last_key)
                .map(|idx| (idx + 1) % sorted.len())
                .unwrap_or(0),
            None => 0,
        };

        let count = required.min(sorted.len());
        let mut result = Vec::with_capacity(count);
        let mut index = start_index;
        for _ in 0..count {
            let endpoint = sorted[index];
            self.last_key = Some(endpoint.key());
            result.push(endpoint.clone());
            index = (index + 1) % sorted.len();
        }
        result
    }
}
