//! Container engine capability
//!
//! Teardown only needs four engine operations:
//! - Stopping a container with an optional grace period
//! - Removing a stopped container
//! - Inspecting a network for attached endpoints
//! - Removing a network
//!
//! Production code talks to a Docker-compatible daemon through [`DockerEngine`];
//! tests substitute an in-memory fake or a mock.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod docker;
#[cfg(test)]
pub(crate) mod fake;

pub use docker::DockerEngine;

/// Errors reported by a single engine call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource in use: {0}")]
    InUse(String),

    #[error("Engine call timed out: {0}")]
    Timeout(String),

    #[error("canceled")]
    Canceled,

    #[error("Engine error: {0}")]
    Engine(String),
}

impl EngineError {
    /// Whether the resource is already gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}

/// Operations the teardown orchestrator needs from a container engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Stop a container. `None` leaves the grace period to the engine default.
    async fn stop_container(
        &self,
        container_id: &str,
        grace_period: Option<Duration>,
    ) -> Result<(), EngineError>;

    /// Remove a stopped container
    async fn remove_container(&self, container_id: &str) -> Result<(), EngineError>;

    /// Inspect a network by id or name
    async fn inspect_network(&self, network_id: &str) -> Result<NetworkInfo, EngineError>;

    /// Remove a network by id or name
    async fn remove_network(&self, network_id: &str) -> Result<(), EngineError>;
}

/// A container attached to a network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub container_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Endpoint {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            name: None,
        }
    }

    pub fn named(container_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            name: Some(name.into()),
        }
    }

    /// Whether `reference` is this endpoint's full id or its name
    pub fn matches(&self, reference: &str) -> bool {
        if reference.is_empty() {
            return false;
        }
        let name = self.name.as_deref().map(|n| n.trim_start_matches('/'));

        self.container_id == reference || name == Some(reference.trim_start_matches('/'))
    }
}

/// Network state as reported by the engine at inspection time
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub id: String,
    pub name: String,
    pub endpoints: Vec<Endpoint>,
}

impl NetworkInfo {
    /// Ids of every attached container
    pub fn endpoint_ids(&self) -> Vec<String> {
        self.endpoints.iter().map(|e| e.container_id.clone()).collect()
    }

    pub fn has_endpoints(&self) -> bool {
        !self.endpoints.is_empty()
    }

    /// The endpoint `reference` points at.
    ///
    /// A full id or a name wins. Otherwise a short id counts only when it is
    /// the prefix of exactly one attached container.
    pub fn resolve(&self, reference: &str) -> Option<&Endpoint> {
        if reference.is_empty() {
            return None;
        }
        if let Some(endpoint) = self.endpoints.iter().find(|e| e.matches(reference)) {
            return Some(endpoint);
        }

        let mut prefixed = self
            .endpoints
            .iter()
            .filter(|e| e.container_id.starts_with(reference));
        match (prefixed.next(), prefixed.next()) {
            (Some(endpoint), None) => Some(endpoint),
            _ => None,
        }
    }

    /// Ids of attached containers that none of `references` resolve to
    pub fn foreign_endpoints(&self, references: &[String]) -> Vec<String> {
        let claimed: HashSet<&str> = references
            .iter()
            .filter_map(|r| self.resolve(r))
            .map(|e| e.container_id.as_str())
            .collect();

        self.endpoints
            .iter()
            .filter(|endpoint| !claimed.contains(endpoint.container_id.as_str()))
            .map(|endpoint| endpoint.container_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_matching() {
        let endpoint = Endpoint::named("3f2a9c0d11e4", "web");
        assert!(endpoint.matches("3f2a9c0d11e4"));
        assert!(!endpoint.matches("3f2a"));
        assert!(endpoint.matches("web"));
        assert!(endpoint.matches("/web"));
        assert!(!endpoint.matches("db"));
        assert!(!endpoint.matches(""));
    }

    #[test]
    fn test_foreign_endpoints() {
        let network = NetworkInfo {
            id: "n1".to_string(),
            name: "task-net".to_string(),
            endpoints: vec![
                Endpoint::named("aaa111", "app"),
                Endpoint::named("bbb222", "sidecar"),
                Endpoint::named("ccc333", "other-task"),
            ],
        };

        let requested = vec!["aaa111".to_string(), "sidecar".to_string()];
        assert_eq!(network.foreign_endpoints(&requested), vec!["ccc333".to_string()]);
        assert_eq!(network.endpoint_ids().len(), 3);

        let short = vec!["aaa".to_string(), "bbb222".to_string()];
        assert_eq!(network.foreign_endpoints(&short), vec!["ccc333".to_string()]);
    }

    #[test]
    fn test_shared_id_prefix_is_not_claimed() {
        let network = NetworkInfo {
            id: "n1".to_string(),
            name: "task-net".to_string(),
            endpoints: vec![
                Endpoint::new("c1"),
                Endpoint::new("c10"),
                Endpoint::new("d42a"),
                Endpoint::new("d42b"),
            ],
        };

        assert_eq!(network.resolve("c1"), Some(&Endpoint::new("c1")));
        assert_eq!(network.resolve("d42"), None);
        assert_eq!(
            network.foreign_endpoints(&["c1".to_string(), "d42".to_string()]),
            vec!["c10".to_string(), "d42a".to_string(), "d42b".to_string()]
        );
    }

    #[test]
    fn test_not_found_classification() {
        assert!(EngineError::NotFound("c1".to_string()).is_not_found());
        assert!(!EngineError::InUse("c1".to_string()).is_not_found());
        assert!(!EngineError::Canceled.is_not_found());
    }
}
