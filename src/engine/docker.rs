//! Docker Engine API adapter

use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{RemoveContainerOptions, StopContainerOptions};
use bollard::errors::Error as BollardError;
use bollard::network::InspectNetworkOptions;
use bollard::{Docker, API_DEFAULT_VERSION};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::TeardownError;

use super::{EngineClient, EngineError, Endpoint, NetworkInfo};

/// [`EngineClient`] backed by a Docker-compatible daemon
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect using the configured host, or the local defaults
    /// (`DOCKER_HOST`, then the default unix socket) when none is set.
    pub fn connect(config: &EngineConfig) -> Result<Self, TeardownError> {
        let timeout = config.timeout_seconds;

        let docker = match config.host.as_deref() {
            None => Docker::connect_with_local_defaults()?.with_timeout(Duration::from_secs(timeout)),
            Some(host) if host.starts_with("tcp://") || host.starts_with("http://") => {
                let address = host.replacen("tcp://", "http://", 1);
                Docker::connect_with_http(&address, timeout, API_DEFAULT_VERSION)?
            }
            Some(host) => {
                let socket = host.trim_start_matches("unix://");
                Docker::connect_with_socket(socket, timeout, API_DEFAULT_VERSION)?
            }
        };

        debug!(host = ?config.host, timeout_seconds = timeout, "Docker client configured");

        Ok(Self { docker })
    }
}

#[async_trait]
impl EngineClient for DockerEngine {
    async fn stop_container(
        &self,
        container_id: &str,
        grace_period: Option<Duration>,
    ) -> Result<(), EngineError> {
        let options = grace_period.map(|grace| StopContainerOptions {
            t: i64::try_from(grace.as_secs()).unwrap_or(i64::MAX),
        });

        stop_result(self.docker.stop_container(container_id, options).await, container_id)
    }

    async fn remove_container(&self, container_id: &str) -> Result<(), EngineError> {
        self.docker
            .remove_container(container_id, Some(RemoveContainerOptions::default()))
            .await
            .map_err(|e| classify(e, container_id))
    }

    async fn inspect_network(&self, network_id: &str) -> Result<NetworkInfo, EngineError> {
        let network = self
            .docker
            .inspect_network(network_id, None::<InspectNetworkOptions<String>>)
            .await
            .map_err(|e| classify(e, network_id))?;

        let mut endpoints: Vec<Endpoint> = network
            .containers
            .unwrap_or_default()
            .into_iter()
            .map(|(container_id, container)| Endpoint {
                container_id,
                name: container.name,
            })
            .collect();
        endpoints.sort_by(|a, b| a.container_id.cmp(&b.container_id));

        Ok(NetworkInfo {
            id: network.id.unwrap_or_else(|| network_id.to_string()),
            name: network.name.unwrap_or_else(|| network_id.to_string()),
            endpoints,
        })
    }

    async fn remove_network(&self, network_id: &str) -> Result<(), EngineError> {
        self.docker
            .remove_network(network_id)
            .await
            .map_err(|e| classify(e, network_id))
    }
}

/// A stop answered with 304 means the container was not running
fn stop_result(result: Result<(), BollardError>, container_id: &str) -> Result<(), EngineError> {
    match result {
        Ok(()) => Ok(()),
        Err(BollardError::DockerResponseServerError { status_code: 304, .. }) => {
            debug!(container_id = %container_id, "Container already stopped");
            Ok(())
        }
        Err(e) => Err(classify(e, container_id)),
    }
}

/// Map a Docker API error onto the engine error taxonomy
fn classify(err: BollardError, resource: &str) -> EngineError {
    match err {
        BollardError::DockerResponseServerError { status_code: 404, message } => {
            EngineError::NotFound(format!("{}: {}", resource, message))
        }
        BollardError::DockerResponseServerError { status_code: 409, message } => {
            EngineError::InUse(format!("{}: {}", resource, message))
        }
        BollardError::RequestTimeoutError => EngineError::Timeout(resource.to_string()),
        other => EngineError::Engine(format!("{}: {}", resource, other)),
    }
}
