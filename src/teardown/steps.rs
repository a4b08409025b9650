//! Per-resource teardown steps

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{EngineClient, EngineError, NetworkInfo};
use crate::models::{ContainerStatus, FailureReason, NetworkStatus};

/// Cancellation and deadline shared by every engine call of one teardown
#[derive(Debug, Clone)]
pub(crate) struct CallScope {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallScope {
    pub fn new(cancel: CancellationToken, deadline: Option<Duration>) -> Self {
        Self {
            cancel,
            deadline: deadline.map(|d| Instant::now() + d),
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Run one engine call, abandoning it on cancellation or deadline
    pub async fn run<T, F>(&self, call: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        if self.is_canceled() {
            return Err(EngineError::Canceled);
        }

        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EngineError::Canceled),
            _ = deadline => Err(EngineError::Canceled),
            result = call => result,
        }
    }
}

/// Stop then remove one container
pub(crate) async fn teardown_container(
    engine: &dyn EngineClient,
    scope: &CallScope,
    container_id: &str,
    grace_period: Option<Duration>,
) -> ContainerStatus {
    if scope.is_canceled() {
        debug!(container_id = %container_id, "Teardown canceled before container was reached");
        return ContainerStatus::NotAttempted;
    }

    match scope.run(engine.stop_container(container_id, grace_period)).await {
        Ok(()) => debug!(container_id = %container_id, "Container stopped"),
        Err(e) if e.is_not_found() => {
            info!(container_id = %container_id, "Container already absent");
            return ContainerStatus::AlreadyAbsent;
        }
        Err(e) => {
            warn!(container_id = %container_id, error = %e, "Failed to stop container");
            return ContainerStatus::failed(FailureReason::from(&e));
        }
    }

    match scope.run(engine.remove_container(container_id)).await {
        Ok(()) => {
            info!(container_id = %container_id, "Container removed");
            ContainerStatus::Removed
        }
        Err(e) if e.is_not_found() => {
            info!(container_id = %container_id, "Container disappeared before removal");
            ContainerStatus::AlreadyAbsent
        }
        Err(e) => {
            warn!(container_id = %container_id, error = %e, "Failed to remove container");
            ContainerStatus::failed(FailureReason::from(&e))
        }
    }
}

/// Inspect the network and remove it when nothing is attached
pub(crate) async fn teardown_network(
    engine: &dyn EngineClient,
    scope: &CallScope,
    network_id: &str,
) -> NetworkStatus {
    if scope.is_canceled() {
        debug!(network_id = %network_id, "Teardown canceled before network step");
        return NetworkStatus::NotAttempted;
    }

    let network = match inspect(engine, scope, network_id).await {
        Ok(network) => network,
        Err(status) => return status,
    };

    if network.has_endpoints() {
        let endpoints = network.endpoint_ids();
        info!(
            network_id = %network_id,
            endpoints = ?endpoints,
            "Network still has attached containers, leaving it in place"
        );
        return NetworkStatus::SkippedNotEmpty { endpoints };
    }

    match scope.run(engine.remove_network(network_id)).await {
        Ok(()) => {
            info!(network_id = %network_id, "Network removed");
            NetworkStatus::Removed
        }
        Err(e) if e.is_not_found() => {
            info!(network_id = %network_id, "Network already absent");
            NetworkStatus::AlreadyAbsent
        }
        Err(e) => {
            warn!(network_id = %network_id, error = %e, "Failed to remove network");
            NetworkStatus::failed(FailureReason::from(&e))
        }
    }
}

/// Inspect a network, turning every inspect failure into its final status
pub(crate) async fn inspect(
    engine: &dyn EngineClient,
    scope: &CallScope,
    network_id: &str,
) -> Result<NetworkInfo, NetworkStatus> {
    match scope.run(engine.inspect_network(network_id)).await {
        Ok(network) => Ok(network),
        Err(e) if e.is_not_found() => {
            info!(network_id = %network_id, "Network already absent");
            Err(NetworkStatus::AlreadyAbsent)
        }
        Err(e) => {
            // Never remove a network we could not look at
            warn!(network_id = %network_id, error = %e, "Failed to inspect network");
            Err(NetworkStatus::failed(FailureReason::from(&e)))
        }
    }
}
