//! Outcome aggregation shared by concurrent container tasks

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    ContainerOutcome, ContainerStatus, FailureKind, FailureReason, NetworkOutcome, NetworkStatus,
    TeardownOutcome, TeardownRequest,
};

#[derive(Debug, Default)]
struct Recorded {
    containers: HashMap<String, ContainerStatus>,
    network: Option<NetworkStatus>,
}

/// Collects statuses as they are produced and assembles the final outcome
#[derive(Debug)]
pub(crate) struct OutcomeCollector {
    container_order: Vec<String>,
    network_id: String,
    recorded: Mutex<Recorded>,
}

impl OutcomeCollector {
    pub fn new(request: &TeardownRequest) -> Self {
        Self {
            container_order: request.containers().to_vec(),
            network_id: request.network().to_string(),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    /// Record a container status; the first status recorded for an id wins
    pub async fn record_container(&self, container_id: &str, status: ContainerStatus) {
        self.recorded
            .lock()
            .await
            .containers
            .entry(container_id.to_string())
            .or_insert(status);
    }

    /// Record the same status for every container not recorded yet
    pub async fn record_remaining_containers(&self, status: ContainerStatus) {
        let mut recorded = self.recorded.lock().await;
        for id in &self.container_order {
            recorded
                .containers
                .entry(id.clone())
                .or_insert_with(|| status.clone());
        }
    }

    pub async fn record_network(&self, status: NetworkStatus) {
        self.recorded.lock().await.network.get_or_insert(status);
    }

    pub async fn network_recorded(&self) -> bool {
        self.recorded.lock().await.network.is_some()
    }

    /// Assemble the outcome in request order.
    ///
    /// A container without a status lost its task; the network without a
    /// status was never reached.
    pub async fn finish(&self, teardown_id: Uuid, started_at: DateTime<Utc>) -> TeardownOutcome {
        let mut recorded = self.recorded.lock().await;

        let containers = self
            .container_order
            .iter()
            .map(|id| ContainerOutcome {
                container_id: id.clone(),
                status: recorded.containers.remove(id).unwrap_or_else(|| {
                    ContainerStatus::failed(FailureReason::new(
                        FailureKind::Engine,
                        "teardown task aborted",
                    ))
                }),
            })
            .collect();

        let network = NetworkOutcome {
            network_id: self.network_id.clone(),
            status: recorded.network.take().unwrap_or(NetworkStatus::NotAttempted),
        };

        TeardownOutcome {
            teardown_id,
            containers,
            network,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
