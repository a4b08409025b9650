//! Teardown sequencing: containers first, then the shared network

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::TeardownConfig;
use crate::engine::EngineClient;
use crate::models::{ContainerStatus, NetworkStatus, TeardownOutcome, TeardownRequest};

use super::collector::OutcomeCollector;
use super::steps::{self, CallScope};

/// How a teardown call schedules its engine operations
#[derive(Debug, Clone)]
pub struct TeardownOptions {
    /// Stop grace period used when the request does not set one
    pub grace_period: Option<Duration>,

    /// Abandon the teardown after this long
    pub deadline: Option<Duration>,

    /// Tear containers down concurrently
    pub parallel: bool,

    /// Upper bound on concurrent container teardowns
    pub max_concurrency: usize,
}

impl Default for TeardownOptions {
    fn default() -> Self {
        Self {
            grace_period: None,
            deadline: None,
            parallel: true,
            max_concurrency: 8,
        }
    }
}

impl From<&TeardownConfig> for TeardownOptions {
    fn from(config: &TeardownConfig) -> Self {
        Self {
            grace_period: config.grace_period(),
            deadline: config.deadline(),
            parallel: config.parallel,
            max_concurrency: config.max_concurrency.max(1),
        }
    }
}

/// Stops and removes a task's containers, then removes their network when
/// nothing else is attached to it.
///
/// Individual resource failures never abort the call; every requested
/// resource ends up with exactly one status in the returned outcome.
pub struct TeardownOrchestrator {
    engine: Arc<dyn EngineClient>,
    options: TeardownOptions,
}

impl TeardownOrchestrator {
    pub fn new(engine: Arc<dyn EngineClient>, options: TeardownOptions) -> Self {
        Self { engine, options }
    }

    /// Tear down every resource in `request`
    pub async fn teardown(&self, request: &TeardownRequest) -> TeardownOutcome {
        self.teardown_with_cancel(request, CancellationToken::new()).await
    }

    /// Tear down every resource in `request`, abandoning in-flight engine calls
    /// once `cancel` fires or the configured deadline passes.
    pub async fn teardown_with_cancel(
        &self,
        request: &TeardownRequest,
        cancel: CancellationToken,
    ) -> TeardownOutcome {
        let teardown_id = Uuid::new_v4();
        let started_at = Utc::now();
        let scope = CallScope::new(cancel.child_token(), self.options.deadline);
        let collector = Arc::new(OutcomeCollector::new(request));

        info!(
            teardown_id = %teardown_id,
            network_id = %request.network(),
            containers = request.containers().len(),
            parallel = self.options.parallel,
            guarded = request.guard_shared_network(),
            "Starting teardown"
        );

        let proceed = if request.guard_shared_network() {
            self.check_shared_network(request, &scope, &collector).await
        } else {
            true
        };

        if proceed {
            if self.options.parallel {
                self.teardown_containers_parallel(request, &scope, &collector).await;
            } else {
                self.teardown_containers_sequential(request, &scope, &collector).await;
            }

            // Every requested container has a status at this point
            if !collector.network_recorded().await {
                let status = steps::teardown_network(self.engine.as_ref(), &scope, request.network()).await;
                collector.record_network(status).await;
            }
        }

        let outcome = collector.finish(teardown_id, started_at).await;
        crate::metrics::record_outcome(&outcome);

        if outcome.has_failures() {
            for failure in outcome.failures() {
                warn!(teardown_id = %teardown_id, resource = %failure.resource, reason = %failure.reason, "Teardown failure");
            }
        }
        info!(
            teardown_id = %teardown_id,
            network_status = outcome.network.status.label(),
            clean = outcome.is_clean(),
            duration_ms = outcome.duration().as_millis() as u64,
            "Teardown finished"
        );

        outcome
    }

    fn grace_period(&self, request: &TeardownRequest) -> Option<Duration> {
        request.grace_period().or(self.options.grace_period)
    }

    /// One container at a time, each step on its own task
    async fn teardown_containers_sequential(
        &self,
        request: &TeardownRequest,
        scope: &CallScope,
        collector: &Arc<OutcomeCollector>,
    ) {
        let grace_period = self.grace_period(request);

        for container_id in request.containers() {
            let task = self.container_task(scope, collector, container_id, grace_period);
            if let Err(e) = tokio::spawn(task).await {
                // The collector reports the container as failed when finishing
                error!(error = %e, container_id = %container_id, "Container teardown task aborted");
            }
        }
    }

    /// One task per container, joined before returning
    async fn teardown_containers_parallel(
        &self,
        request: &TeardownRequest,
        scope: &CallScope,
        collector: &Arc<OutcomeCollector>,
    ) {
        let grace_period = self.grace_period(request);
        let permits = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for container_id in request.containers() {
            let task = self.container_task(scope, collector, container_id, grace_period);
            let permits = Arc::clone(&permits);

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                task.await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Container teardown task aborted");
            }
        }
    }

    /// Stop and remove one container, recording its status
    fn container_task(
        &self,
        scope: &CallScope,
        collector: &Arc<OutcomeCollector>,
        container_id: &str,
        grace_period: Option<Duration>,
    ) -> impl Future<Output = ()> + Send + 'static {
        let engine = Arc::clone(&self.engine);
        let scope = scope.clone();
        let collector = Arc::clone(collector);
        let container_id = container_id.to_string();

        async move {
            let status =
                steps::teardown_container(engine.as_ref(), &scope, &container_id, grace_period).await;
            collector.record_container(&container_id, status).await;
        }
    }

    /// Inspect the network before touching any container.
    ///
    /// Returns whether teardown should go ahead. Containers outside the request
    /// still attached to the network hold everything back.
    async fn check_shared_network(
        &self,
        request: &TeardownRequest,
        scope: &CallScope,
        collector: &OutcomeCollector,
    ) -> bool {
        let network = match steps::inspect(self.engine.as_ref(), scope, request.network()).await {
            Ok(network) => network,
            Err(NetworkStatus::AlreadyAbsent) => {
                collector.record_network(NetworkStatus::AlreadyAbsent).await;
                return true;
            }
            Err(status) => {
                collector.record_network(status).await;
                collector.record_remaining_containers(ContainerStatus::NotAttempted).await;
                return false;
            }
        };

        let foreign = network.foreign_endpoints(request.containers());
        if foreign.is_empty() {
            return true;
        }

        info!(
            network_id = %request.network(),
            endpoints = ?foreign,
            "Other workloads still use the network, leaving it and its containers in place"
        );
        collector
            .record_network(NetworkStatus::SkippedNotEmpty { endpoints: foreign })
            .await;
        collector.record_remaining_containers(ContainerStatus::NotAttempted).await;
        false
    }
}
