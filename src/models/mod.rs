//! Data models for the teardown orchestrator
//!
//! This module defines the teardown request, the per-resource statuses and the
//! aggregated outcome returned to callers.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::EngineError;
use crate::error::TeardownError;

// ============================================================================
// Request
// ============================================================================

/// Resources to tear down: an ordered set of containers and their network.
///
/// Always valid once constructed; deserialization goes through the same checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTeardownRequest", into = "RawTeardownRequest")]
pub struct TeardownRequest {
    containers: Vec<String>,
    network: String,
    grace_period: Option<Duration>,
    guard_shared_network: bool,
}

/// Wire form of [`TeardownRequest`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawTeardownRequest {
    #[serde(default)]
    containers: Vec<String>,
    network: String,
    #[serde(default)]
    grace_period_seconds: Option<u64>,
    #[serde(default)]
    guard_shared_network: bool,
}

impl TeardownRequest {
    /// Build a request, rejecting empty or duplicate identifiers
    pub fn new<I, S>(containers: I, network: impl Into<String>) -> Result<Self, TeardownError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let containers: Vec<String> = containers.into_iter().map(Into::into).collect();
        let network = network.into();

        if network.trim().is_empty() {
            return Err(TeardownError::InvalidRequest(
                "network id must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(containers.len());
        for (index, id) in containers.iter().enumerate() {
            if id.trim().is_empty() {
                return Err(TeardownError::InvalidRequest(format!(
                    "container id at position {} is empty",
                    index
                )));
            }
            if !seen.insert(id.as_str()) {
                return Err(TeardownError::InvalidRequest(format!(
                    "container id {} is listed more than once",
                    id
                )));
            }
        }

        Ok(Self {
            containers,
            network,
            grace_period: None,
            guard_shared_network: false,
        })
    }

    /// Stop grace period for this request, overriding the orchestrator default
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = Some(grace_period);
        self
    }

    /// Leave everything in place while containers outside this request are
    /// attached to the network
    pub fn guarded(mut self, guard: bool) -> Self {
        self.guard_shared_network = guard;
        self
    }

    pub fn containers(&self) -> &[String] {
        &self.containers
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn grace_period(&self) -> Option<Duration> {
        self.grace_period
    }

    pub fn guard_shared_network(&self) -> bool {
        self.guard_shared_network
    }
}

impl TryFrom<RawTeardownRequest> for TeardownRequest {
    type Error = TeardownError;

    fn try_from(raw: RawTeardownRequest) -> Result<Self, Self::Error> {
        let mut request = TeardownRequest::new(raw.containers, raw.network)?.guarded(raw.guard_shared_network);
        if let Some(secs) = raw.grace_period_seconds {
            request = request.with_grace_period(Duration::from_secs(secs));
        }
        Ok(request)
    }
}

impl From<TeardownRequest> for RawTeardownRequest {
    fn from(request: TeardownRequest) -> Self {
        Self {
            containers: request.containers,
            network: request.network,
            grace_period_seconds: request.grace_period.map(|d| d.as_secs()),
            guard_shared_network: request.guard_shared_network,
        }
    }
}

// ============================================================================
// Statuses
// ============================================================================

/// Category of a recorded failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Engine,
    Timeout,
    InUse,
    Canceled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Engine => "engine",
            FailureKind::Timeout => "timeout",
            FailureKind::InUse => "in_use",
            FailureKind::Canceled => "canceled",
        }
    }
}

/// Why a resource could not be torn down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureReason {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn canceled() -> Self {
        Self::new(FailureKind::Canceled, "canceled")
    }
}

impl From<&EngineError> for FailureReason {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::Canceled => FailureReason::canceled(),
            EngineError::Timeout(_) => FailureReason::new(FailureKind::Timeout, err.to_string()),
            EngineError::InUse(_) => FailureReason::new(FailureKind::InUse, err.to_string()),
            EngineError::NotFound(_) | EngineError::Engine(_) => {
                FailureReason::new(FailureKind::Engine, err.to_string())
            }
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == FailureKind::Canceled {
            f.write_str(&self.message)
        } else {
            write!(f, "{} ({})", self.message, self.kind.as_str())
        }
    }
}

/// Final state of one requested container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ContainerStatus {
    /// Stopped and removed by this call
    Removed,
    /// Already gone before this call could remove it
    AlreadyAbsent,
    Failed { reason: FailureReason },
    /// Never reached because the call was canceled or held back
    NotAttempted,
}

impl ContainerStatus {
    pub fn failed(reason: FailureReason) -> Self {
        ContainerStatus::Failed { reason }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ContainerStatus::Failed { .. })
    }

    /// Container no longer exists in the engine
    pub fn is_gone(&self) -> bool {
        matches!(self, ContainerStatus::Removed | ContainerStatus::AlreadyAbsent)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContainerStatus::Removed => "removed",
            ContainerStatus::AlreadyAbsent => "already_absent",
            ContainerStatus::Failed { .. } => "failed",
            ContainerStatus::NotAttempted => "not_attempted",
        }
    }
}

/// Final state of the requested network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NetworkStatus {
    Removed,
    AlreadyAbsent,
    /// Containers were still attached, so the network was left in place
    SkippedNotEmpty { endpoints: Vec<String> },
    Failed { reason: FailureReason },
    NotAttempted,
}

impl NetworkStatus {
    pub fn failed(reason: FailureReason) -> Self {
        NetworkStatus::Failed { reason }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, NetworkStatus::Failed { .. })
    }

    pub fn is_gone(&self) -> bool {
        matches!(self, NetworkStatus::Removed | NetworkStatus::AlreadyAbsent)
    }

    pub fn label(&self) -> &'static str {
        match self {
            NetworkStatus::Removed => "removed",
            NetworkStatus::AlreadyAbsent => "already_absent",
            NetworkStatus::SkippedNotEmpty { .. } => "skipped_not_empty",
            NetworkStatus::Failed { .. } => "failed",
            NetworkStatus::NotAttempted => "not_attempted",
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerOutcome {
    pub container_id: String,
    #[serde(flatten)]
    pub status: ContainerStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkOutcome {
    pub network_id: String,
    #[serde(flatten)]
    pub status: NetworkStatus,
}

/// A resource named in a failure report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Resource {
    Container(String),
    Network(String),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Container(id) => write!(f, "container {}", id),
            Resource::Network(id) => write!(f, "network {}", id),
        }
    }
}

/// One failed resource and the reason it failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFailure {
    pub resource: Resource,
    pub reason: FailureReason,
}

/// Everything one teardown call did, one status per requested resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownOutcome {
    pub teardown_id: Uuid,
    /// Container statuses in request order
    pub containers: Vec<ContainerOutcome>,
    pub network: NetworkOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TeardownOutcome {
    pub fn container_status(&self, container_id: &str) -> Option<&ContainerStatus> {
        self.containers
            .iter()
            .find(|c| c.container_id == container_id)
            .map(|c| &c.status)
    }

    /// Any resource recorded as failed
    pub fn has_failures(&self) -> bool {
        self.network.status.is_failure() || self.containers.iter().any(|c| c.status.is_failure())
    }

    /// Every requested resource is gone from the engine
    pub fn is_clean(&self) -> bool {
        self.network.status.is_gone() && self.containers.iter().all(|c| c.status.is_gone())
    }

    /// Failed resources with their reasons, containers first
    pub fn failures(&self) -> Vec<ResourceFailure> {
        let mut failures: Vec<ResourceFailure> = self
            .containers
            .iter()
            .filter_map(|c| match &c.status {
                ContainerStatus::Failed { reason } => Some(ResourceFailure {
                    resource: Resource::Container(c.container_id.clone()),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect();

        if let NetworkStatus::Failed { reason } = &self.network.status {
            failures.push(ResourceFailure {
                resource: Resource::Network(self.network.network_id.clone()),
                reason: reason.clone(),
            });
        }

        failures
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at).to_std().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};

    fn outcome(containers: Vec<(&str, ContainerStatus)>, network: NetworkStatus) -> TeardownOutcome {
        let now = Utc::now();
        TeardownOutcome {
            teardown_id: Uuid::new_v4(),
            containers: containers
                .into_iter()
                .map(|(id, status)| ContainerOutcome {
                    container_id: id.to_string(),
                    status,
                })
                .collect(),
            network: NetworkOutcome {
                network_id: "n1".to_string(),
                status: network,
            },
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_request_validation() {
        assert_ok!(TeardownRequest::new(["c1", "c2"], "n1"));
        assert_ok!(TeardownRequest::new(Vec::<String>::new(), "n1"));
        assert_err!(TeardownRequest::new(["c1"], ""));
        assert_err!(TeardownRequest::new(["c1"], "   "));
        assert_err!(TeardownRequest::new(["c1", ""], "n1"));
        assert_err!(TeardownRequest::new(["c1", "c2", "c1"], "n1"));
    }

    #[test]
    fn test_request_preserves_order() {
        let request = TeardownRequest::new(["web", "db", "cache"], "n1").unwrap();
        assert_eq!(request.containers(), &["web", "db", "cache"]);
        assert_eq!(request.network(), "n1");
        assert_eq!(request.grace_period(), None);
        assert!(!request.guard_shared_network());
    }

    #[test]
    fn test_request_deserialization_is_validated() {
        let request: TeardownRequest = serde_json::from_str(
            r#"{"containers":["c1"],"network":"n1","grace_period_seconds":5,"guard_shared_network":true}"#,
        )
        .unwrap();
        assert_eq!(request.grace_period(), Some(Duration::from_secs(5)));
        assert!(request.guard_shared_network());

        let duplicate = serde_json::from_str::<TeardownRequest>(r#"{"containers":["c1","c1"],"network":"n1"}"#);
        assert!(duplicate.is_err());

        let no_network = serde_json::from_str::<TeardownRequest>(r#"{"containers":["c1"],"network":""}"#);
        assert!(no_network.is_err());
    }

    #[test]
    fn test_failure_reason_from_engine_error() {
        let reason = FailureReason::from(&EngineError::Canceled);
        assert_eq!(reason, FailureReason::canceled());
        assert_eq!(reason.to_string(), "canceled");

        let reason = FailureReason::from(&EngineError::InUse("c1".to_string()));
        assert_eq!(reason.kind, FailureKind::InUse);

        let reason = FailureReason::from(&EngineError::Timeout("c1".to_string()));
        assert_eq!(reason.kind, FailureKind::Timeout);
    }

    #[test]
    fn test_outcome_failures() {
        let engine_failure = FailureReason::new(FailureKind::Engine, "boom");
        let outcome = outcome(
            vec![
                ("c1", ContainerStatus::failed(engine_failure.clone())),
                ("c2", ContainerStatus::Removed),
            ],
            NetworkStatus::SkippedNotEmpty {
                endpoints: vec!["c1".to_string()],
            },
        );

        assert!(outcome.has_failures());
        assert!(!outcome.is_clean());
        assert_eq!(
            outcome.failures(),
            vec![ResourceFailure {
                resource: Resource::Container("c1".to_string()),
                reason: engine_failure,
            }]
        );
        assert_eq!(outcome.container_status("c2"), Some(&ContainerStatus::Removed));
        assert_eq!(outcome.container_status("c3"), None);
    }

    #[test]
    fn test_clean_outcome() {
        let outcome = outcome(
            vec![("c1", ContainerStatus::Removed), ("c2", ContainerStatus::AlreadyAbsent)],
            NetworkStatus::AlreadyAbsent,
        );
        assert!(outcome.is_clean());
        assert!(!outcome.has_failures());
        assert!(outcome.failures().is_empty());
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = outcome(
            vec![("c1", ContainerStatus::Removed)],
            NetworkStatus::SkippedNotEmpty {
                endpoints: vec!["other".to_string()],
            },
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["containers"][0]["container_id"], "c1");
        assert_eq!(json["containers"][0]["status"], "removed");
        assert_eq!(json["network"]["status"], "skipped_not_empty");
        assert_eq!(json["network"]["endpoints"][0], "other");
    }
}
