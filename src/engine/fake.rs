//! In-memory engine that records every call, for tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{EngineClient, EngineError, Endpoint, NetworkInfo};

/// An engine call as observed by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Stop(String),
    Remove(String),
    Inspect(String),
    RemoveNetwork(String),
}

#[derive(Debug, Default)]
struct FakeState {
    /// Container id -> running
    containers: HashMap<String, bool>,
    /// Network id -> attached container ids
    networks: HashMap<String, BTreeMap<String, Option<String>>>,
    stop_failures: HashMap<String, EngineError>,
    remove_failures: HashMap<String, EngineError>,
    inspect_failure: Option<EngineError>,
    remove_network_failure: Option<EngineError>,
    hanging_stops: HashSet<String>,
    panicking_stops: HashSet<String>,
    calls: Vec<Call>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeEngine {
    state: Mutex<FakeState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// A network with running containers attached to it
    pub fn with_network(self, network_id: &str, containers: &[&str]) -> Self {
        {
            let mut state = self.state.try_lock().expect("fake engine in use during setup");
            let endpoints = state.networks.entry(network_id.to_string()).or_default();
            for id in containers {
                endpoints.insert(id.to_string(), Some(format!("{}-name", id)));
            }
            for id in containers {
                state.containers.insert(id.to_string(), true);
            }
        }
        self
    }

    /// A running container that is not attached to any network
    pub fn with_container(self, container_id: &str) -> Self {
        self.state
            .try_lock()
            .expect("fake engine in use during setup")
            .containers
            .insert(container_id.to_string(), true);
        self
    }

    pub fn fail_stop(self, container_id: &str, err: EngineError) -> Self {
        self.state
            .try_lock()
            .expect("fake engine in use during setup")
            .stop_failures
            .insert(container_id.to_string(), err);
        self
    }

    pub fn fail_remove(self, container_id: &str, err: EngineError) -> Self {
        self.state
            .try_lock()
            .expect("fake engine in use during setup")
            .remove_failures
            .insert(container_id.to_string(), err);
        self
    }

    pub fn fail_inspect(self, err: EngineError) -> Self {
        self.state.try_lock().expect("fake engine in use during setup").inspect_failure = Some(err);
        self
    }

    pub fn fail_remove_network(self, err: EngineError) -> Self {
        self.state
            .try_lock()
            .expect("fake engine in use during setup")
            .remove_network_failure = Some(err);
        self
    }

    /// Stop calls for this container never complete
    pub fn hang_stop(self, container_id: &str) -> Self {
        self.state
            .try_lock()
            .expect("fake engine in use during setup")
            .hanging_stops
            .insert(container_id.to_string());
        self
    }

    /// Stop calls for this container panic
    pub fn panic_stop(self, container_id: &str) -> Self {
        self.state
            .try_lock()
            .expect("fake engine in use during setup")
            .panicking_stops
            .insert(container_id.to_string());
        self
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.state.lock().await.calls.clone()
    }

    pub async fn container_exists(&self, container_id: &str) -> bool {
        self.state.lock().await.containers.contains_key(container_id)
    }

    pub async fn network_exists(&self, network_id: &str) -> bool {
        self.state.lock().await.networks.contains_key(network_id)
    }
}

#[async_trait]
impl EngineClient for FakeEngine {
    async fn stop_container(
        &self,
        container_id: &str,
        _grace_period: Option<Duration>,
    ) -> Result<(), EngineError> {
        let hang = {
            let mut state = self.state.lock().await;
            state.calls.push(Call::Stop(container_id.to_string()));

            if let Some(err) = state.stop_failures.get(container_id) {
                return Err(err.clone());
            }
            if state.panicking_stops.contains(container_id) {
                drop(state);
                panic!("engine panicked stopping {}", container_id);
            }
            match state.containers.get_mut(container_id) {
                Some(running) => *running = false,
                None => return Err(EngineError::NotFound(container_id.to_string())),
            }
            state.hanging_stops.contains(container_id)
        };

        if hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn remove_container(&self, container_id: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::Remove(container_id.to_string()));

        if let Some(err) = state.remove_failures.get(container_id) {
            return Err(err.clone());
        }
        match state.containers.get(container_id) {
            None => return Err(EngineError::NotFound(container_id.to_string())),
            Some(true) => return Err(EngineError::InUse(container_id.to_string())),
            Some(false) => {}
        }

        state.containers.remove(container_id);
        for endpoints in state.networks.values_mut() {
            endpoints.remove(container_id);
        }
        Ok(())
    }

    async fn inspect_network(&self, network_id: &str) -> Result<NetworkInfo, EngineError> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::Inspect(network_id.to_string()));

        if let Some(err) = &state.inspect_failure {
            return Err(err.clone());
        }
        let endpoints = state
            .networks
            .get(network_id)
            .ok_or_else(|| EngineError::NotFound(network_id.to_string()))?;

        Ok(NetworkInfo {
            id: network_id.to_string(),
            name: network_id.to_string(),
            endpoints: endpoints
                .iter()
                .map(|(id, name)| Endpoint {
                    container_id: id.clone(),
                    name: name.clone(),
                })
                .collect(),
        })
    }

    async fn remove_network(&self, network_id: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::RemoveNetwork(network_id.to_string()));

        if let Some(err) = &state.remove_network_failure {
            return Err(err.clone());
        }
        let attached = match state.networks.get(network_id) {
            Some(endpoints) => endpoints.len(),
            None => return Err(EngineError::NotFound(network_id.to_string())),
        };
        if attached > 0 {
            return Err(EngineError::InUse(format!("{} has active endpoints", network_id)));
        }

        state.networks.remove(network_id);
        Ok(())
    }
}
