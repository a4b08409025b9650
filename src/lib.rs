//! Teardown Orchestrator library
//!
//! Cleanly stops and removes the containers of a local task run and then
//! their shared network, reporting every partial failure instead of aborting.

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod teardown;

pub use engine::{DockerEngine, EngineClient, EngineError};
pub use error::TeardownError;
pub use models::{ContainerStatus, NetworkStatus, TeardownOutcome, TeardownRequest};
pub use teardown::{TeardownOptions, TeardownOrchestrator};
