//! Teardown orchestration
//!
//! Stops and removes a task's containers, then removes their shared network:
//! - Container stop+remove runs sequentially or as one task per container
//! - The network step starts only after every container has a status
//! - A network with attached endpoints is left in place
//! - Failures are collected into the outcome, never propagated

mod collector;
mod orchestrator;
mod steps;

pub use orchestrator::{TeardownOptions, TeardownOrchestrator};
