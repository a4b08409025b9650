//! Teardown - stop and remove a local task's containers and their network
//!
//! Loads configuration, connects to the container engine and prints the
//! teardown outcome. The exit code follows the configured failure policy.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use teardown_orchestrator::config::{FailurePolicy, TeardownConfig};
use teardown_orchestrator::logging::init_logging;
use teardown_orchestrator::models::{ContainerStatus, NetworkStatus, TeardownOutcome};
use teardown_orchestrator::{DockerEngine, TeardownOptions, TeardownOrchestrator, TeardownRequest};

/// Stop and remove a local task's containers, then their shared network
#[derive(Parser)]
#[command(name = "teardown")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Stop and remove a local task's containers and their shared network", long_about = None)]
struct Cli {
    /// Containers to stop and remove (ids or names)
    containers: Vec<String>,

    /// Network to remove once its containers are gone
    #[arg(short, long)]
    network: Option<String>,

    /// Stop grace period in seconds (engine default when omitted)
    #[arg(short, long)]
    grace: Option<u64>,

    /// Abandon teardown after this many seconds
    #[arg(short, long)]
    deadline: Option<u64>,

    /// Tear containers down one at a time
    #[arg(long)]
    sequential: bool,

    /// Maximum number of containers torn down at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Leave everything in place while other workloads use the network
    #[arg(long)]
    guard: bool,

    /// Report failures but exit successfully
    #[arg(long)]
    best_effort: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    output: String,

    /// Engine address (unix socket path, unix://, tcp:// or http:// URL)
    #[arg(long)]
    host: Option<String>,

    /// Additional configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Command line flags take precedence over files and environment
    fn apply(&self, config: &mut TeardownConfig) {
        if let Some(network) = &self.network {
            config.network = network.clone();
        }
        if let Some(grace) = self.grace {
            config.grace_period_seconds = Some(grace);
        }
        if let Some(deadline) = self.deadline {
            config.deadline_seconds = Some(deadline);
        }
        if self.sequential {
            config.parallel = false;
        }
        if let Some(concurrency) = self.concurrency {
            config.max_concurrency = concurrency;
        }
        if self.guard {
            config.guard_shared_network = true;
        }
        if self.best_effort {
            config.failure_policy = FailurePolicy::BestEffort;
        }
        if let Some(host) = &self.host {
            config.engine.host = Some(host.clone());
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.output != "text" && cli.output != "json" {
        anyhow::bail!("Unknown output format: {}", cli.output);
    }

    // Load configuration
    let mut config = TeardownConfig::load_with(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    // Initialize logging
    init_logging(&config.log_level, config.log_format)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting teardown");

    if config.metrics.textfile.is_some() {
        teardown_orchestrator::metrics::init_prometheus()?;
    }

    // The configured grace period reaches the engine through TeardownOptions
    let request = TeardownRequest::new(cli.containers.clone(), config.network.clone())?
        .guarded(config.guard_shared_network);

    let engine = DockerEngine::connect(&config.engine).context("Failed to set up engine client")?;
    let orchestrator = TeardownOrchestrator::new(Arc::new(engine), TeardownOptions::from(&config));

    // Ctrl+C / SIGTERM abandon in-flight engine calls
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            warn!("Shutdown signal received, canceling teardown");
            cancel.cancel();
        }
    });

    let outcome = orchestrator.teardown_with_cancel(&request, cancel).await;

    if let Some(path) = &config.metrics.textfile {
        if let Err(e) = teardown_orchestrator::metrics::write_textfile(path) {
            warn!(error = %e, "Failed to write metrics textfile");
        }
    }

    if cli.output == "json" {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    Ok(exit_code(&outcome, config.failure_policy))
}

fn exit_code(outcome: &TeardownOutcome, policy: FailurePolicy) -> ExitCode {
    match policy {
        FailurePolicy::Strict if outcome.has_failures() => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}

fn print_outcome(outcome: &TeardownOutcome) {
    println!("{}", "=".repeat(60).bright_blue());
    println!("{} {}", "Teardown ID:".bright_cyan(), outcome.teardown_id);
    println!("{} {}ms", "Duration:".bright_cyan(), outcome.duration().as_millis());

    if !outcome.containers.is_empty() {
        println!("\n{}", "CONTAINERS:".bright_green().bold());
        for container in &outcome.containers {
            let status = match &container.status {
                ContainerStatus::Removed => "removed".green(),
                ContainerStatus::AlreadyAbsent => "already absent".green(),
                ContainerStatus::Failed { reason } => format!("failed: {}", reason).red(),
                ContainerStatus::NotAttempted => "not attempted".yellow(),
            };
            println!("  {:<40} {}", container.container_id, status);
        }
    }

    println!("\n{}", "NETWORK:".bright_green().bold());
    let status = match &outcome.network.status {
        NetworkStatus::Removed => "removed".green(),
        NetworkStatus::AlreadyAbsent => "already absent".green(),
        NetworkStatus::SkippedNotEmpty { endpoints } => {
            format!("left in place, still attached: {}", endpoints.join(", ")).yellow()
        }
        NetworkStatus::Failed { reason } => format!("failed: {}", reason).red(),
        NetworkStatus::NotAttempted => "not attempted".yellow(),
    };
    println!("  {:<40} {}", outcome.network.network_id, status);

    let failures = outcome.failures();
    if !failures.is_empty() {
        println!("\n{}", "NEEDS MANUAL CLEANUP:".bright_red().bold());
        for failure in failures {
            println!("  {}: {}", failure.resource, failure.reason);
        }
    }

    println!("{}", "=".repeat(60).bright_blue());
}

/// Resolve when the process is asked to stop
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
