use std::collections::BTreeSet;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tokio::signal;
use tracing::{debug, error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use deployflow::chain::{ArtifactDirectory, JsonRpcChainClient};
use deployflow::cli::{tag_set, Cli, Commands, Display, LogFormat, OutputFormat};
use deployflow::config::DeployConfig;
use deployflow::errors::{RegistryError, StoreError};
use deployflow::events::LoggingEventSink;
use deployflow::executor::{DeploymentExecutor, ExecutorConfig};
use deployflow::orchestrator::{FailureMode, Orchestrator};
use deployflow::registry::TaskRegistry;
use deployflow::resolver::ParameterResolver;
use deployflow::store::{ArtifactStore, FileArtifactStore};

/// Endpoint used for dry runs on networks without an `rpc_url`.
const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Exit code for errors that stop a command before any task runs.
const STARTUP_FAILURE: u8 = 2;

/// Exit code after Ctrl+C or SIGTERM.
const INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_format);

    let display = Display::new();

    // Dropping the run future on a signal releases the network lock.
    let outcome = tokio::select! {
        outcome = run(cli, &display) => outcome,
        () = shutdown_signal() => {
            display.print_warning(
                "Interrupted. Submitted deployments are journaled and resume on the next deploy.",
            );
            return ExitCode::from(INTERRUPTED);
        }
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            display.print_error(&format!("{e:#}"));
            if let Some(info) = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<RegistryError>())
                .and_then(RegistryError::error_info)
            {
                display.print_error_info(info);
            }
            if let Some(hint) = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<StoreError>())
                .and_then(StoreError::fix_hint)
            {
                display.print_info(&hint);
            }
            ExitCode::from(STARTUP_FAILURE)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => warn!("Received Ctrl+C"),
        () = terminate => warn!("Received SIGTERM"),
    }
}

fn init_logging(verbose: bool, format: LogFormat) {
    let default = if verbose {
        "deployflow=debug"
    } else {
        "deployflow=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

async fn run(cli: Cli, display: &Display) -> Result<u8> {
    let config = DeployConfig::load(&cli.config).await?;
    let registry = Arc::new(config.build_registry()?);
    debug!(tasks = registry.len(), "Registry ready");

    match cli.command {
        Commands::Deploy {
            network,
            tags,
            dry_run,
            force,
            fail_fast,
        } => {
            let options = DeployFlags {
                dry_run,
                force,
                fail_fast,
            };
            cmd_deploy(display, cli.output, &config, registry, &network, &tag_set(&tags), options).await
        }
        Commands::Status { network } => cmd_status(display, cli.output, &config, &network).await,
        Commands::Unlock { network } => cmd_unlock(display, &config, &network).await,
        Commands::Tasks { tags } => cmd_tasks(display, cli.output, &registry, &tag_set(&tags)),
    }
}

#[derive(Debug, Clone, Copy)]
struct DeployFlags {
    dry_run: bool,
    force: bool,
    fail_fast: bool,
}

async fn cmd_deploy(
    display: &Display,
    output: OutputFormat,
    config: &DeployConfig,
    registry: Arc<TaskRegistry>,
    network: &str,
    tags: &BTreeSet<String>,
    flags: DeployFlags,
) -> Result<u8> {
    let rpc_url = match config.rpc_url(network) {
        Some(url) => url,
        None if flags.dry_run => DEFAULT_RPC_URL,
        None => anyhow::bail!("network '{network}' has no rpc_url configured"),
    };

    let store = FileArtifactStore::open(&config.deployments_dir).await?;
    let chain = JsonRpcChainClient::new(rpc_url, config.poll_interval())?;
    let artifacts = ArtifactDirectory::new(&config.artifacts_dir);
    let events = Arc::new(LoggingEventSink::debug());

    let executor = DeploymentExecutor::new(
        ParameterResolver::new(registry.clone()),
        Arc::new(store),
        Arc::new(chain),
        Arc::new(artifacts),
    )
    .with_config(
        ExecutorConfig::default()
            .with_confirmation_timeout(config.confirmation_timeout())
            .with_force_redeploy(flags.force)
            .with_dry_run(flags.dry_run),
    )
    .with_event_sink(events.clone());

    let failure_mode = if flags.fail_fast {
        FailureMode::FailFast
    } else {
        config.failure_mode
    };

    let orchestrator = config
        .network_profiles()
        .fold(
            Orchestrator::new(registry, executor, Arc::new(config.accounts())),
            |orchestrator, (name, profile)| orchestrator.with_network(name, profile),
        )
        .with_failure_mode(failure_mode)
        .with_event_sink(events);

    let result = orchestrator.run(tags, network).await?;

    match output {
        OutputFormat::Text => display.print_run(&result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result.report())?),
    }

    Ok(result.exit_code())
}

async fn cmd_status(display: &Display, output: OutputFormat, config: &DeployConfig, network: &str) -> Result<u8> {
    let store = FileArtifactStore::open(&config.deployments_dir).await?;
    let records = store.list(network).await?;
    let pending = store.list_pending(network).await?;

    match output {
        OutputFormat::Text => {
            display.print_header(&format!("Deployments on {network}"));
            if records.is_empty() && pending.is_empty() {
                display.print_info("Nothing deployed yet.");
            }
            for record in &records {
                display.print_record(record);
            }
            for entry in &pending {
                display.print_pending(entry);
            }
        }
        OutputFormat::Json => {
            let doc = json!({ "network": network, "records": records, "pending": pending });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }

    Ok(0)
}

async fn cmd_unlock(display: &Display, config: &DeployConfig, network: &str) -> Result<u8> {
    let store = FileArtifactStore::open(&config.deployments_dir).await?;
    match store.break_lock(network).await? {
        Some(holder) => display.print_success(&format!("Removed lock on {network} ({holder})")),
        None => display.print_info(&format!("{network} is not locked")),
    }
    Ok(0)
}

fn cmd_tasks(display: &Display, output: OutputFormat, registry: &TaskRegistry, tags: &BTreeSet<String>) -> Result<u8> {
    let selected = registry.select_by_tags(tags);
    let expanded = registry.with_dependencies(&selected);
    let ordered = registry
        .resolve_dependency_order(&expanded)
        .context("ordering tasks")?;

    match output {
        OutputFormat::Text => {
            display.print_header(&format!("{} task(s)", ordered.len()));
            for (i, task) in ordered.iter().enumerate() {
                display.print_task(i + 1, task);
            }
        }
        OutputFormat::Json => {
            let doc: Vec<_> = ordered
                .iter()
                .map(|task| {
                    json!({
                        "name": task.name(),
                        "contract": task.contract(),
                        "tags": task.tags(),
                        "dependencies": task.dependencies(),
                        "networks": task.parameters().networks(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }

    Ok(0)
}
