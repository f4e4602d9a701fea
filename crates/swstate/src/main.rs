//! swstated entry point.
//!
//! Loads the agent configuration, restores the last state dump, starts the
//! update pipeline with its observers, applies the desired configuration and
//! runs the port remediator until interrupted. On shutdown the final
//! snapshot is written back to the state dump.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use swstate::apply_config::apply_config;
use swstate::audit::{init_logging, AuditCategory, AuditOutcome, AuditRecord, LogFormat};
use swstate::config::AgentConfig;
use swstate::convergence::PortRemediator;
use swstate::observers::{MirrorResolver, RemoteNeighborSync, RouteRefTracker, TeFlowResolver};
use swstate::persist::{load_from_file, save_to_file};
use swstate::{
    audit_log, error_log, info_log, warn_log, AgentContext, Frozen, NullHwSwitch, ScopeResolver,
    SwitchState, UpdatePipeline,
};

/// Switch control-plane state daemon
#[derive(Parser, Debug)]
#[command(name = "swstated")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Agent configuration file (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// Human-readable logs instead of JSON
    #[arg(long)]
    pretty: bool,

    /// State dump path; overrides the config file
    #[arg(long)]
    state_path: Option<PathBuf>,

    /// Run without a hardware programming layer
    #[arg(long)]
    simulation: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match AgentConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("swstated: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => AgentConfig::default(),
    };

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.agent.log_level.clone());
    let format = if args.pretty || config.agent.pretty_logs {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    };
    init_logging(&log_level, format);

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error_log!("swstated", error = %format!("{:#}", e), "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, config: AgentConfig) -> anyhow::Result<()> {
    if !args.simulation {
        bail!("no hardware programming layer is available in this build; pass --simulation");
    }

    info_log!(
        "swstated",
        version = env!("CARGO_PKG_VERSION"),
        switches = config.switches.len(),
        "Starting switch state daemon"
    );
    audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, "swstated", "start")
        .with_outcome(AuditOutcome::Success));

    let resolver = Arc::new(ScopeResolver::new(config.switch_infos()).context("invalid switch table")?);
    let state_path = args.state_path.clone().or_else(|| config.agent.state_path.clone());

    let initial = match &state_path {
        Some(path) => load_from_file(path)
            .with_context(|| format!("failed to reload state from {}", path.display()))?,
        None => None,
    };
    let initial = initial.unwrap_or_else(|| Frozen::new(SwitchState::default()));

    let pipeline = UpdatePipeline::start(initial, Arc::new(NullHwSwitch), config.pipeline.clone())
        .context("failed to start update pipeline")?;

    let snapshot = pipeline.snapshot();
    pipeline.register_observer(Arc::new(RemoteNeighborSync::new(
        pipeline.submitter(),
        Arc::clone(&resolver),
        &snapshot,
    )));
    pipeline.register_observer(Arc::new(MirrorResolver::new(pipeline.submitter())));
    pipeline.register_observer(Arc::new(RouteRefTracker::seeded(&snapshot)));
    pipeline.register_observer(Arc::new(TeFlowResolver::new(pipeline.submitter())));
    info_log!("swstated", observers = ?pipeline.observer_names(), "Observers registered");

    let remediation = config.remediation.clone();
    let ctx = AgentContext::with_config(Arc::clone(&resolver), pipeline.clone(), Arc::new(config));
    apply_config(&ctx).await.context("failed to apply configuration")?;

    let remediator = if remediation.enabled {
        Some(PortRemediator::start(pipeline.clone(), remediation.interval())?)
    } else {
        warn_log!("swstated", "Port remediation disabled");
        None
    };

    info_log!("swstated", "Running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    warn_log!("swstated", "Received SIGINT, shutting down gracefully");

    if let Some(remediator) = remediator {
        tokio::task::spawn_blocking(move || remediator.shutdown()).await??;
    }
    pipeline.shutdown().await;

    let stats = pipeline.stats();
    if let Some(path) = &state_path {
        save_to_file(&pipeline.snapshot(), path)
            .with_context(|| format!("failed to save state to {}", path.display()))?;
    }

    info_log!(
        "swstated",
        published = stats.batches_published,
        applied = stats.applied,
        rejected = stats.rejected,
        hw_failed = stats.hw_failed,
        "Shutdown complete"
    );
    audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, "swstated", "stop")
        .with_outcome(AuditOutcome::Success));
    Ok(())
}
