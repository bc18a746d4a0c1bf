//! compute-smoke: security-group lifecycle smoke tests
//!
//! Runs the scenario catalogue against an in-memory simulator or a live
//! compute endpoint, and sweeps resources left behind by crashed runs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use compute_smoke::api::{ComputeApi, HttpComputeClient, SimulatedCompute};
use compute_smoke::config::{BackendConfig, BackendKind, HarnessConfig, ServerSettings, WaitSettings};
use compute_smoke::orphans::{OrphanSweeper, SweepConfig};
use compute_smoke::runner::Runner;
use compute_smoke::scenario::{ScenarioFilter, all_scenarios};
use compute_smoke_common::defaults::{
    DEFAULT_DELETION_TIMEOUT_SECS, DEFAULT_FLAVOR_REF, DEFAULT_IMAGE_REF, DEFAULT_NAME_PREFIX,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_STATUS_TIMEOUT_SECS,
    DEFAULT_TERMINATION_TIMEOUT_SECS,
};
use compute_smoke_common::{Service, Tag, parse_services};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "compute-smoke")]
#[command(about = "Lifecycle smoke tests for a compute security-group API")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Where to send API calls
#[derive(clap::Args, Debug)]
struct BackendArgs {
    /// Backend to drive (sim, http)
    #[arg(long, default_value = "sim")]
    backend: BackendKind,

    /// Compute API base URL, required for the http backend
    #[arg(long, env = "COMPUTE_SMOKE_ENDPOINT")]
    endpoint: Option<String>,

    /// Pre-issued auth token sent as X-Auth-Token
    #[arg(long, env = "COMPUTE_SMOKE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,
}

impl From<BackendArgs> for BackendConfig {
    fn from(args: BackendArgs) -> Self {
        Self {
            kind: args.backend,
            endpoint: args.endpoint,
            token: args.token,
            request_timeout: Duration::from_secs(args.request_timeout_secs),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

/// Arguments for the run command (extracted to reduce enum size)
#[derive(clap::Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    backend: BackendArgs,

    /// Only run scenarios carrying this tag (repeatable)
    #[arg(long)]
    tag: Vec<Tag>,

    /// Only run scenarios limited to these services (repeatable)
    #[arg(long)]
    service: Vec<Service>,

    /// Only run scenarios whose name contains this substring
    #[arg(long)]
    filter: Option<String>,

    /// Comma-separated services available on the target cloud
    #[arg(long, default_value = "network,compute")]
    enabled_services: String,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Prefix for generated resource names
    #[arg(long, default_value = DEFAULT_NAME_PREFIX)]
    name_prefix: String,

    /// Image to boot servers from
    #[arg(long, default_value = DEFAULT_IMAGE_REF)]
    image_ref: String,

    /// Flavor to boot servers with
    #[arg(long, default_value = DEFAULT_FLAVOR_REF)]
    flavor_ref: String,

    /// Timeout in seconds for server status changes
    #[arg(long, default_value_t = DEFAULT_STATUS_TIMEOUT_SECS)]
    status_timeout_secs: u64,

    /// Delay in milliseconds between status polls
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    poll_interval_ms: u64,

    /// Leave created resources on the backend instead of deleting them
    #[arg(long)]
    keep_resources: bool,
}

impl RunArgs {
    fn harness_config(&self) -> Result<HarnessConfig> {
        let enabled_services = parse_services(&self.enabled_services)
            .with_context(|| format!("invalid --enabled-services '{}'", self.enabled_services))?;

        Ok(HarnessConfig {
            name_prefix: self.name_prefix.clone(),
            waits: WaitSettings {
                poll_interval: Duration::from_millis(self.poll_interval_ms),
                status_timeout: Duration::from_secs(self.status_timeout_secs),
                termination_timeout: Duration::from_secs(DEFAULT_TERMINATION_TIMEOUT_SECS),
                deletion_timeout: Duration::from_secs(DEFAULT_DELETION_TIMEOUT_SECS),
            },
            server: ServerSettings {
                image_ref: self.image_ref.clone(),
                flavor_ref: self.flavor_ref.clone(),
            },
            enabled_services,
            keep_resources: self.keep_resources,
        })
    }

    fn filter(&self) -> ScenarioFilter {
        ScenarioFilter {
            tags: self.tag.clone(),
            services: self.service.clone(),
            name_contains: self.filter.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run smoke scenarios
    Run(Box<RunArgs>),

    /// List available scenarios
    List {
        /// Only list scenarios carrying this tag (repeatable)
        #[arg(long)]
        tag: Vec<Tag>,

        /// Only list scenarios limited to these services (repeatable)
        #[arg(long)]
        service: Vec<Service>,
    },

    /// Delete resources left behind by crashed runs (matched by name prefix)
    CleanupOrphans {
        #[command(flatten)]
        backend: BackendArgs,

        /// Name prefix identifying harness resources
        #[arg(long, default_value = DEFAULT_NAME_PREFIX)]
        name_prefix: String,

        /// Actually delete resources (default is dry-run)
        #[arg(long)]
        execute: bool,
    },
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            print_error(&e);
            std::process::exit(1);
        }
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

/// Returns whether the command succeeded
async fn run() -> Result<bool> {
    let args = Args::parse();

    // Logs go to stderr so `--format json` output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Run(run_args) => {
            let config = run_args.harness_config()?;
            let filter = run_args.filter();
            let format = run_args.format;
            let backend = BackendConfig::from(run_args.backend);

            info!(
                backend = %backend.kind,
                name_prefix = %config.name_prefix,
                enabled_services = ?config.enabled_services,
                keep_resources = config.keep_resources,
                "Starting smoke run"
            );

            match backend.kind {
                BackendKind::Sim => {
                    handle_run(Arc::new(SimulatedCompute::new()), config, &filter, format).await
                }
                BackendKind::Http => {
                    handle_run(Arc::new(http_client(&backend)?), config, &filter, format).await
                }
            }
        }

        Command::List { tag, service } => {
            handle_list(&ScenarioFilter {
                tags: tag,
                services: service,
                name_contains: None,
            });
            Ok(true)
        }

        Command::CleanupOrphans {
            backend,
            name_prefix,
            execute,
        } => {
            let backend = BackendConfig::from(backend);
            let config = SweepConfig {
                prefix: name_prefix,
                dry_run: !execute,
            };
            match backend.kind {
                BackendKind::Sim => {
                    handle_cleanup_orphans(Arc::new(SimulatedCompute::new()), &config).await
                }
                BackendKind::Http => {
                    handle_cleanup_orphans(Arc::new(http_client(&backend)?), &config).await
                }
            }
        }
    }
}

fn http_client(backend: &BackendConfig) -> Result<HttpComputeClient> {
    let endpoint = backend
        .endpoint
        .clone()
        .context("--endpoint (or COMPUTE_SMOKE_ENDPOINT) is required for the http backend")?;
    HttpComputeClient::new(endpoint, backend.token.clone(), backend.request_timeout)
        .context("failed to build compute API client")
}

/// Handle the run command
async fn handle_run<C: ComputeApi + 'static>(
    api: Arc<C>,
    config: HarnessConfig,
    filter: &ScenarioFilter,
    format: OutputFormat,
) -> Result<bool> {
    let scenarios = filter.apply(all_scenarios::<C>());
    if scenarios.is_empty() {
        println!("No scenarios match the given filters.");
        return Ok(true);
    }

    let report = Runner::new(api, config).run(&scenarios).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => print!("{}", report.render_table()),
    }

    Ok(report.is_success())
}

/// Handle the list command
fn handle_list(filter: &ScenarioFilter) {
    let scenarios = filter.apply(all_scenarios::<SimulatedCompute>());

    println!("{:<40} {:<12} {:<10} DESCRIPTION", "SCENARIO", "TAGS", "SERVICES");
    println!("{}", "-".repeat(90));
    for s in &scenarios {
        let tags: Vec<_> = s.tags.iter().map(|t| t.to_string()).collect();
        let services: Vec<_> = s.services.iter().map(|svc| svc.to_string()).collect();
        println!(
            "{:<40} {:<12} {:<10} {}",
            s.name,
            tags.join(","),
            services.join(","),
            s.description
        );
    }
    println!("\nTotal: {} scenarios", scenarios.len());
}

/// Handle the cleanup-orphans command
async fn handle_cleanup_orphans<C: ComputeApi>(api: Arc<C>, config: &SweepConfig) -> Result<bool> {
    let mode = if config.dry_run { "DRY-RUN" } else { "EXECUTE" };
    info!(prefix = %config.prefix, mode, "Cleaning up orphaned resources");

    let sweeper = OrphanSweeper::new(api, WaitSettings::default().termination());
    let report = sweeper
        .sweep(config)
        .await
        .context("orphan sweep failed")?;

    println!("\n=== Cleanup Report ===");
    println!("Mode: {}", mode);
    println!("Prefix: {}", config.prefix);
    println!();
    println!("Resources found: {}", report.found.len());
    println!("  Servers:          {}", report.servers);
    println!("  Security Groups:  {}", report.security_groups);
    println!();
    if config.dry_run {
        println!("Skipped: {} (dry-run mode)", report.skipped);
        println!();
        println!("Run with --execute to actually delete resources.");
    } else {
        println!("Deleted: {}", report.deleted);
        println!("Failed:  {}", report.failed);
    }

    Ok(report.failed == 0)
}
