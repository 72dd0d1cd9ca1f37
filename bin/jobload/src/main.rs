//! ---
//! jl_section: "01-core-functionality"
//! jl_subsection: "binary"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Binary entrypoint for the jobload operator CLI."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use jobload_common::{
    init_tracing, CatalogPopulationConfig, EventPopulationConfig, HarnessConfig, SecurityMode,
};
use jobload_harness::{Harness, RunReport};
use jobload_metrics::{new_registry, spawn_http_server};
use jobload_transport::PlatformConnector;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Provision a tenant fixture and drive synthetic load against the job platform",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Override the tenant identifier")]
    tenant: Option<String>,

    #[arg(long, value_enum, help = "Override transport security for every boundary")]
    security: Option<CliSecurity>,

    #[arg(long, value_enum, default_value_t = ReportFormat::Text, help = "Report output format")]
    format: ReportFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliSecurity {
    Plaintext,
    Tls,
}

impl From<CliSecurity> for SecurityMode {
    fn from(value: CliSecurity) -> Self {
        match value {
            CliSecurity::Plaintext => SecurityMode::Plaintext,
            CliSecurity::Tls => SecurityMode::Tls,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Provision the tenant fixture if it is absent")]
    Setup,
    #[command(about = "Provision the fixture, then run the configured populations")]
    Run(RunArgs),
    #[command(about = "Check whether the tenant exists on the control plane")]
    Verify,
    #[command(about = "Print the provisioning requests without contacting the platform")]
    Plan,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long, help = "Run the event-sender population")]
    events: bool,

    #[arg(long, help = "Run the catalog-mutator population")]
    catalog: bool,

    #[arg(long, help = "Concurrent event senders")]
    event_actors: Option<usize>,

    #[arg(long, value_name = "SECS", help = "Event population duration")]
    duration: Option<u64>,

    #[arg(long, help = "Concurrent catalog mutators")]
    catalog_actors: Option<usize>,

    #[arg(long, help = "Packages submitted per catalog mutator")]
    iterations: Option<u64>,

    #[arg(long, help = "Exit non-zero when any check failed")]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/jobload.toml"));
    candidates.push(PathBuf::from("configs/jobload.example.toml"));

    let loaded = HarnessConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    apply_overrides(&mut config, &cli);
    config.validate()?;

    init_tracing("jobload", &config.logging)?;
    info!(source = %loaded.source.display(), tenant = %config.tenant.id, "configuration loaded");

    let registry = new_registry();
    let connector = Arc::new(PlatformConnector::new(&config.target));
    connector.validate()?;
    let harness = Harness::from_config(&config, connector, &registry)?;

    let metrics_server = if config.metrics.enabled {
        Some(spawn_http_server(registry.clone(), config.metrics.listen)?)
    } else {
        None
    };

    let outcome = match &cli.command {
        Commands::Plan => {
            let plan = harness.plan()?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(())
        }
        Commands::Verify => verify(&harness).await,
        Commands::Setup => {
            let report = harness.setup_report().await?;
            emit(&report, cli.format)
        }
        Commands::Run(args) => {
            let report = harness.run(&config.scenario).await?;
            emit(&report, cli.format)?;
            if args.strict && report.has_failures() {
                Err(anyhow!(
                    "run {} finished with {} failed checks",
                    report.run_id,
                    report.failed()
                ))
            } else {
                Ok(())
            }
        }
    };

    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }
    outcome
}

fn apply_overrides(config: &mut HarnessConfig, cli: &Cli) {
    if let Some(tenant) = &cli.tenant {
        config.tenant.override_id(tenant.clone());
    }
    if let Some(security) = cli.security {
        config.target.security = security.into();
    }
    let Commands::Run(args) = &cli.command else {
        return;
    };

    let scenario = &mut config.scenario;
    if args.events || args.catalog {
        if !args.events {
            scenario.events = None;
        } else if scenario.events.is_none() {
            scenario.events = Some(EventPopulationConfig::default());
        }
        if !args.catalog {
            scenario.catalog = None;
        } else if scenario.catalog.is_none() {
            scenario.catalog = Some(CatalogPopulationConfig::default());
        }
    }
    if let Some(events) = scenario.events.as_mut() {
        if let Some(actors) = args.event_actors {
            events.actors = actors;
        }
        if let Some(secs) = args.duration {
            events.duration = std::time::Duration::from_secs(secs);
        }
    }
    if let Some(catalog) = scenario.catalog.as_mut() {
        if let Some(actors) = args.catalog_actors {
            catalog.actors = actors;
        }
        if let Some(iterations) = args.iterations {
            catalog.iterations = iterations;
        }
    }
}

async fn verify(harness: &Harness) -> Result<()> {
    let tenant = harness.context().tenant().id().to_owned();
    let reply = harness.verify().await?;
    if !reply.is_rpc_ok() {
        return Err(anyhow!("tenant lookup for {tenant} failed: {}", reply.status));
    }
    let found = reply.body.map(|tenants| tenants.len()).unwrap_or_default();
    if found == 0 {
        return Err(anyhow!("tenant {tenant} is not registered"));
    }
    println!("tenant {tenant} present ({found} match)");
    Ok(())
}

fn emit(report: &RunReport, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Text => print!("{}", report.render_text()),
        ReportFormat::Json => println!(
            "{}",
            report.to_json().context("failed to serialise run report")?
        ),
    }
    Ok(())
}
