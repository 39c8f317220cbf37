use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use databook_resolver::{Resolver, ResolverConfig};
use databook_storage::RelationalStore;
use databook_sync::{build_databook, maybe_build_scheduler, run_match, run_update, DatabookConfig};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "databook")]
#[command(about = "NYC procurement databook: load, link and update")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load every enabled extract into the relational store, then match registrants.
    Build,
    /// Re-run registrant → vendor matching only.
    Match,
    /// Pull new transactions for one fiscal year into the columnar store.
    Update {
        #[arg(long)]
        fiscal_year: Option<i32>,
    },
    #[command(subcommand)]
    Resolve(ResolveCommand),
    #[command(subcommand)]
    Report(ReportCommand),
    /// Run the update on `DATABOOK_UPDATE_CRON` until interrupted.
    Schedule,
}

#[derive(Debug, Subcommand)]
enum ResolveCommand {
    Contract { ctr_id: String },
    Solicitation { epin: String },
    Vendor { supplier_id: String },
    /// Transactions paid to a vendor name.
    Payee { name: String },
}

#[derive(Debug, Subcommand)]
enum ReportCommand {
    Notices {
        #[arg(long, default_value_t = 10)]
        samples: usize,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = DatabookConfig::from_env();

    match cli.command.unwrap_or(Commands::Build) {
        Commands::Build => print_json(&build_databook(&config).await?),
        Commands::Match => print_json(&run_match(&config).await?),
        Commands::Update { fiscal_year } => print_json(&run_update(&config, fiscal_year).await?),
        Commands::Resolve(command) => {
            let resolver = open_resolver(&config).await?;
            let result = resolve(&resolver, command).await;
            resolver.close().await;
            result
        }
        Commands::Report(ReportCommand::Notices { samples }) => {
            let resolver = open_resolver(&config).await?;
            let report = resolver.notice_report(samples).await;
            resolver.close().await;
            print_json(&report?)
        }
        Commands::Schedule => schedule(&config).await,
    }
}

async fn resolve(resolver: &Resolver, command: ResolveCommand) -> Result<()> {
    match command {
        ResolveCommand::Contract { ctr_id } => {
            let view = resolver.contract_view(&ctr_id).await?;
            if view.contract.is_none() {
                bail!("no contract {ctr_id} (transactions {})", view.spending.columnar);
            }
            print_json(&view)
        }
        ResolveCommand::Solicitation { epin } => match resolver.solicitation_view(&epin).await? {
            Some(view) => print_json(&view),
            None => bail!("no solicitation {epin}"),
        },
        ResolveCommand::Vendor { supplier_id } => match resolver.vendor_profile(&supplier_id).await? {
            Some(profile) => print_json(&profile),
            None => bail!("no vendor {supplier_id}"),
        },
        ResolveCommand::Payee { name } => print_json(&resolver.vendor_transactions(&name).await),
    }
}

async fn open_resolver(config: &DatabookConfig) -> Result<Resolver> {
    let store = RelationalStore::open(&config.db_path).await?;
    let columnar = config.transaction_store(config.http_fetcher()?);
    Ok(Resolver::new(store, columnar, resolver_config(config)))
}

fn resolver_config(config: &DatabookConfig) -> ResolverConfig {
    ResolverConfig {
        columnar_timeout: Duration::from_secs(config.columnar_timeout_secs),
        max_data_fy: config.max_data_fy,
        ..Default::default()
    }
}

async fn schedule(config: &DatabookConfig) -> Result<()> {
    let Some(mut sched) = maybe_build_scheduler(config).await? else {
        bail!("scheduler disabled; set DATABOOK_SCHEDULER_ENABLED=true");
    };
    sched.start().await.context("starting scheduler")?;
    info!(cron = %config.update_cron, "scheduler running");
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    sched.shutdown().await.context("stopping scheduler")?;
    Ok(())
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
