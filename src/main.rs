//! MedConsole CLI
//!
//! Command-line access to the console core:
//! - Watch realtime push events
//! - Print dashboard stats
//! - Export collections
//! - Generate a config file

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use medconsole::api::ApiClient;
use medconsole::config::{generate_default_config, Config, LoggingConfig};
use medconsole::dashboard::{DashboardLoader, DashboardSnapshot};
use medconsole::export::{self, ExportFormat};
use medconsole::realtime::{event_names, listener, RealtimeManager, WsTransport};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "medconsole")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Healthcare operations console client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the usual locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Session token for the backend
    #[arg(long, env = "MEDCONSOLE_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print realtime push events as they arrive
    Watch {
        /// Only these events (default: all)
        #[arg(short, long)]
        event: Vec<String>,
    },

    /// Load the dashboard once and print its stats
    Dashboard {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Export a dashboard collection
    Export {
        /// Collection name (hospitals, doctors, patients, appointments, orders,
        /// prescriptions, inventory, finance)
        collection: String,
        /// Output format (csv, json, ndjson)
        #[arg(short, long, default_value = "csv")]
        format: String,
        /// Keep only records matching this text
        #[arg(short, long)]
        query: Option<String>,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        return write_output(output.as_ref(), &generate_default_config());
    }

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging);
    install_panic_hook();

    match cli.command {
        Commands::Watch { event } => watch(&config, cli.token, event).await,
        Commands::Dashboard { format } => dashboard(&config, cli.token, &format).await,
        Commands::Export {
            collection,
            format,
            query,
            output,
        } => {
            let format: ExportFormat = format.parse()?;
            export_collection(&config, cli.token, &collection, format, query, output).await
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("medconsole={}", logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Report panics (including caught listener panics) as log events
/// instead of the default stderr banner
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        tracing::error!(panic = %info, "Panic");
    }));
}

fn require_token(token: Option<String>) -> anyhow::Result<String> {
    match token {
        Some(t) if !t.trim().is_empty() => Ok(t),
        _ => bail!("No session token; pass --token or set MEDCONSOLE_TOKEN"),
    }
}

async fn watch(config: &Config, token: Option<String>, events: Vec<String>) -> anyhow::Result<()> {
    if !config.realtime.enabled {
        bail!("Realtime is disabled in the configuration");
    }
    let token = require_token(token)?;
    let base_url = config.api.require_base_url()?.to_string();
    let production = config.logging.production;

    let transport = Arc::new(WsTransport::new(config.realtime.ping_timeout(), production));
    let manager = RealtimeManager::new(transport, base_url, config.realtime.clone(), production);

    let Some(handle) = manager.initialize(&token).await else {
        bail!("Realtime channel could not be opened");
    };

    if let Some(unknown) = events.iter().find(|e| !event_names::is_known(e)) {
        bail!(
            "Unknown event '{}'; expected one of: {}",
            unknown,
            event_names::ALL.join(", ")
        );
    }

    let names = if events.is_empty() {
        vec![event_names::WILDCARD.to_string()]
    } else {
        events
    };
    let print = listener(|e| println!("{}\t{}", e.name, e.data));
    for name in &names {
        manager.subscribe(name, Arc::clone(&print)).await;
    }

    tracing::info!(channel_id = %handle.id(), events = ?names, "Watching push events");

    tokio::select! {
        state = handle.wait_for(|s| s.is_terminal()) => {
            tracing::info!(%state, "Realtime channel ended");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
        }
    }

    manager.disconnect().await;
    Ok(())
}

async fn dashboard(config: &Config, token: Option<String>, format: &str) -> anyhow::Result<()> {
    let client = ApiClient::new(&config.api, Some(require_token(token)?))?;
    let loader = DashboardLoader::new(client, config.dashboard.clone());

    let Some(snapshot) = loader.load().await else {
        bail!("Dashboard load was superseded");
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&snapshot.stats)?),
        "table" => print_stats(&snapshot),
        other => bail!("Unknown output format: {}", other),
    }

    for notice in &snapshot.notices {
        eprintln!("{}", notice.message);
    }
    Ok(())
}

fn print_stats(snapshot: &DashboardSnapshot) {
    let stats = &snapshot.stats;

    println!("{:<16} {:>8}", "Collection", "Records");
    println!("{}", "-".repeat(25));
    for (name, count) in &stats.counts {
        println!("{:<16} {:>8}", name, count);
    }

    for (name, tally) in &stats.status {
        println!();
        println!("{} by status:", name);
        for (status, count) in tally {
            println!("  {:<20} {:>6}", status, count);
        }
    }

    println!();
    println!("Finance:");
    println!("  Income:  {:>12.2}", stats.finance.income);
    println!("  Expense: {:>12.2}", stats.finance.expense);
    println!("  Net:     {:>12.2}", stats.finance.net);
}

async fn export_collection(
    config: &Config,
    token: Option<String>,
    collection: &str,
    format: ExportFormat,
    query: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let client = ApiClient::new(&config.api, Some(require_token(token)?))?;

    let Some(path) = config.dashboard.path_of(collection) else {
        bail!("Unknown collection: {}", collection);
    };

    let records = client
        .get_collection(path)
        .await
        .with_context(|| format!("Failed to fetch {}", collection))?;
    let matching = export::filter_records(&records, query.as_deref().unwrap_or(""));
    let rendered = export::render(&matching, format, None)?;

    tracing::info!(
        collection,
        total = records.len(),
        exported = matching.len(),
        "Export rendered"
    );

    write_output(output.as_ref(), &rendered)
}

fn write_output(output: Option<&PathBuf>, content: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {:?}", path))?;
            eprintln!("Wrote {:?}", path);
        }
        None => print!("{}", content),
    }
    Ok(())
}
