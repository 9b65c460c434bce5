use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use tramita_core::indicators::extract_indicators_from_bytes;
use tramita_store::{MemoryStore, load_data_dir};
use tramita_sync::{CaseApiClient, check_sync_availability, load_process_detail, trigger_sync};

mod display;

#[derive(Parser, Debug)]
#[command(name = "tramita")]
#[command(about = "Process reconciliation and enrichment for legal case tracking")]
#[command(version)]
struct Cli {
    /// Directory holding the JSON table exports
    #[arg(long, global = true, default_value = "data", env = "TRAMITA_DATA_DIR")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build and show the unified view of one process
    Process {
        number: String,
        #[arg(long)]
        tenant: String,
        /// Print the aggregate as JSON instead of a card
        #[arg(long)]
        json: bool,
    },
    /// Show whether the tenant may trigger a synchronization
    Quota {
        #[arg(long)]
        tenant: String,
        /// Evaluate at this RFC 3339 instant instead of now
        #[arg(long)]
        at: Option<String>,
    },
    /// Extract indicators from a raw trigger-data blob file
    Indicators { file: PathBuf },
    /// Request a refresh from the case API, subject to the tenant quota
    Sync {
        number: String,
        #[arg(long)]
        tenant: String,
        #[arg(long, env = "TRAMITA_API_URL")]
        api_url: String,
        #[arg(long, env = "TRAMITA_API_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!("tramita v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Process {
            number,
            tenant,
            json,
        } => {
            let store = open_store(&cli.data_dir)?;
            let agg = load_process_detail(&store, &tenant, &number)
                .await
                .with_context(|| format!("failed to load process {number}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&agg)?);
            } else {
                display::print_process_card(&agg);
            }
        }
        Command::Quota { tenant, at } => {
            let now = parse_instant(at.as_deref())?;
            let store = open_store(&cli.data_dir)?;
            let quota = check_sync_availability(&store, &tenant, now).await?;
            println!("{}", serde_json::to_string_pretty(&quota)?);
        }
        Command::Indicators { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let indicators = extract_indicators_from_bytes(&bytes);
            println!("{}", serde_json::to_string_pretty(&indicators)?);
        }
        Command::Sync {
            number,
            tenant,
            api_url,
            token,
        } => {
            let store = open_store(&cli.data_dir)?;
            let client = CaseApiClient::new(api_url, token);
            let outcome = trigger_sync(&store, &client, &tenant, &number, Utc::now()).await?;
            println!("request id: {}", outcome.ticket.request_id);
            match outcome.permit.remaining_after {
                Some(n) => println!("remaining:  {n}"),
                None => println!("remaining:  unlimited"),
            }
        }
    }

    Ok(())
}

fn open_store(dir: &Path) -> Result<MemoryStore> {
    load_data_dir(dir).with_context(|| format!("failed to load tables from {}", dir.display()))
}

fn parse_instant(at: Option<&str>) -> Result<DateTime<Utc>> {
    match at {
        None => Ok(Utc::now()),
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("invalid --at instant: {s}"))?
            .with_timezone(&Utc)),
    }
}
