use std::error::Error;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use couchflow::config::StorageConfig;
use couchflow::storage::{CouchStorage, FlowStorage};

#[derive(Parser)]
#[command(name = "couchflow", about = "CouchDB storage for flows, credentials, settings and library entries")]
enum Cli {
    /// Create the database and views if needed and install defaults
    Init,
    /// Print the flow graph
    Flows,
    /// Replace the flow graph with the contents of a JSON file
    SaveFlows { file: PathBuf },
    /// Print runtime settings
    Settings,
    /// Print credentials
    Credentials,
    /// Print every saved flow snapshot as a tree
    AllFlows,
    /// Print a saved flow snapshot
    GetFlow { path: String },
    /// Save a flow snapshot from a JSON file
    SaveFlow { path: String, file: PathBuf },
    /// Print a library entry, or the listing of a library directory
    LibGet {
        #[arg(value_name = "TYPE")]
        lib_type: String,
        path: String,
    },
    /// Save a library entry; the body file is stored as text
    LibPut {
        #[arg(value_name = "TYPE")]
        lib_type: String,
        path: String,
        body_file: PathBuf,
        /// Entry metadata as a JSON object
        #[arg(long, default_value = "{}")]
        meta: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let cli = Cli::parse();
    let config = StorageConfig::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("couchflow=info,reqwest=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_tree::HierarchicalLayer::new(2)
                .with_writer(std::io::stderr)
                .with_targets(true)
                .with_bracketed_fields(false),
        )
        .with(sentry::integrations::tracing::layer().event_filter(
            |metadata| match *metadata.level() {
                tracing::Level::ERROR => sentry::integrations::tracing::EventFilter::Event,
                tracing::Level::WARN | tracing::Level::INFO => {
                    sentry::integrations::tracing::EventFilter::Breadcrumb
                }
                _ => sentry::integrations::tracing::EventFilter::Ignore,
            },
        ))
        .init();

    let _guard = sentry::init((
        config.sentry_dsn.clone().unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.environment.clone().into()),
            enable_logs: true,
            ..Default::default()
        },
    ));

    let storage = config.storage()?;
    tracing::info!(
        url = %config.couch_url,
        db = %config.database,
        namespace = %config.namespace,
        "Initializing storage"
    );
    storage
        .init()
        .await
        .context("failed to initialize storage")?;

    run(cli, &storage).await?;
    Ok(())
}

async fn run(cli: Cli, storage: &CouchStorage) -> Result<()> {
    match cli {
        Cli::Init => {
            tracing::info!("Storage ready");
        }
        Cli::Flows => print_json(&storage.get_flows().await?)?,
        Cli::SaveFlows { file } => {
            storage.save_flows(read_json(&file)?).await?;
            tracing::info!("Saved flows");
        }
        Cli::Settings => print_json(&storage.get_settings().await?)?,
        Cli::Credentials => print_json(&storage.get_credentials().await?)?,
        Cli::AllFlows => print_json(&storage.get_all_flows().await?)?,
        Cli::GetFlow { path } => print_json(&storage.get_flow(&path).await?)?,
        Cli::SaveFlow { path, file } => {
            storage.save_flow(&path, read_json(&file)?).await?;
            tracing::info!(path = %path, "Saved flow");
        }
        Cli::LibGet { lib_type, path } => {
            let entry = storage.get_library_entry(&lib_type, &path).await?;
            if let Some(listing) = entry.as_listing() {
                tracing::info!(
                    path = %path,
                    dirs = listing.dirs.len(),
                    files = listing.files.len(),
                    "Library directory"
                );
            } else if entry.as_body().is_some_and(Value::is_null) {
                tracing::warn!(path = %path, "Library entry has no body");
            }
            print_json(&entry)?
        }
        Cli::LibPut {
            lib_type,
            path,
            body_file,
            meta,
        } => {
            let meta: Value = serde_json::from_str(&meta).context("failed to parse --meta")?;
            let body = std::fs::read_to_string(&body_file)
                .with_context(|| format!("failed to read body file: {}", body_file.display()))?;
            storage
                .save_library_entry(&lib_type, &path, meta, Value::String(body))
                .await?;
            tracing::info!(lib_type = %lib_type, path = %path, "Saved library entry");
        }
    }
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{out}");
    Ok(())
}
