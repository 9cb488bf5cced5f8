//! tabstore CLI - drive the storage library from the command line.
//!
//! The `demo` command simulates several browser tabs sharing one storage
//! area and prints the change events each tab observes.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tabstore_drivers::{create_default_registry, StorageArea};
use tabstore_storage::{listener, ChangeEvent, EventKind, Storage, StoreConfig};

/// Time given to cross-tab deliveries before the demo reports.
const SETTLE: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "tabstore")]
#[command(about = "tabstore - key-value storage with cross-tab change events")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered driver names.
    Drivers,

    /// Run a scripted session across simulated tabs.
    Demo {
        /// Store configuration file (JSON).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of tabs sharing the storage area.
        #[arg(short, long, default_value_t = 2)]
        tabs: usize,

        /// Relay events between tabs.
        #[arg(long)]
        cross_tab: bool,
    },

    /// Print a store configuration as JSON.
    Config {
        /// Application name.
        #[arg(short, long, default_value = "demo")]
        name: String,

        /// Store name within the application.
        #[arg(short, long, default_value = "store")]
        store_name: String,

        /// Candidate driver, highest priority first. Repeatable.
        #[arg(short, long = "driver", default_values_t = ["area".to_string(), "memory".to_string()])]
        drivers: Vec<String>,

        /// Enable cross-tab notification.
        #[arg(long)]
        cross_tab: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Drivers => cmd_drivers(),

        Commands::Demo {
            config,
            tabs,
            cross_tab,
        } => cmd_demo(config.as_deref(), tabs, cross_tab).await,

        Commands::Config {
            name,
            store_name,
            drivers,
            cross_tab,
        } => cmd_config(name, store_name, drivers, cross_tab),
    }
}

/// List registered drivers.
fn cmd_drivers() -> Result<()> {
    let area = StorageArea::new();
    let registry = create_default_registry(area.context());

    println!("Available drivers:");
    for name in registry.drivers() {
        println!("  {}", name);
    }

    Ok(())
}

/// Print a configuration.
fn cmd_config(name: String, store_name: String, drivers: Vec<String>, cross_tab: bool) -> Result<()> {
    let mut config = StoreConfig::new(name, store_name, drivers);
    config.cross_tab_notification = cross_tab;
    config.identity().context("Invalid store identity")?;

    println!("{}", config.to_json()?);
    Ok(())
}

async fn load_config(path: Option<&Path>) -> Result<StoreConfig> {
    match path {
        Some(path) => StoreConfig::load(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(StoreConfig::new("demo", "store", vec!["area".to_string()])),
    }
}

fn describe(event: &ChangeEvent) -> String {
    let origin = if event.is_cross_tab() { "remote" } else { "local" };
    let value = |v: Option<&serde_json::Value>| match v {
        Some(v) => v.to_string(),
        None => "<absent>".to_string(),
    };

    match event.kind() {
        EventKind::Clear => format!("{} clear", origin),
        kind => format!(
            "{} {:?} {} : {} -> {}",
            origin,
            kind,
            event.key().unwrap_or("?"),
            value(event.old_value()),
            value(event.new_value())
        ),
    }
}

/// Run the scripted session.
async fn cmd_demo(config_path: Option<&Path>, tabs: usize, cross_tab: bool) -> Result<()> {
    if tabs == 0 {
        anyhow::bail!("At least one tab is required");
    }

    let mut config = load_config(config_path).await?;
    config.cross_tab_notification |= cross_tab;
    info!(
        "Running demo with {} tabs on {} (cross-tab: {})",
        tabs,
        config.identity()?,
        config.cross_tab_notification
    );

    let area = StorageArea::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut stores = Vec::with_capacity(tabs);

    for tab in 0..tabs {
        let context = area.context();
        let registry = create_default_registry(context.clone());
        let options = config
            .to_options(&registry, Some(context))
            .context("Invalid store configuration")?;
        let storage = Storage::new(options).context("Failed to create storage")?;

        let tx = tx.clone();
        storage.add_listener(listener(move |event| {
            let _ = tx.send((tab, describe(event)));
        }));
        stores.push(storage);
    }
    drop(tx);

    let writer = &stores[0];
    let driver = writer.active_driver().await.context("No usable driver")?;
    println!("Tab 0 writes through the '{}' driver", driver.name());

    writer.set_item("greeting", json!("hello")).await?;
    writer.set_item("greeting", json!({"text": "world"})).await?;
    writer.remove_item("greeting").await?;
    writer.set_item("count", json!(1)).await?;
    writer.clear().await?;

    tokio::time::sleep(SETTLE).await;
    for storage in &stores {
        storage.destroy().await?;
    }

    while let Some((tab, line)) = rx.recv().await {
        println!("[tab {}] {}", tab, line);
    }

    Ok(())
}
