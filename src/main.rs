//! WolfRepl - MariaDB Replication Administration
//!
//! Serves the binlog viewer and replication controls over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wolfrepl::api::{AppState, HttpServer};
use wolfrepl::config::WolfReplConfig;
use wolfrepl::error::Result;
use wolfrepl::executor::{DatabaseInterface, MariaDbExecutor};
use wolfrepl::replication::{MariaDbConnector, ReplicationInfo};
use wolfrepl::state::SessionStore;

/// WolfRepl - MariaDB Replication Administration
#[derive(Parser)]
#[command(name = "wolfrepl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "wolfrepl.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Address to listen on (overrides config)
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "wolfrepl.toml")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,

    /// Connect to the server and show its replication roles
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config level applies unless the CLI overrides it; init has no config yet
    let file_level = WolfReplConfig::from_file(&cli.config)
        .map(|c| c.logging.level)
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.log_level.as_deref().unwrap_or(&file_level));

    match cli.command {
        Commands::Serve { listen } => run_serve(cli.config, listen).await,
        Commands::Init { output } => run_init(output),
        Commands::Validate => run_validate(cli.config),
        Commands::Info => run_info(cli.config).await,
    }
}

/// Initialize logging
fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(config_path: &PathBuf) -> Result<WolfReplConfig> {
    match WolfReplConfig::from_file(config_path) {
        Ok(c) => Ok(c),
        Err(e) => {
            tracing::error!("Failed to load configuration from {:?}: {}", config_path, e);
            tracing::error!("Please check that the config file exists and is valid TOML");
            Err(e)
        }
    }
}

async fn connect(config: &WolfReplConfig) -> Result<MariaDbExecutor> {
    tracing::info!("Connecting to MariaDB at {}:{}...", config.database.host, config.database.port);
    let executor = match MariaDbExecutor::new(&config.database).await {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to connect to MariaDB: {}", e);
            tracing::error!("  Host: {}:{}", config.database.host, config.database.port);
            tracing::error!("  User: {}", config.database.user);
            tracing::error!("Please check that MariaDB is running and credentials are correct");
            return Err(e);
        }
    };

    match executor.health_check().await {
        Ok(true) => tracing::info!("Database connection established"),
        Ok(false) => tracing::warn!("Database health check returned false"),
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            return Err(e);
        }
    }
    Ok(executor)
}

/// Start the HTTP API
async fn run_serve(config_path: PathBuf, listen: Option<String>) -> Result<()> {
    tracing::info!("Starting WolfRepl...");

    let mut config = load_config(&config_path)?;
    if let Some(listen) = listen {
        config.server.bind_address = listen;
    }

    let executor = connect(&config).await?;
    if !config.replication.allow_arbitrary_server {
        tracing::info!("Change master is disabled (replication.allow_arbitrary_server = false)");
    }

    let state = Arc::new(AppState {
        db: Arc::new(executor),
        connector: Arc::new(MariaDbConnector::new(config.master_connect_timeout())),
        sessions: SessionStore::new(),
        binlog: config.binlog.clone(),
        replication: config.replication.clone(),
    });

    let server = HttpServer::new(config.server.clone(), state);
    let shared = server.state();

    tokio::select! {
        result = server.start() => {
            if let Err(e) = &result {
                tracing::error!("HTTP API stopped: {}", e);
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    shared.db.close().await;
    tracing::info!("WolfRepl stopped");
    Ok(())
}

/// Write a starter configuration file
fn run_init(output: PathBuf) -> Result<()> {
    if output.exists() {
        return Err(wolfrepl::Error::Config(format!(
            "{} already exists, refusing to overwrite",
            output.display()
        )));
    }

    std::fs::write(&output, WolfReplConfig::template())?;
    println!("Configuration written to {}", output.display());
    println!("Edit the [database] section, then run: wolfrepl serve");
    Ok(())
}

/// Validate configuration file
fn run_validate(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path)?;
    println!("Configuration is valid");
    println!("  Database: {}:{} as {}", config.database.host, config.database.port, config.database.user);
    println!("  API:      {}", config.server.bind_address);
    println!("  Binlog:   {} events per page", config.binlog.max_rows);
    println!(
        "  Change master: {}",
        if config.replication.allow_arbitrary_server { "enabled" } else { "disabled" }
    );
    Ok(())
}

/// Show replication roles of the configured server
async fn run_info(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path)?;
    let executor = connect(&config).await?;
    let info = ReplicationInfo::new(&executor);

    let (is_primary, is_replica) = info.server_roles(None).await?;
    println!("Server {}", executor.address());
    println!("  Primary: {}", if is_primary { "yes" } else { "no" });
    println!("  Replica: {}", if is_replica { "yes" } else { "no" });

    let connections = info.master_connections().await;
    if !connections.is_empty() {
        println!("  Master connections: {}", connections.join(", "));
    }

    executor.close().await;
    Ok(())
}
