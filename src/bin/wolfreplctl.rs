//! WolfReplCtl - Command line tool for a running WolfRepl service
//!
//! Usage:
//!   wolfreplctl binlog            - Show a page of binlog events
//!   wolfreplctl status replica    - Show replica status
//!   wolfreplctl start|stop        - Start or stop replica threads
//!   wolfreplctl reset             - Reset the replica
//!   wolfreplctl skip-error        - Skip replication errors

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;

/// WolfRepl Control Tool
#[derive(Parser)]
#[command(name = "wolfreplctl")]
#[command(about = "Inspect and control MariaDB replication through WolfRepl", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "/etc/wolfrepl/config.toml")]
    config: PathBuf,

    /// API endpoint to connect to (overrides config)
    #[arg(short, long)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a page of binary log events
    Binlog {
        /// Binary log file name
        #[arg(long)]
        log: Option<String>,
        /// Event offset
        #[arg(long, default_value_t = 0)]
        pos: u64,
        /// Show full statements instead of truncated ones
        #[arg(long)]
        full: bool,
    },
    /// Show the replication status table for a role
    Status {
        /// primary or replica
        #[arg(default_value = "replica")]
        role: String,
        /// Named master connection (MariaDB multi-source)
        #[arg(long)]
        connection: Option<String>,
    },
    /// Start replica threads
    Start {
        /// IO_THREAD or SQL_THREAD (default both)
        #[arg(long)]
        thread: Option<String>,
    },
    /// Stop replica threads
    Stop {
        /// IO_THREAD or SQL_THREAD (default both)
        #[arg(long)]
        thread: Option<String>,
    },
    /// Stop, reset and restart the replica
    Reset,
    /// Skip replication errors
    SkipError {
        /// Number of errors to skip
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Point the replica at a new primary
    ChangeMaster {
        #[arg(long)]
        host: String,
        #[arg(long, default_value_t = 3306)]
        port: u16,
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "")]
        password: String,
    },
    /// Check configuration file for errors
    CheckConfig {
        /// Path to config file to check (defaults to --config path)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

// ============ API Response Types ============

#[derive(Debug, Deserialize)]
struct BinlogViewResponse {
    sql_query: String,
    #[serde(default)]
    values: Vec<serde_json::Map<String, serde_json::Value>>,
    has_previous: bool,
    has_next: bool,
    #[serde(default)]
    previous_params: PageParams,
    #[serde(default)]
    next_params: PageParams,
}

#[derive(Debug, Deserialize, Default)]
struct PageParams {
    #[serde(default)]
    pos: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StatusTableResponse {
    role: String,
    variables: Vec<StatusVariable>,
}

#[derive(Debug, Deserialize)]
struct StatusVariable {
    name: String,
    value: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ActionResponse {
    success: bool,
    message: String,
    #[serde(default)]
    outcome: Option<OutcomeResponse>,
}

#[derive(Debug, Deserialize)]
struct OutcomeResponse {
    #[serde(default)]
    steps: Vec<StepResponse>,
}

#[derive(Debug, Deserialize)]
struct StepResponse {
    statement: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

// ============ Config ============

#[derive(Debug, Deserialize)]
struct Config {
    #[serde(default)]
    server: ServerConfig,
}

#[derive(Debug, Deserialize, Default)]
struct ServerConfig {
    #[serde(default = "default_api_bind")]
    bind_address: String,
}

fn default_api_bind() -> String {
    "0.0.0.0:8080".to_string()
}

// ============ Main ============

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let endpoint = match &cli.endpoint {
        Some(e) => e.clone(),
        None => endpoint_from_config(&cli.config),
    };

    let result = match &cli.command {
        Commands::Binlog { log, pos, full } => show_binlog(&endpoint, log.as_deref(), *pos, *full).await,
        Commands::Status { role, connection } => {
            show_status(&endpoint, role, connection.as_deref()).await
        }
        Commands::Start { thread } => {
            server_control(&endpoint, "start", thread.as_deref()).await
        }
        Commands::Stop { thread } => {
            server_control(&endpoint, "stop", thread.as_deref()).await
        }
        Commands::Reset => server_control(&endpoint, "reset", None).await,
        Commands::SkipError { count } => {
            let count = count.to_string();
            submit(
                &endpoint,
                &[
                    ("sr_take_action", "1"),
                    ("sr_slave_skip_error", "1"),
                    ("sr_skip_errors_count", count.as_str()),
                ],
            )
            .await
        }
        Commands::ChangeMaster { host, port, user, password } => {
            let port = port.to_string();
            submit(
                &endpoint,
                &[
                    ("sr_take_action", "1"),
                    ("slave_changemaster", "1"),
                    ("hostname", host.as_str()),
                    ("text_port", port.as_str()),
                    ("username", user.as_str()),
                    ("pma_pw", password.as_str()),
                ],
            )
            .await
        }
        Commands::CheckConfig { file } => {
            let config_path = file.clone().unwrap_or_else(|| cli.config.clone());
            check_config(&config_path)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Work out the API endpoint from the config file, falling back to localhost
fn endpoint_from_config(path: &PathBuf) -> String {
    let fallback = "http://127.0.0.1:8080".to_string();
    let Ok(content) = std::fs::read_to_string(path) else {
        return fallback;
    };
    match toml::from_str::<Config>(&content) {
        Ok(config) => {
            // Convert bind address to localhost if it's 0.0.0.0
            let addr = config.server.bind_address;
            if addr.starts_with("0.0.0.0") {
                format!("http://127.0.0.1:{}", addr.split(':').nth(1).unwrap_or("8080"))
            } else {
                format!("http://{}", addr)
            }
        }
        Err(_) => fallback,
    }
}

async fn error_from(response: reqwest::Response) -> Box<dyn std::error::Error> {
    let status = response.status();
    match response.json::<ErrorResponse>().await {
        Ok(body) => format!("API error ({}): {}", status, body.error).into(),
        Err(_) => format!("API error: {}", status).into(),
    }
}

// ============ Commands ============

async fn show_binlog(
    endpoint: &str,
    log: Option<&str>,
    pos: u64,
    full: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let url = format!("{}/server/binlog", endpoint);
    let pos = pos.to_string();
    let mut form = vec![("pos", pos.as_str())];
    if let Some(log) = log {
        form.push(("log", log));
    }
    if full {
        form.push(("is_full_query", "1"));
    }

    let response = reqwest::Client::new().post(&url).form(&form).send().await?;
    if !response.status().is_success() {
        return Err(error_from(response).await);
    }
    let view: BinlogViewResponse = response.json().await?;

    println!();
    println!("\x1b[2m{}\x1b[0m", view.sql_query);
    println!();
    println!("{:<20} {:>10} {:<16} {:>10} {:>12}  {}",
        "LOG", "POS", "EVENT", "SERVER", "END POS", "INFO");
    println!("{}", "-".repeat(100));

    let text = |row: &serde_json::Map<String, serde_json::Value>, key: &str| -> String {
        match row.get(key) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    };

    for row in &view.values {
        println!("{:<20} {:>10} {:<16} {:>10} {:>12}  {}",
            text(row, "Log_name"),
            text(row, "Pos"),
            text(row, "Event_type"),
            text(row, "Server_id"),
            text(row, "End_log_pos"),
            text(row, "Info"),
        );
    }
    println!();

    if view.values.is_empty() {
        println!("No events.");
    }
    if view.has_previous {
        println!("Previous page: --pos {}", view.previous_params.pos.unwrap_or(0));
    }
    if view.has_next {
        println!("Next page:     --pos {}", view.next_params.pos.unwrap_or(0));
    }

    Ok(())
}

async fn show_status(
    endpoint: &str,
    role: &str,
    connection: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let url = format!("{}/server/replication/status", endpoint);
    let mut query = vec![("type", role)];
    if let Some(conn) = connection {
        query.push(("master_connection", conn));
    }

    let response = reqwest::Client::new().get(&url).query(&query).send().await?;
    if !response.status().is_success() {
        return Err(error_from(response).await);
    }
    let table: StatusTableResponse = response.json().await?;

    println!();
    println!("Replication status ({})", table.role);
    println!("========================================");
    for var in &table.variables {
        // Pad value to fixed width BEFORE adding color codes
        let value_padded = format!("{:<30}", var.value);
        let value_colored = match var.status.as_str() {
            "alert" => format!("\x1b[31m{}\x1b[0m", value_padded), // Red
            "ok" => format!("\x1b[32m{}\x1b[0m", value_padded),    // Green
            _ => value_padded,
        };
        println!("{:<30} {}", var.name, value_colored);
    }
    println!();

    Ok(())
}

async fn server_control(
    endpoint: &str,
    action: &str,
    thread: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut form = vec![
        ("sr_take_action", "1"),
        ("sr_slave_server_control", "1"),
        ("sr_slave_action", action),
    ];
    if let Some(thread) = thread {
        form.push(("sr_slave_control_parm", thread));
    }
    submit(endpoint, &form).await
}

async fn submit(endpoint: &str, form: &[(&str, &str)]) -> Result<(), Box<dyn std::error::Error>> {
    let url = format!("{}/server/replication", endpoint);
    let response = reqwest::Client::new().post(&url).form(form).send().await?;
    if !response.status().is_success() {
        return Err(error_from(response).await);
    }
    let result: ActionResponse = response.json().await?;

    if let Some(outcome) = &result.outcome {
        for step in &outcome.steps {
            let mark = if step.result.get("Ok").is_some() {
                "\x1b[32m[OK]\x1b[0m"
            } else {
                "\x1b[31m[XX]\x1b[0m"
            };
            println!("{} {}", mark, step.statement);
        }
    }

    if result.success {
        println!("\x1b[1;32m✓\x1b[0m {}", result.message);
        Ok(())
    } else {
        Err(result.message.into())
    }
}

fn check_config(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("Checking {}", path.display());
    let config = wolfrepl::WolfReplConfig::from_file(path)?;
    println!("\x1b[1;32m✓\x1b[0m Configuration is valid");
    println!("  API endpoint: {}", config.server.bind_address);
    println!("  Database:     {}:{}", config.database.host, config.database.port);
    Ok(())
}
