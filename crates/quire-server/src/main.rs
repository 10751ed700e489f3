//! Quire server binary
//!
//! Starts the HTTP server for the friend-relationship engine.

use anyhow::Context;
use quire_server::{config::ServerConfig, start_server};
use std::env;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing (RUST_LOG overrides the default level)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();

    let config = if args.len() > 2 && args[1] == "--config" {
        let config_path = &args[2];
        ServerConfig::from_file(config_path)
            .with_context(|| format!("loading {}", config_path))?
    } else if args.len() > 1 && args[1] == "--help" {
        print_help();
        process::exit(0);
    } else {
        eprintln!("Warning: No config file specified, using default test configuration");
        eprintln!("Usage: quire-server --config <path-to-config.toml>");
        eprintln!();
        ServerConfig::default_test_config()
    };

    start_server(config).await.context("server failed")?;

    Ok(())
}

fn print_help() {
    println!("Quire Server - Friend relationship engine");
    println!();
    println!("USAGE:");
    println!("    quire-server --config <path-to-config.toml>");
    println!();
    println!("OPTIONS:");
    println!("    --config <file>    Load configuration from TOML file");
    println!("    --help             Print this help message");
    println!();
    println!("CONFIGURATION:");
    println!("    The TOML config file should contain:");
    println!("    - bind_address: IP address to bind (e.g., '127.0.0.1')");
    println!("    - bind_port: Port number (e.g., 8080)");
    println!("    - jwt_secret: Secret key for JWT token signing");
    println!("    - token_expiry_secs: Token expiry in seconds (default: 3600)");
    println!("    - database_path: SQLite database file (default: quire.db)");
    println!("    - store_timeout_ms: Store call timeout (default: 5000)");
    println!("    - max_search_results: Directory search cap (default: 50)");
    println!("    - allow_id_sessions: Issue tokens by identity id (default: false)");
    println!();
    println!("Log level is read from RUST_LOG (default: info).");
}
