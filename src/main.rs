#![cfg(not(tarpaulin_include))]

use clap::Parser;
use sheetlog::app;
use sheetlog::config::ServerConfig;

/// Main entry point for the sheetlog server
///
/// Reads the command line, initializes logging (`RUST_LOG` overrides the
/// default `info` level) and serves the JSON API until interrupted.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    app::run(config).await
}
