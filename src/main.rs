#![cfg(not(tarpaulin_include))]

use fleetsheet::app;
use fleetsheet::config::AppConfig;

/// Main entry point for the entry-tracking web server
///
/// Reads its configuration from the environment:
/// * `FLEETSHEET_ADDR` - listen address (default `127.0.0.1:3000`)
/// * `FLEETSHEET_STORE` - path of the JSON entry store
/// * `GOOGLE_SERVICE_ACCOUNT_EMAIL`, `GOOGLE_PRIVATE_KEY`, `SHEET_ID`,
///   `SHEET_TAB` - the mirrored spreadsheet
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    app::run(config).await
}
