#![cfg(not(tarpaulin_include))]

use clap::{Parser, Subcommand};
use fleetsheet::addressing::column_letter;
use fleetsheet::columns::row_from_json;
use fleetsheet::config::SheetConfig;
use fleetsheet::gateway::SheetGateway;
use fleetsheet::sheets::SheetsClient;
use serde_json::Value;

/// Run single spreadsheet mirror operations against the configured sheet.
#[derive(Parser)]
#[command(name = "sheetctl", version)]
struct Cli {
    /// Tab to operate on (defaults to SHEET_TAB, then Sheet1)
    #[arg(long, env = "SHEET_TAB")]
    tab: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the header labels into row 1 if it is empty
    Header,
    /// Append one entry, given as a JSON object
    Append {
        #[arg(long)]
        json: String,
    },
    /// Overwrite the given row with a JSON object
    Update {
        #[arg(long)]
        row: u32,
        #[arg(long)]
        json: String,
    },
    /// Blank the given row
    Clear {
        #[arg(long)]
        row: u32,
    },
    /// Print the letter name of a zero-based column index
    Column { index: usize },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let config = SheetConfig::from_env();
    let tab = cli.tab.unwrap_or_else(|| config.tab.clone());
    let client = SheetsClient::new(&config);

    match cli.command {
        Command::Header => {
            let written = client.ensure_header(&tab).await?;
            println!("{}", if written { "header written" } else { "header already present" });
        }
        Command::Append { json } => {
            let body: Value = serde_json::from_str(&json)?;
            client.ensure_header(&tab).await?;
            let row = client.append_row(&tab, &row_from_json(&body)).await?;
            println!("appended at row {row}");
        }
        Command::Update { row, json } => {
            let body: Value = serde_json::from_str(&json)?;
            let range = client.update_row(&tab, row, &row_from_json(&body)).await?;
            println!("updated {range}");
        }
        Command::Clear { row } => {
            let range = client.clear_row(&tab, row).await?;
            println!("cleared {range}");
        }
        Command::Column { index } => println!("{}", column_letter(index)),
    }

    Ok(())
}
