pub mod backup;
pub mod codes;
pub mod finalize;
pub mod history;
pub mod init;
pub mod process;
pub mod status;

use std::path::{Path, PathBuf};

use colored::Colorize;
use dialoguer::Confirm;

use crate::error::{LedgerError, Result};
use crate::extract::extract_text;
use crate::settings::Settings;
use crate::store::CodingStore;
use crate::taxonomy::{parse_chart, ParsedChart};

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cardledger",
    version,
    about = "Turn credit-card statements into a GL-coded review sheet."
)]
pub struct Cli {
    /// Log parser decisions to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory, settings file and coding store.
    Init {
        /// Path for cardledger data (default: ~/Documents/cardledger)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Chart of accounts document (.pdf or .txt)
        #[arg(long)]
        chart: Option<String>,
        /// Folder scanned when `process` is given no inputs
        #[arg(long = "downloads-dir")]
        downloads_dir: Option<String>,
    },
    /// Parse statements and write a review sheet with suggested codes.
    Process {
        /// Statement files or folders (default: the downloads folder)
        inputs: Vec<PathBuf>,
        /// Year for MM/DD dates when the statement period is missing
        #[arg(long)]
        year: Option<i32>,
        /// Where to write the review sheet (default: current directory)
        #[arg(long = "output-dir")]
        output_dir: Option<PathBuf>,
        /// Also write the full annotated batch as JSON next to the sheet
        #[arg(long)]
        json: bool,
        /// Replace an unreadable coding store with an empty one
        #[arg(long = "reinit-store")]
        reinit_store: bool,
    },
    /// Remember the codes chosen in a reviewed sheet.
    Finalize {
        /// Reviewed CSV sheet
        sheet: PathBuf,
        /// Replace an unreadable coding store with an empty one
        #[arg(long = "reinit-store")]
        reinit_store: bool,
    },
    /// List the codes in the chart of accounts.
    Codes {
        /// Only one category: gl, location, program, funder, dept
        #[arg(long)]
        category: Option<String>,
    },
    /// Inspect or edit remembered vendor codes.
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
    /// Show configuration, chart and store summary.
    Status,
    /// Back up the coding store.
    Backup {
        /// Output path (default: <data_dir>/backups/coding_history-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List every remembered vendor.
    List,
    /// Show the codes a vendor would be pre-filled with.
    Show {
        /// Vendor text as it appears on a statement
        vendor: String,
    },
    /// Remember codes for a vendor, replacing what was stored.
    Set {
        vendor: String,
        #[arg(long)]
        gl: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        program: Option<String>,
        #[arg(long)]
        funder: Option<String>,
        #[arg(long)]
        dept: Option<String>,
    },
    /// Forget a vendor.
    Forget {
        vendor: String,
    },
}

/// Load and validate the chart of accounts named in settings.
pub(crate) fn load_chart(settings: &Settings) -> Result<ParsedChart> {
    let path = settings.chart_path();
    if !path.exists() {
        return Err(LedgerError::Other(format!(
            "Chart of accounts not found at {}. Run `cardledger init --chart <file>`.",
            path.display()
        )));
    }
    let text = extract_text(&path, settings.parse_timeout())?;
    parse_chart(&text)
}

/// Open the coding store. An unreadable store is only replaced with the
/// user's consent, given up front with `--reinit-store` or at the prompt.
pub(crate) fn open_store(path: &Path, reinit: bool) -> Result<CodingStore> {
    match CodingStore::open(path) {
        Ok(store) => Ok(store),
        Err(e @ LedgerError::StoreUnavailable { .. }) => {
            eprintln!("{}", e.to_string().red());
            let consent = reinit
                || Confirm::new()
                    .with_prompt("Move the unreadable store aside and start an empty one?")
                    .default(false)
                    .interact()
                    .unwrap_or(false);
            if !consent {
                return Err(e);
            }
            let store = CodingStore::reinitialize(path)?;
            println!("{}", "Started an empty coding store; the old file was kept beside it.".yellow());
            Ok(store)
        }
        Err(e) => Err(e),
    }
}
