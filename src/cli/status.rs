use colored::Colorize;

use crate::cli::load_chart;
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::models::Category;
use crate::settings::{load_settings, settings_file_exists};
use crate::store::CodingStore;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let store_path = settings.store_path();

    println!("Settings:   {}", if settings_file_exists() { "saved" } else { "(defaults)" });
    println!("Data dir:   {}", settings.data_path().display());
    println!("Chart:      {}", settings.chart_path().display());
    println!("Downloads:  {}", settings.downloads_path().display());
    println!("Store:      {}", store_path.display());
    println!("Timeout:    {}s per file", settings.parse_timeout().as_secs());

    println!();
    match load_chart(&settings) {
        Ok(chart) => {
            for category in Category::ALL {
                println!("{:<14} {} codes", category.label(), chart.taxonomy.set(category).len());
            }
            println!("{:<14} {} codes", "Total", chart.taxonomy.total());
        }
        Err(e) => println!("{}", format!("Chart: {e}").red()),
    }

    println!();
    if store_path.exists() {
        let size = std::fs::metadata(&store_path)?.len();
        println!("Store size:  {}", format_bytes(size));
        // Read-only report: a damaged store is described, never replaced.
        match CodingStore::open(&store_path) {
            Ok(store) => {
                println!("Vendors:     {}", store.count()?);
                store.close()?;
            }
            Err(e) => println!("{}", e.to_string().red()),
        }
    } else {
        println!("Coding store not found. Run `cardledger init` to set up.");
    }
    Ok(())
}
