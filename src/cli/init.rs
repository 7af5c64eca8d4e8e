use std::path::PathBuf;

use colored::Colorize;

use crate::error::Result;
use crate::settings::{load_settings, save_settings, settings_file_exists, shellexpand_path};
use crate::store::CodingStore;

pub fn run(data_dir: Option<String>, chart: Option<String>, downloads_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    let first_run = !settings_file_exists();

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(chart) = chart {
        settings.chart_of_accounts = Some(shellexpand_path(&chart));
    }
    if let Some(dir) = downloads_dir {
        settings.downloads_dir = Some(shellexpand_path(&dir));
    }
    save_settings(&settings)?;

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(resolved.join("config"))?;
    std::fs::create_dir_all(settings.downloads_path())?;

    let store = CodingStore::open(&settings.store_path())?;
    let remembered = store.count()?;
    store.close()?;

    let verb = if first_run { "Initialized" } else { "Updated" };
    println!("{verb} cardledger at {}", resolved.display());
    println!("Coding store: {} ({remembered} vendors)", settings.store_path().display());
    let chart_path = settings.chart_path();
    if chart_path.exists() {
        println!("Chart:        {}", chart_path.display());
    } else {
        println!(
            "{}",
            format!(
                "Chart of accounts not found at {}; pass --chart <file>.",
                chart_path.display()
            )
            .yellow()
        );
    }
    Ok(())
}
