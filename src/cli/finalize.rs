use std::path::Path;

use chrono::Utc;
use colored::Colorize;

use crate::cli::{load_chart, open_store};
use crate::error::Result;
use crate::review::{apply_codings, collect_codings, read_sheet};
use crate::settings::load_settings;

pub fn run(sheet: &Path, reinit_store: bool) -> Result<()> {
    let settings = load_settings();
    let chart = load_chart(&settings)?;
    let rows = read_sheet(sheet)?;
    let finalized = collect_codings(&rows, &chart.taxonomy);

    for rejected in &finalized.rejected {
        println!(
            "{}",
            format!(
                "Row {}: {} '{}' for {} is not in the chart of accounts, ignored",
                rejected.row,
                rejected.category.label(),
                rejected.value,
                rejected.vendor
            )
            .yellow()
        );
    }

    let store = open_store(&settings.store_path(), reinit_store)?;
    let saved = apply_codings(&store, &finalized, Utc::now())?;
    let store_path = store.path().to_path_buf();
    store.close()?;

    println!("Remembered codes for {saved} vendor(s) from {} row(s).", rows.len());
    println!("Coding store: {}", store_path.display());
    if finalized.uncoded_rows > 0 {
        println!("{} row(s) had no valid codes.", finalized.uncoded_rows);
    }
    Ok(())
}
