use comfy_table::{Cell, Table};

use crate::cli::load_chart;
use crate::error::{LedgerError, Result};
use crate::models::Category;
use crate::settings::load_settings;

pub fn run(category: Option<&str>) -> Result<()> {
    let categories = match category {
        Some(key) => vec![Category::from_key(key).ok_or_else(|| LedgerError::UnknownCategory(key.to_string()))?],
        None => Category::ALL.to_vec(),
    };
    let chart = load_chart(&load_settings())?;

    for category in categories {
        let set = chart.taxonomy.set(category);
        let stats = chart.stats.get(&category).copied().unwrap_or_default();
        let mut table = Table::new();
        table.set_header(vec!["Code", "Label"]);
        for entry in set.iter() {
            table.add_row(vec![Cell::new(&entry.code), Cell::new(&entry.label)]);
        }
        println!("{} ({} codes)\n{table}", category.label(), set.len());
        if stats.duplicates > 0 || stats.unparsed_lines > 0 {
            println!(
                "  {} duplicate(s) ignored, {} unreadable line(s)",
                stats.duplicates, stats.unparsed_lines
            );
        }
        println!();
    }
    Ok(())
}
