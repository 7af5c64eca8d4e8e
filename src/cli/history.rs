use chrono::Utc;
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{load_chart, open_store};
use crate::error::{LedgerError, Result};
use crate::models::{Category, CodeChoices, MatchKind};
use crate::settings::load_settings;
use crate::store::vendor_key;

pub fn list() -> Result<()> {
    let settings = load_settings();
    let store = open_store(&settings.store_path(), false)?;
    let records = store.records()?;
    store.close()?;

    if records.is_empty() {
        println!("No vendors remembered yet.");
        return Ok(());
    }
    let mut table = Table::new();
    let mut header = vec!["Vendor key"];
    header.extend(Category::ALL.iter().map(|c| c.label()));
    header.push("Last used");
    table.set_header(header);
    for record in &records {
        let mut row = vec![Cell::new(&record.vendor_key)];
        row.extend(
            Category::ALL
                .iter()
                .map(|c| Cell::new(record.codes.get(*c).unwrap_or(""))),
        );
        row.push(Cell::new(record.last_used.format("%Y-%m-%d")));
        table.add_row(row);
    }
    println!("Coding history ({} vendors)\n{table}", records.len());
    Ok(())
}

pub fn show(vendor: &str) -> Result<()> {
    let settings = load_settings();
    let store = open_store(&settings.store_path(), false)?;
    let snapshot = store.snapshot()?;
    store.close()?;

    let key = vendor_key(vendor);
    let Some((record, kind)) = snapshot.find(&key) else {
        println!("No remembered codes for '{key}'.");
        return Ok(());
    };
    let how = match kind {
        MatchKind::Exact => "exact match".to_string(),
        MatchKind::Prefix => format!("prefix match on '{}'", record.vendor_key),
    };
    println!("{key}  ({how}, last used {})", record.last_used.format("%Y-%m-%d"));

    // Labels are a nicety; history is still shown without a readable chart.
    let chart = load_chart(&settings).ok();
    for category in Category::ALL {
        let Some(code) = record.codes.get(category) else { continue };
        let label = match &chart {
            Some(chart) => match chart.taxonomy.set(category).get(code) {
                Some(entry) => entry.label.clone(),
                None => "(no longer in chart)".red().to_string(),
            },
            None => String::new(),
        };
        println!("  {:<12} {code} {label}", category.label());
    }
    Ok(())
}

pub fn set(
    vendor: &str,
    gl: Option<String>,
    location: Option<String>,
    program: Option<String>,
    funder: Option<String>,
    dept: Option<String>,
) -> Result<()> {
    let key = vendor_key(vendor);
    if key.is_empty() {
        return Err(LedgerError::Other(format!("'{vendor}' has no letters or digits to key on")));
    }
    let settings = load_settings();
    let chart = load_chart(&settings)?;

    let mut codes = CodeChoices::default();
    for (category, value) in [
        (Category::Expense, gl),
        (Category::Location, location),
        (Category::Program, program),
        (Category::Funder, funder),
        (Category::Department, dept),
    ] {
        let Some(code) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
            continue;
        };
        if !chart.taxonomy.is_valid(category, &code) {
            return Err(LedgerError::Other(format!(
                "{} code '{code}' is not in the chart of accounts",
                category.label()
            )));
        }
        codes.set(category, Some(code));
    }
    if codes.is_empty() {
        return Err(LedgerError::Other("Give at least one code (--gl, --location, --program, --funder, --dept)".to_string()));
    }

    let store = open_store(&settings.store_path(), false)?;
    let previous = store.lookup(&key)?;
    store.upsert(&key, &codes, Utc::now())?;
    store.close()?;
    match previous {
        Some(_) => println!("Replaced codes for '{key}'"),
        None => println!("Remembered codes for '{key}'"),
    }
    Ok(())
}

pub fn forget(vendor: &str) -> Result<()> {
    let settings = load_settings();
    let store = open_store(&settings.store_path(), false)?;
    let key = vendor_key(vendor);
    let removed = store.forget(&key)?;
    store.close()?;
    if removed {
        println!("Forgot '{key}'");
        Ok(())
    } else {
        Err(LedgerError::Other(format!("No remembered codes for '{key}'")))
    }
}
