use std::path::PathBuf;

use chrono::{Datelike, Local, Utc};
use colored::Colorize;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use crate::batch::{discover_inputs, run_batch, BatchEvent, BatchOptions, BatchOutput, FileStatus};
use crate::cli::{load_chart, open_store};
use crate::error::{LedgerError, Result};
use crate::fmt::money;
use crate::models::TxnNote;
use crate::review::{write_handoff, write_sheet_to_dir, Handoff};
use crate::settings::load_settings;

pub fn run(
    inputs: Vec<PathBuf>,
    year: Option<i32>,
    output_dir: Option<PathBuf>,
    json: bool,
    reinit_store: bool,
) -> Result<()> {
    let settings = load_settings();

    // Fatal problems surface before any statement is touched.
    let chart = match load_chart(&settings) {
        Ok(chart) => chart,
        Err(e) => {
            let missing = e.missing_categories();
            if !missing.is_empty() {
                let names: Vec<&str> = missing.iter().map(|c| c.label()).collect();
                eprintln!("{}", format!("Unusable chart sections: {}", names.join(", ")).red());
            }
            return Err(e);
        }
    };
    let store = open_store(&settings.store_path(), reinit_store)?;
    let history = store.snapshot()?;
    tracing::info!(vendors = history.len(), "coding history loaded");

    let inputs = if inputs.is_empty() {
        vec![settings.downloads_path()]
    } else {
        inputs
    };
    let files = discover_inputs(&inputs)?;
    if files.is_empty() {
        println!("No statements found in {}.", display_list(&inputs));
        store.close()?;
        return Ok(());
    }

    let options = BatchOptions {
        rules: settings.statement_rules(year.unwrap_or_else(|| Local::now().year())),
        timeout: settings.parse_timeout(),
    };
    let output = run_batch(&files, &options, &chart.taxonomy, &history, |event| {
        if let BatchEvent::FileStarted { index, total, path } = event {
            println!("[{}/{total}] {}", index + 1, path.display());
        }
    });

    let out_dir = output_dir.unwrap_or_else(|| PathBuf::from("."));
    let now = Local::now();
    let sheet = write_sheet_to_dir(&out_dir, &output.annotated, &chart.taxonomy, now)?;
    let handoff_path = if json {
        let path = sheet.with_extension("json");
        let handoff = Handoff {
            generated_at: Utc::now(),
            transactions: &output.annotated,
            taxonomy: &chart.taxonomy,
            files: &output.reports,
            duplicates_dropped: output.duplicates_dropped,
        };
        write_handoff(&path, &handoff)?;
        Some(path)
    } else {
        None
    };
    store.close()?;

    print_summary(&output);
    if history.is_empty() && !output.annotated.is_empty() {
        println!("Coding history is empty; run `cardledger finalize <sheet>` after review to remember codes.");
    }
    println!();
    println!("Review sheet: {}", sheet.display());
    if let Some(path) = handoff_path {
        println!("JSON:         {}", path.display());
    }

    if output.failed_count() == output.reports.len() {
        return Err(LedgerError::Other("No statement could be processed".to_string()));
    }
    Ok(())
}

fn display_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_summary(output: &BatchOutput) {
    let mut table = Table::new();
    table.set_header(vec!["File", "Status", "Rows", "Skipped", "Note"]);
    for report in &output.reports {
        let note = report
            .duplicate_of
            .as_ref()
            .map(|first| format!("same content as {first}"))
            .unwrap_or_default();
        match &report.status {
            FileStatus::Parsed { rows, skipped } => table.add_row(vec![
                Cell::new(&report.source),
                Cell::new("ok".green()),
                Cell::new(rows),
                Cell::new(skipped),
                Cell::new(note),
            ]),
            FileStatus::Failed { reason } => table.add_row(vec![
                Cell::new(&report.source),
                Cell::new("failed".red()),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new(reason),
            ]),
        };
    }
    println!("\nFiles\n{table}");

    let total = output.annotated.len();
    let prefilled = output.annotated.iter().filter(|a| a.history.is_some()).count();
    let ambiguous = output
        .annotated
        .iter()
        .filter(|a| a.transaction.has_note(TxnNote::AmbiguousSign))
        .count();
    let charges: Decimal = output
        .annotated
        .iter()
        .map(|a| a.transaction.amount)
        .filter(|a| a.is_sign_positive())
        .sum();
    let credits: Decimal = output
        .annotated
        .iter()
        .map(|a| a.transaction.amount)
        .filter(|a| a.is_sign_negative())
        .sum();
    println!("Transactions: {total} ({prefilled} pre-filled from history)");
    println!("Charges: {}  Credits: {}", money(charges), money(credits));
    if ambiguous > 0 {
        println!("{}", format!("Check sign on {ambiguous} transaction(s) marked ambiguous-sign.").yellow());
    }
    if output.duplicates_dropped > 0 {
        println!("Duplicates dropped: {}", output.duplicates_dropped);
    }
}
