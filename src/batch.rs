//! One processing run: discover inputs, extract and parse each file, then
//! assemble and annotate the combined ledger.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;

use crate::assembler::{assemble, SourceBatch};
use crate::error::{LedgerError, Result};
use crate::extract::{compute_checksum, extract_text, file_label, DocumentKind};
use crate::models::{AnnotatedTransaction, Transaction};
use crate::resolver::annotate_all;
use crate::statement::{parse_statement, SkippedLine, StatementRules};
use crate::store::HistorySnapshot;
use crate::taxonomy::Taxonomy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Parsed { rows: usize, skipped: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub source: String,
    pub checksum: Option<String>,
    /// Earlier input in this run with byte-identical content.
    pub duplicate_of: Option<String>,
    /// Opening and closing dates printed on the statement, when found.
    pub period: Option<(NaiveDate, NaiveDate)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_lines: Vec<SkippedLine>,
    #[serde(flatten)]
    pub status: FileStatus,
}

impl FileReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, FileStatus::Failed { .. })
    }
}

/// Progress notifications for the presentation layer.
pub enum BatchEvent<'a> {
    FileStarted { index: usize, total: usize, path: &'a Path },
    FileFinished { index: usize, total: usize, report: &'a FileReport },
}

pub struct BatchOptions {
    pub rules: StatementRules,
    pub timeout: Duration,
}

pub struct BatchOutput {
    pub annotated: Vec<AnnotatedTransaction>,
    pub reports: Vec<FileReport>,
    pub duplicates_dropped: usize,
}

impl BatchOutput {
    pub fn failed_count(&self) -> usize {
        self.reports.iter().filter(|r| r.is_failed()).count()
    }
}

fn scan_dir(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    entries.sort();
    for path in entries {
        if path.is_dir() {
            scan_dir(&path, found)?;
        } else if DocumentKind::detect(&path).is_some() {
            found.push(path);
        }
    }
    Ok(())
}

/// Expand inputs into the ordered file list. Explicit files are kept as
/// given even when their extension is unknown, so they get a failure entry
/// in the report instead of vanishing; directories contribute their
/// `.pdf`/`.txt` files recursively in name order.
pub fn discover_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for input in inputs {
        if input.is_dir() {
            scan_dir(input, &mut found)?;
        } else if input.exists() {
            found.push(input.clone());
        } else {
            return Err(LedgerError::Other(format!("Input not found: {}", input.display())));
        }
    }
    Ok(found)
}

/// Extract and parse one file. Never fails: every problem becomes a
/// `Failed` report.
pub fn process_file(path: &Path, options: &BatchOptions) -> (FileReport, Vec<Transaction>) {
    let source = file_label(path);
    let checksum = compute_checksum(path).ok();
    let parsed = extract_text(path, options.timeout)
        .and_then(|text| parse_statement(&text, &source, &options.rules));

    let mut period = None;
    let mut skipped_lines = Vec::new();
    let (status, transactions) = match parsed {
        Ok(p) => {
            period = p.period;
            skipped_lines = p.skipped;
            (
                FileStatus::Parsed {
                    rows: p.transactions.len(),
                    skipped: skipped_lines.len(),
                },
                p.transactions,
            )
        }
        Err(e) => {
            if e.is_per_file() {
                tracing::warn!(file = %source, error = %e, "file skipped");
            } else {
                tracing::error!(file = %source, error = %e, "file could not be read");
            }
            (FileStatus::Failed { reason: e.to_string() }, Vec::new())
        }
    };
    let report = FileReport {
        path: path.to_path_buf(),
        source,
        checksum,
        duplicate_of: None,
        period,
        skipped_lines,
        status,
    };
    (report, transactions)
}

pub fn run_batch(
    paths: &[PathBuf],
    options: &BatchOptions,
    taxonomy: &Taxonomy,
    history: &HistorySnapshot,
    mut on_event: impl FnMut(BatchEvent<'_>),
) -> BatchOutput {
    let total = paths.len();
    let mut reports = Vec::with_capacity(total);
    let mut batches = Vec::with_capacity(total);
    let mut seen_content: HashMap<String, String> = HashMap::new();

    for (index, path) in paths.iter().enumerate() {
        on_event(BatchEvent::FileStarted { index, total, path });
        let (mut report, transactions) = process_file(path, options);
        if let Some(sum) = &report.checksum {
            match seen_content.get(sum) {
                Some(first) => {
                    tracing::warn!(file = %report.source, same_as = %first, "identical content supplied twice");
                    report.duplicate_of = Some(first.clone());
                }
                None => {
                    seen_content.insert(sum.clone(), report.source.clone());
                }
            }
        }
        on_event(BatchEvent::FileFinished {
            index,
            total,
            report: &report,
        });
        // the same file named twice collapses; same-named files elsewhere do not
        let source = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        reports.push(report);
        batches.push(SourceBatch { source, transactions });
    }

    let assembled = assemble(batches);
    if assembled.duplicates_dropped > 0 {
        tracing::warn!(count = assembled.duplicates_dropped, "duplicate transactions collapsed");
    }
    BatchOutput {
        annotated: annotate_all(assembled.transactions, taxonomy, history),
        reports,
        duplicates_dropped: assembled.duplicates_dropped,
    }
}
