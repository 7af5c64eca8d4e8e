//! Review sheet output, JSON hand-off, and reading a reviewed sheet back
//! into the coding store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::FileReport;
use crate::error::Result;
use crate::models::{AnnotatedTransaction, Category, CodeChoices};
use crate::store::{vendor_key, CodingStore};
use crate::taxonomy::Taxonomy;

/// One row of the review sheet. Column order follows field order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Vendor")]
    pub vendor: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "G/L Account", default)]
    pub gl: String,
    #[serde(rename = "Location", default)]
    pub location: String,
    #[serde(rename = "Program", default)]
    pub program: String,
    #[serde(rename = "Funder", default)]
    pub funder: String,
    #[serde(rename = "Dept", default)]
    pub dept: String,
    #[serde(rename = "Amount")]
    pub amount: String,
    #[serde(rename = "Receipt_Received", default)]
    pub receipt_received: String,
    #[serde(rename = "Source", default)]
    pub source: String,
    #[serde(rename = "Notes", default)]
    pub notes: String,
}

impl SheetRow {
    fn cell(&self, category: Category) -> &str {
        match category {
            Category::Expense => &self.gl,
            Category::Location => &self.location,
            Category::Program => &self.program,
            Category::Funder => &self.funder,
            Category::Department => &self.dept,
        }
    }

    fn cell_mut(&mut self, category: Category) -> &mut String {
        match category {
            Category::Expense => &mut self.gl,
            Category::Location => &mut self.location,
            Category::Program => &mut self.program,
            Category::Funder => &mut self.funder,
            Category::Department => &mut self.dept,
        }
    }

    fn from_annotated(a: &AnnotatedTransaction, taxonomy: &Taxonomy) -> Self {
        let t = &a.transaction;
        let mut row = SheetRow {
            date: t.date.to_string(),
            vendor: t.vendor.clone(),
            description: t.raw_vendor.clone(),
            amount: t.amount.to_string(),
            receipt_received: "No".to_string(),
            source: t.source_file.clone(),
            notes: t
                .notes
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join("; "),
            ..SheetRow::default()
        };
        for category in Category::ALL {
            if let Some(entry) = a.prefill(category).and_then(|code| taxonomy.set(category).get(code)) {
                *row.cell_mut(category) = entry.display();
            }
        }
        row
    }
}

pub fn sheet_file_name(now: DateTime<Local>) -> String {
    format!("credit_card_transactions_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

pub fn write_sheet(path: &Path, annotated: &[AnnotatedTransaction], taxonomy: &Taxonomy) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    // serde writes the header with the first row
    if annotated.is_empty() {
        wtr.write_record(SHEET_COLUMNS)?;
    }
    for a in annotated {
        wtr.serialize(SheetRow::from_annotated(a, taxonomy))?;
    }
    wtr.flush()?;
    Ok(())
}

pub const SHEET_COLUMNS: [&str; 12] = [
    "Date",
    "Vendor",
    "Description",
    "G/L Account",
    "Location",
    "Program",
    "Funder",
    "Dept",
    "Amount",
    "Receipt_Received",
    "Source",
    "Notes",
];

/// Write the sheet into `dir` under a timestamped name.
pub fn write_sheet_to_dir(dir: &Path, annotated: &[AnnotatedTransaction], taxonomy: &Taxonomy, now: DateTime<Local>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(sheet_file_name(now));
    write_sheet(&path, annotated, taxonomy)?;
    Ok(path)
}

/// Everything an external renderer needs to build its own workbook.
#[derive(Serialize)]
pub struct Handoff<'a> {
    pub generated_at: DateTime<Utc>,
    pub transactions: &'a [AnnotatedTransaction],
    pub taxonomy: &'a Taxonomy,
    pub files: &'a [FileReport],
    pub duplicates_dropped: usize,
}

pub fn write_handoff(path: &Path, handoff: &Handoff<'_>) -> Result<()> {
    let json = serde_json::to_string_pretty(handoff)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Finalize
// ---------------------------------------------------------------------------

pub fn read_sheet(path: &Path) -> Result<Vec<SheetRow>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// The code part of a cell holding `code` or `code - label`.
pub fn leading_code(cell: &str) -> Option<&str> {
    let code = cell
        .trim()
        .split(|c: char| c.is_whitespace() || c == '-')
        .next()
        .unwrap_or_default();
    (!code.is_empty()).then_some(code)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedCode {
    /// 1-based data row, not counting the header.
    pub row: usize,
    pub vendor: String,
    pub category: Category,
    pub value: String,
}

#[derive(Debug, Default)]
pub struct Finalized {
    /// vendor_key -> codes; later rows replace earlier ones.
    pub codings: BTreeMap<String, CodeChoices>,
    pub rejected: Vec<RejectedCode>,
    pub uncoded_rows: usize,
}

pub fn collect_codings(rows: &[SheetRow], taxonomy: &Taxonomy) -> Finalized {
    let mut out = Finalized::default();
    for (i, row) in rows.iter().enumerate() {
        let key = vendor_key(&row.vendor);
        let mut codes = CodeChoices::default();
        for category in Category::ALL {
            let cell = row.cell(category);
            let Some(code) = leading_code(cell) else { continue };
            if taxonomy.is_valid(category, code) {
                codes.set(category, Some(code.to_string()));
            } else {
                tracing::warn!(row = i + 1, vendor = %row.vendor, category = category.key(), value = cell, "code not in chart of accounts, ignored");
                out.rejected.push(RejectedCode {
                    row: i + 1,
                    vendor: row.vendor.clone(),
                    category,
                    value: cell.to_string(),
                });
            }
        }
        if key.is_empty() || codes.is_empty() {
            out.uncoded_rows += 1;
            continue;
        }
        out.codings.insert(key, codes);
    }
    out
}

pub fn apply_codings(store: &CodingStore, finalized: &Finalized, now: DateTime<Utc>) -> Result<usize> {
    for (key, codes) in &finalized.codings {
        store.upsert(key, codes, now)?;
    }
    Ok(finalized.codings.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Suggestion, Transaction, TxnDate, TxnNote};
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn taxonomy() -> Taxonomy {
        Taxonomy::from_rows(&[
            (Category::Expense, "60100", "Office Supplies"),
            (Category::Expense, "60200", "Travel"),
            (Category::Location, "01", "Main Office"),
            (Category::Funder, "1001", "General Fund"),
        ])
    }

    fn annotated(vendor: &str, prefill_gl: Option<&str>) -> AnnotatedTransaction {
        let mut suggested = BTreeMap::new();
        suggested.insert(
            Category::Expense,
            vec![Suggestion {
                code: prefill_gl.unwrap_or("60100").to_string(),
                label: String::new(),
                from_history: prefill_gl.is_some(),
            }],
        );
        AnnotatedTransaction {
            transaction: Transaction {
                date: TxnDate::Unparsed("13/45".to_string()),
                vendor: vendor.to_string(),
                amount: Decimal::new(-4217, 2),
                raw_vendor: format!("{vendor}*1A2B3"),
                reference: None,
                source_file: "mar.pdf".to_string(),
                line_ordinal: 4,
                notes: vec![TxnNote::UnparsedDate, TxnNote::AmbiguousSign],
            },
            suggested,
            history: None,
        }
    }

    #[test]
    fn test_sheet_file_name() {
        let now = Local.with_ymd_and_hms(2025, 3, 14, 9, 5, 7).unwrap();
        assert_eq!(sheet_file_name(now), "credit_card_transactions_20250314_090507.csv");
    }

    #[test]
    fn test_sheet_rows_and_prefill() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.csv");
        write_sheet(&path, &[annotated("AMAZON", Some("60200")), annotated("DELI", None)], &taxonomy()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Date,Vendor,Description,G/L Account,Location,Program,Funder,Dept,Amount,Receipt_Received,Source,Notes"));
        let rows = read_sheet(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].gl, "60200 - Travel");
        assert_eq!(rows[0].description, "AMAZON*1A2B3");
        assert_eq!(rows[0].amount, "-42.17");
        assert_eq!(rows[0].date, "13/45");
        assert_eq!(rows[0].receipt_received, "No");
        assert_eq!(rows[0].notes, "unparsed-date; ambiguous-sign");
        assert_eq!(rows[1].gl, "");
    }

    #[test]
    fn test_empty_batch_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.csv");
        write_sheet(&path, &[], &taxonomy()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(read_sheet(&path).unwrap().is_empty());
    }

    #[test]
    fn test_leading_code() {
        assert_eq!(leading_code("60100 - Office Supplies"), Some("60100"));
        assert_eq!(leading_code(" 01 "), Some("01"));
        assert_eq!(leading_code("60100-Office"), Some("60100"));
        assert_eq!(leading_code(""), None);
        assert_eq!(leading_code("   "), None);
    }

    fn row(vendor: &str, gl: &str, location: &str) -> SheetRow {
        SheetRow {
            vendor: vendor.to_string(),
            gl: gl.to_string(),
            location: location.to_string(),
            ..SheetRow::default()
        }
    }

    #[test]
    fn test_collect_codings_validates_and_later_rows_win() {
        let rows = vec![
            row("Amazon", "60100 - Office Supplies", "01"),
            row("DELI", "99999", ""),
            row("AMAZON", "60200", ""),
            row("", "60100", ""),
        ];
        let f = collect_codings(&rows, &taxonomy());
        assert_eq!(f.codings.len(), 1);
        let amazon = &f.codings["amazon"];
        assert_eq!(amazon.gl.as_deref(), Some("60200"));
        assert_eq!(amazon.location, None);
        assert_eq!(f.rejected.len(), 1);
        assert_eq!(f.rejected[0].row, 2);
        assert_eq!(f.rejected[0].category, Category::Expense);
        assert_eq!(f.uncoded_rows, 2);
    }

    #[test]
    fn test_apply_codings_feeds_next_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = CodingStore::open(&dir.path().join("h.db")).unwrap();
        let f = collect_codings(&[row("amazon", "60200", "01")], &taxonomy());
        let now = Utc::now();
        assert_eq!(apply_codings(&store, &f, now).unwrap(), 1);

        let snapshot = store.snapshot().unwrap();
        let a = crate::resolver::annotate(annotated("Amazon", None).transaction, &taxonomy(), &snapshot);
        assert_eq!(a.suggestions(Category::Expense)[0].code, "60200");
        assert!(a.suggestions(Category::Expense)[0].from_history);
    }
}
