use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use rust_decimal::Decimal;

use crate::models::{Transaction, TxnDate};

/// Identity of a transaction for de-duplication. The occurrence index keeps
/// genuinely repeated purchases within one statement apart, while the same
/// file supplied twice collapses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupeKey {
    date: TxnDate,
    raw_vendor: String,
    amount: Decimal,
    source: PathBuf,
    occurrence: usize,
}

/// Transactions parsed from one input. `source` identifies the file itself
/// (its canonical path), so same-named statements from different folders
/// stay distinct while `Transaction::source_file` is only a display label.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source: PathBuf,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Default)]
pub struct Assembled {
    pub transactions: Vec<Transaction>,
    pub duplicates_dropped: usize,
}

/// Concatenate per-file transaction lists in the order given, preserving
/// each file's internal order and dropping exact duplicates.
pub fn assemble(batches: Vec<SourceBatch>) -> Assembled {
    let mut seen: HashSet<DedupeKey> = HashSet::new();
    let mut out = Assembled::default();

    for batch in batches {
        let mut occurrences: HashMap<(TxnDate, String, Decimal), usize> = HashMap::new();
        for txn in batch.transactions {
            let slot = occurrences
                .entry((txn.date.clone(), txn.raw_vendor.clone(), txn.amount))
                .or_insert(0);
            let key = DedupeKey {
                date: txn.date.clone(),
                raw_vendor: txn.raw_vendor.clone(),
                amount: txn.amount,
                source: batch.source.clone(),
                occurrence: *slot,
            };
            *slot += 1;
            if seen.insert(key) {
                out.transactions.push(txn);
            } else {
                tracing::debug!(file = %txn.source_file, line = txn.line_ordinal, "duplicate transaction dropped");
                out.duplicates_dropped += 1;
            }
        }
    }
    out
}
