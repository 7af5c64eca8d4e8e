use std::collections::BTreeMap;

use crate::models::{AnnotatedTransaction, Category, HistoryMatch, Suggestion, Transaction};
use crate::store::{vendor_key, HistorySnapshot};
use crate::taxonomy::Taxonomy;

/// Suggestions for one vendor: remembered codes that still exist in the
/// chart come first, then every other code of the category in chart order.
/// A remembered code missing from the chart is dropped, never offered.
pub fn suggest(vendor: &str, taxonomy: &Taxonomy, history: &HistorySnapshot) -> (BTreeMap<Category, Vec<Suggestion>>, Option<HistoryMatch>) {
    let key = vendor_key(vendor);
    let found = history.find(&key);
    let mut suggested = BTreeMap::new();

    for category in Category::ALL {
        let set = taxonomy.set(category);
        let mut list = Vec::with_capacity(set.len());
        let remembered = found.and_then(|(record, _)| record.codes.get(category));

        if let Some(code) = remembered {
            match set.get(code) {
                Some(entry) => list.push(Suggestion {
                    code: entry.code.clone(),
                    label: entry.label.clone(),
                    from_history: true,
                }),
                None => tracing::warn!(
                    vendor = %key,
                    category = category.key(),
                    code,
                    "remembered code is no longer in the chart of accounts"
                ),
            }
        }
        list.extend(
            set.iter()
                .filter(|e| Some(e.code.as_str()) != remembered)
                .map(|e| Suggestion {
                    code: e.code.clone(),
                    label: e.label.clone(),
                    from_history: false,
                }),
        );
        suggested.insert(category, list);
    }

    let matched = found.map(|(record, kind)| HistoryMatch {
        vendor_key: record.vendor_key.clone(),
        kind,
    });
    (suggested, matched)
}

pub fn annotate(transaction: Transaction, taxonomy: &Taxonomy, history: &HistorySnapshot) -> AnnotatedTransaction {
    let (suggested, history) = suggest(&transaction.vendor, taxonomy, history);
    if let Some(m) = &history {
        tracing::debug!(vendor = %transaction.vendor, key = %m.vendor_key, kind = ?m.kind, "history match");
    }
    AnnotatedTransaction {
        transaction,
        suggested,
        history,
    }
}

pub fn annotate_all(transactions: Vec<Transaction>, taxonomy: &Taxonomy, history: &HistorySnapshot) -> Vec<AnnotatedTransaction> {
    transactions
        .into_iter()
        .map(|t| annotate(t, taxonomy, history))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CodeChoices, CodingHistoryRecord, MatchKind, TxnDate};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn taxonomy() -> Taxonomy {
        Taxonomy::from_rows(&[
            (Category::Expense, "60100", "Office Supplies"),
            (Category::Expense, "60200", "Travel"),
            (Category::Expense, "60300", "Meals"),
            (Category::Location, "01", "Main Office"),
            (Category::Location, "02", "Warehouse"),
            (Category::Funder, "1001", "General Fund"),
            (Category::Program, "100", "Youth"),
            (Category::Department, "10", "Admin"),
        ])
    }

    fn history(key: &str, gl: &str, location: &str) -> HistorySnapshot {
        let mut codes = CodeChoices::default();
        codes.set(Category::Expense, Some(gl.to_string()));
        codes.set(Category::Location, Some(location.to_string()));
        HistorySnapshot::from_records([CodingHistoryRecord {
            vendor_key: key.to_string(),
            codes,
            last_used: Utc::now(),
        }])
    }

    fn txn(vendor: &str) -> Transaction {
        Transaction {
            date: TxnDate::Unparsed("03/14".to_string()),
            vendor: vendor.to_string(),
            amount: Decimal::new(4217, 2),
            raw_vendor: vendor.to_string(),
            reference: None,
            source_file: "s.pdf".to_string(),
            line_ordinal: 1,
            notes: vec![],
        }
    }

    fn codes(list: &[Suggestion]) -> Vec<&str> {
        list.iter().map(|s| s.code.as_str()).collect()
    }

    #[test]
    fn test_no_history_lists_chart_order() {
        let a = annotate(txn("STAPLES"), &taxonomy(), &HistorySnapshot::default());
        assert_eq!(codes(a.suggestions(Category::Expense)), vec!["60100", "60200", "60300"]);
        assert!(a.history.is_none());
        assert_eq!(a.prefill(Category::Expense), None);
    }

    #[test]
    fn test_history_code_is_ranked_first_without_duplicate() {
        let a = annotate(txn("Staples"), &taxonomy(), &history("staples", "60300", "02"));
        let gl = a.suggestions(Category::Expense);
        assert_eq!(codes(gl), vec!["60300", "60100", "60200"]);
        assert!(gl[0].from_history);
        assert!(!gl[1].from_history);
        assert_eq!(a.prefill(Category::Location), Some("02"));
        assert_eq!(a.prefill(Category::Funder), None);
        assert_eq!(a.history.unwrap().kind, MatchKind::Exact);
    }

    #[test]
    fn test_stale_history_code_is_omitted() {
        let a = annotate(txn("STAPLES"), &taxonomy(), &history("staples", "99999", "01"));
        assert_eq!(codes(a.suggestions(Category::Expense)), vec!["60100", "60200", "60300"]);
        assert!(a.suggestions(Category::Expense).iter().all(|s| !s.from_history));
        assert_eq!(a.prefill(Category::Location), Some("01"));
    }

    #[test]
    fn test_prefix_history_match() {
        let a = annotate(txn("AMAZON MKTPL SEATTLE WA"), &taxonomy(), &history("amazon mktpl", "60100", "01"));
        let m = a.history.as_ref().unwrap();
        assert_eq!(m.kind, MatchKind::Prefix);
        assert_eq!(m.vendor_key, "amazon mktpl");
        assert_eq!(a.prefill(Category::Expense), Some("60100"));
    }

    #[test]
    fn test_every_suggestion_is_valid() {
        let tax = taxonomy();
        let all = annotate_all(vec![txn("A"), txn("STAPLES")], &tax, &history("staples", "99999", "05"));
        for a in &all {
            for category in Category::ALL {
                assert!(a.suggestions(category).iter().all(|s| tax.is_valid(category, &s.code)));
            }
        }
    }
}
