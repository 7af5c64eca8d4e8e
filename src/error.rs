use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::Category;

/// Why a chart-of-accounts section could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionProblem {
    HeaderNotFound,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyProblem {
    pub category: Category,
    pub problem: SectionProblem,
}

impl fmt::Display for TaxonomyProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.problem {
            SectionProblem::HeaderNotFound => write!(
                f,
                "{} section not found (expected a '{}' header)",
                self.category.label(),
                self.category.header_phrases()[0]
            ),
            SectionProblem::Empty => write!(
                f,
                "{} section under '{}' has no entries",
                self.category.label(),
                self.category.header_phrases()[0]
            ),
        }
    }
}

fn join_problems(problems: &[TaxonomyProblem]) -> String {
    problems
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Chart of accounts is invalid: {}", join_problems(.problems))]
    TaxonomyParse { problems: Vec<TaxonomyProblem> },

    #[error("{file}: unsupported format: {reason}")]
    UnsupportedFormat { file: String, reason: String },

    #[error("{file}: statement recognized but no transactions found")]
    NoTransactionsFound { file: String },

    #[error("Coding store at {} is unavailable: {reason}", .path.display())]
    StoreUnavailable { path: PathBuf, reason: String },

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl LedgerError {
    /// Errors that only invalidate one input file; the batch carries on.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat { .. } | Self::NoTransactionsFound { .. }
        )
    }

    /// The categories named by a `TaxonomyParse` error, in category order.
    pub fn missing_categories(&self) -> Vec<Category> {
        match self {
            Self::TaxonomyParse { problems } => problems.iter().map(|p| p.category).collect(),
            _ => Vec::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_error_names_headers() {
        let err = LedgerError::TaxonomyParse {
            problems: vec![
                TaxonomyProblem { category: Category::Location, problem: SectionProblem::HeaderNotFound },
                TaxonomyProblem { category: Category::Department, problem: SectionProblem::Empty },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("LOC CODE"), "{msg}");
        assert!(msg.contains("DEPT CODE"), "{msg}");
        assert!(msg.contains("has no entries"), "{msg}");
        assert_eq!(err.missing_categories(), vec![Category::Location, Category::Department]);
    }

    #[test]
    fn test_per_file_classification() {
        let unsupported = LedgerError::UnsupportedFormat { file: "a.pdf".into(), reason: "x".into() };
        let empty = LedgerError::NoTransactionsFound { file: "b.pdf".into() };
        let fatal = LedgerError::StoreUnavailable { path: PathBuf::from("/tmp/x.db"), reason: "bad".into() };
        assert!(unsupported.is_per_file());
        assert!(empty.is_per_file());
        assert!(!fatal.is_per_file());
    }
}
