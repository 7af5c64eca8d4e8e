use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Code taxonomy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Funder,
    Expense,
    Location,
    Program,
    Department,
}

impl Category {
    /// Chart-of-accounts document order.
    pub const ALL: [Category; 5] = [
        Category::Funder,
        Category::Expense,
        Category::Location,
        Category::Program,
        Category::Department,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Funder => "funder",
            Self::Expense => "gl",
            Self::Location => "location",
            Self::Program => "program",
            Self::Department => "dept",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Funder => "Funder",
            Self::Expense => "G/L Account",
            Self::Location => "Location",
            Self::Program => "Program",
            Self::Department => "Dept",
        }
    }

    /// Header phrases that open this category's section, normalized to
    /// upper case with single spaces. The first one is used in messages.
    pub fn header_phrases(&self) -> &'static [&'static str] {
        match self {
            Self::Funder => &["FUNDER CODE"],
            Self::Expense => &["EXP CODE", "EXPENSE CODE", "GL CODE", "G/L CODE"],
            Self::Location => &["LOC CODE", "LOCATION CODE"],
            Self::Program => &["PROG CODE", "PROGRAM CODE"],
            Self::Department => &["DEPT CODE", "DEPARTMENT CODE"],
        }
    }

    pub fn is_valid_code(&self, code: &str) -> bool {
        if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        match self {
            Self::Funder => code.len() == 4,
            Self::Expense => code.len() == 5,
            Self::Location => code.len() == 2,
            Self::Program | Self::Department => true,
        }
    }

    pub fn from_key(key: &str) -> Option<Category> {
        let key = key.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| {
            c.key() == key
                || c.label().to_lowercase() == key
                || (key == "expense" && *c == Self::Expense)
                || (key == "department" && *c == Self::Department)
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeEntry {
    pub code: String,
    pub label: String,
    pub category: Category,
}

impl CodeEntry {
    /// Dropdown form: `code - label`.
    pub fn display(&self) -> String {
        format!("{} - {}", self.code, self.label)
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnDate {
    Parsed(NaiveDate),
    /// Date token that did not form a calendar date; the fragment is kept.
    Unparsed(String),
}

impl fmt::Display for TxnDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parsed(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Unparsed(raw) => write!(f, "{raw}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TxnNote {
    AmbiguousSign,
    UnparsedDate,
    MergedContinuation,
}

impl fmt::Display for TxnNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AmbiguousSign => "ambiguous-sign",
            Self::UnparsedDate => "unparsed-date",
            Self::MergedContinuation => "merged-continuation",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: TxnDate,
    pub vendor: String,
    /// Purchases positive, credits and payments negative.
    pub amount: Decimal,
    pub raw_vendor: String,
    pub reference: Option<String>,
    pub source_file: String,
    pub line_ordinal: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<TxnNote>,
}

impl Transaction {
    pub fn has_note(&self, note: TxnNote) -> bool {
        self.notes.contains(&note)
    }
}

// ---------------------------------------------------------------------------
// Coding history
// ---------------------------------------------------------------------------

/// One optional code per category, as chosen by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChoices {
    pub gl: Option<String>,
    pub location: Option<String>,
    pub program: Option<String>,
    pub funder: Option<String>,
    pub dept: Option<String>,
}

impl CodeChoices {
    pub fn get(&self, category: Category) -> Option<&str> {
        match category {
            Category::Expense => self.gl.as_deref(),
            Category::Location => self.location.as_deref(),
            Category::Program => self.program.as_deref(),
            Category::Funder => self.funder.as_deref(),
            Category::Department => self.dept.as_deref(),
        }
    }

    pub fn set(&mut self, category: Category, code: Option<String>) {
        let slot = match category {
            Category::Expense => &mut self.gl,
            Category::Location => &mut self.location,
            Category::Program => &mut self.program,
            Category::Funder => &mut self.funder,
            Category::Department => &mut self.dept,
        };
        *slot = code.filter(|c| !c.trim().is_empty());
    }

    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.get(*c).is_none())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodingHistoryRecord {
    pub vendor_key: String,
    pub codes: CodeChoices,
    pub last_used: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Annotation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub code: String,
    pub label: String,
    pub from_history: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    /// A stored key that is a whole-word prefix of the transaction's key.
    Prefix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMatch {
    pub vendor_key: String,
    pub kind: MatchKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedTransaction {
    pub transaction: Transaction,
    pub suggested: BTreeMap<Category, Vec<Suggestion>>,
    pub history: Option<HistoryMatch>,
}

impl AnnotatedTransaction {
    pub fn suggestions(&self, category: Category) -> &[Suggestion] {
        self.suggested.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The remembered code for `category`, if history supplied one.
    pub fn prefill(&self, category: Category) -> Option<&str> {
        self.suggestions(category)
            .first()
            .filter(|s| s.from_history)
            .map(|s| s.code.as_str())
    }
}
