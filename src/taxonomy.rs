//! Chart-of-accounts parser.
//!
//! The document is a sequence of sections, each opened by a header line such
//! as `FUNDER CODE` or `EXP CODE`, followed by `<code> <label>` rows. Every
//! line is classified first and then fed through a two-state machine.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{LedgerError, Result, SectionProblem, TaxonomyProblem};
use crate::models::{Category, CodeEntry};

// ---------------------------------------------------------------------------
// Code sets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CodeSet {
    pub category: Category,
    pub entries: Vec<CodeEntry>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl CodeSet {
    fn new(category: Category) -> Self {
        Self {
            category,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Returns false when the code is already present (first one wins).
    fn insert(&mut self, code: &str, label: &str) -> bool {
        if self.index.contains_key(code) {
            return false;
        }
        self.index.insert(code.to_string(), self.entries.len());
        self.entries.push(CodeEntry {
            code: code.to_string(),
            label: label.to_string(),
            category: self.category,
        });
        true
    }

    pub fn get(&self, code: &str) -> Option<&CodeEntry> {
        self.index.get(code).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodeEntry> {
        self.entries.iter()
    }
}

/// The five validated code sets for one run.
#[derive(Debug, Clone, Serialize)]
pub struct Taxonomy {
    sets: BTreeMap<Category, CodeSet>,
}

impl Taxonomy {
    /// Build from `(category, code, label)` rows, first occurrence wins.
    #[cfg(test)]
    pub fn from_rows(rows: &[(Category, &str, &str)]) -> Self {
        let mut sets: BTreeMap<Category, CodeSet> =
            Category::ALL.iter().map(|c| (*c, CodeSet::new(*c))).collect();
        for (category, code, label) in rows {
            if let Some(set) = sets.get_mut(category) {
                set.insert(code, label);
            }
        }
        Self { sets }
    }

    pub fn set(&self, category: Category) -> &CodeSet {
        // Every constructor fills all five categories.
        &self.sets[&category]
    }

    pub fn is_valid(&self, category: Category, code: &str) -> bool {
        self.set(category).contains(code)
    }

    pub fn total(&self) -> usize {
        self.sets.values().map(CodeSet::len).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SectionStats {
    pub entries: usize,
    pub duplicates: usize,
    pub unparsed_lines: usize,
}

#[derive(Debug, Clone)]
pub struct ParsedChart {
    pub taxonomy: Taxonomy,
    pub stats: BTreeMap<Category, SectionStats>,
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum ChartLine<'a> {
    Blank,
    Header(Category),
    Entry { code: &'a str, label: String },
    Text { text: String, has_digits: bool },
}

fn entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+)(?:\s*[-\u{2013}:]\s*|\s+)(\S.*)$").expect("static regex")
    })
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn header_category(normalized_upper: &str) -> Option<Category> {
    Category::ALL
        .iter()
        .filter_map(|c| {
            c.header_phrases()
                .iter()
                .filter_map(|p| normalized_upper.find(p))
                .min()
                .map(|pos| (pos, *c))
        })
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, c)| c)
}

fn classify(line: &str) -> ChartLine<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ChartLine::Blank;
    }
    if let Some(caps) = entry_re().captures(trimmed) {
        if let (Some(code), Some(label)) = (caps.get(1), caps.get(2)) {
            if label.as_str().chars().any(char::is_alphabetic) {
                return ChartLine::Entry {
                    code: code.as_str(),
                    label: collapse(label.as_str()),
                };
            }
        }
    }
    let normalized = collapse(trimmed).to_uppercase();
    if !trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        if let Some(category) = header_category(&normalized) {
            return ChartLine::Header(category);
        }
    }
    ChartLine::Text {
        has_digits: trimmed.chars().any(|c| c.is_ascii_digit()),
        text: collapse(trimmed),
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    SeekingHeader,
    InCategory(Category),
}

/// Where a label-continuation line should go.
#[derive(Debug, Clone, Copy)]
enum Continuation {
    None,
    Entry(usize),
    /// The previous row was a discarded duplicate; its continuation goes too.
    Discard,
}

pub fn parse_chart(text: &str) -> Result<ParsedChart> {
    let mut sets: BTreeMap<Category, CodeSet> =
        Category::ALL.iter().map(|c| (*c, CodeSet::new(*c))).collect();
    let mut stats: BTreeMap<Category, SectionStats> =
        Category::ALL.iter().map(|c| (*c, SectionStats::default())).collect();
    let mut seen_header: Vec<Category> = Vec::new();

    let mut state = State::SeekingHeader;
    let mut continuation = Continuation::None;

    for (lineno, line) in text.lines().enumerate() {
        let token = classify(line);
        match (state, token) {
            (_, ChartLine::Blank) => {}
            (_, ChartLine::Header(category)) => {
                tracing::debug!(line = lineno + 1, category = %category, "section header");
                if !seen_header.contains(&category) {
                    seen_header.push(category);
                }
                state = State::InCategory(category);
                continuation = Continuation::None;
            }
            (State::SeekingHeader, _) => {}
            (State::InCategory(category), ChartLine::Entry { code, label }) => {
                let stat = stats.entry(category).or_default();
                if !category.is_valid_code(code) {
                    tracing::debug!(line = lineno + 1, code, "code does not fit {category} format");
                    stat.unparsed_lines += 1;
                    continuation = Continuation::None;
                    continue;
                }
                let set = sets.entry(category).or_insert_with(|| CodeSet::new(category));
                if set.insert(code, &label) {
                    continuation = Continuation::Entry(set.len() - 1);
                } else {
                    stat.duplicates += 1;
                    continuation = Continuation::Discard;
                }
            }
            (State::InCategory(category), ChartLine::Text { text, has_digits }) => {
                if has_digits {
                    stats.entry(category).or_default().unparsed_lines += 1;
                    continue;
                }
                match continuation {
                    Continuation::Entry(idx) => {
                        if let Some(entry) = sets.get_mut(&category).and_then(|s| s.entries.get_mut(idx)) {
                            entry.label.push(' ');
                            entry.label.push_str(&text);
                        }
                    }
                    Continuation::Discard | Continuation::None => {}
                }
            }
        }
    }

    let mut problems = Vec::new();
    for category in Category::ALL {
        let set = &sets[&category];
        if let Some(stat) = stats.get_mut(&category) {
            stat.entries = set.len();
        }
        if !seen_header.contains(&category) {
            problems.push(TaxonomyProblem {
                category,
                problem: SectionProblem::HeaderNotFound,
            });
        } else if set.is_empty() {
            problems.push(TaxonomyProblem {
                category,
                problem: SectionProblem::Empty,
            });
        }
    }
    if !problems.is_empty() {
        return Err(LedgerError::TaxonomyParse { problems });
    }

    for (category, stat) in &stats {
        if stat.duplicates > 0 || stat.unparsed_lines > 0 {
            tracing::warn!(
                category = %category,
                duplicates = stat.duplicates,
                unparsed = stat.unparsed_lines,
                "chart of accounts section has irregular lines"
            );
        }
    }

    Ok(ParsedChart {
        taxonomy: Taxonomy { sets },
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHART: &str = "\
Chart of Accounts FY2025

FUNDER CODE   FUNDER NAME
1001 United Way
1002 County Health Dept
1001 Duplicate United Way

EXP CODE   EXPENSE
60100 Office Supplies
60200 Travel and
   Conference Fees
60300 Software

Loc   Code
01 Main Office
02 Eastside Clinic

PROG CODE
100 Youth Services
2000 Senior Meals

DEPT CODE
10 Administration
20 Programs
";

    fn codes(chart: &ParsedChart, category: Category) -> Vec<(String, String)> {
        chart
            .taxonomy
            .set(category)
            .iter()
            .map(|e| (e.code.clone(), e.label.clone()))
            .collect()
    }

    #[test]
    fn test_parses_all_five_sections() {
        let chart = parse_chart(CHART).unwrap();
        assert_eq!(
            codes(&chart, Category::Funder),
            vec![
                ("1001".to_string(), "United Way".to_string()),
                ("1002".to_string(), "County Health Dept".to_string()),
            ]
        );
        assert_eq!(chart.taxonomy.set(Category::Expense).len(), 3);
        assert_eq!(chart.taxonomy.set(Category::Location).len(), 2);
        assert_eq!(chart.taxonomy.set(Category::Program).len(), 2);
        assert_eq!(chart.taxonomy.set(Category::Department).len(), 2);
        assert_eq!(chart.taxonomy.total(), 11);
    }

    #[test]
    fn test_first_occurrence_wins_and_counts_duplicates() {
        let chart = parse_chart(CHART).unwrap();
        let funder = chart.taxonomy.set(Category::Funder);
        assert_eq!(funder.get("1001").unwrap().label, "United Way");
        assert_eq!(chart.stats[&Category::Funder].duplicates, 1);
    }

    #[test]
    fn test_multi_line_labels_are_joined() {
        let chart = parse_chart(CHART).unwrap();
        let exp = chart.taxonomy.set(Category::Expense);
        assert_eq!(exp.get("60200").unwrap().label, "Travel and Conference Fees");
    }

    #[test]
    fn test_header_is_case_and_whitespace_tolerant() {
        assert_eq!(classify("Loc   Code"), ChartLine::Header(Category::Location));
        assert_eq!(classify("  exp code  description"), ChartLine::Header(Category::Expense));
        assert_eq!(classify("Department Code"), ChartLine::Header(Category::Department));
    }

    #[test]
    fn test_wrong_width_codes_are_unparsed() {
        let text = CHART.replace("01 Main Office", "001 Main Office");
        let chart = parse_chart(&text).unwrap();
        assert_eq!(chart.taxonomy.set(Category::Location).len(), 1);
        assert_eq!(chart.stats[&Category::Location].unparsed_lines, 1);
    }

    #[test]
    fn test_digit_lines_inside_section_are_counted_not_joined() {
        let text = CHART.replace("60300 Software", "60300 Software\nPage 2 of 3");
        let chart = parse_chart(&text).unwrap();
        assert_eq!(chart.taxonomy.set(Category::Expense).get("60300").unwrap().label, "Software");
        assert_eq!(chart.stats[&Category::Expense].unparsed_lines, 1);
    }

    #[test]
    fn test_code_with_separator() {
        match classify("10 - Administration") {
            ChartLine::Entry { code, label } => {
                assert_eq!(code, "10");
                assert_eq!(label, "Administration");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_header_is_named() {
        let text = CHART.replace("PROG CODE", "PROGRAMS");
        let err = parse_chart(&text).unwrap_err();
        match &err {
            LedgerError::TaxonomyParse { problems } => {
                assert_eq!(problems.len(), 1);
                assert_eq!(problems[0].category, Category::Program);
                assert_eq!(problems[0].problem, SectionProblem::HeaderNotFound);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.to_string().contains("PROG CODE"));
    }

    #[test]
    fn test_empty_section_is_an_error() {
        let text = CHART.replace("10 Administration\n20 Programs\n", "");
        let err = parse_chart(&text).unwrap_err();
        match err {
            LedgerError::TaxonomyParse { problems } => {
                assert_eq!(problems, vec![TaxonomyProblem {
                    category: Category::Department,
                    problem: SectionProblem::Empty,
                }]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_all_missing_lists_every_category() {
        let err = parse_chart("nothing to see here").unwrap_err();
        assert_eq!(err.missing_categories(), Category::ALL.to_vec());
    }

    #[test]
    fn test_preamble_is_ignored() {
        let chart = parse_chart(CHART).unwrap();
        assert!(chart.taxonomy.set(Category::Funder).iter().all(|e| !e.label.contains("FY2025")));
    }
}
