//! Credit-card statement parser.
//!
//! Statement text is split into lines, each line is classified by
//! [`classify`], and the classified lines drive a small state machine that
//! emits [`Transaction`]s in document order. Malformed lines never fail the
//! document; they are recorded in [`ParsedStatement::skipped`].

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::models::{Transaction, TxnDate, TxnNote};

pub const DEFAULT_STATEMENT_MARKERS: &[&str] = &[
    "Transaction Details",
    "Statement Period",
    "Account Summary",
    "Minimum Payment Due",
];

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Textual markers used to decide whether an amount is a purchase or a
/// credit. Every list is matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignRules {
    /// Suffixes after an amount that mark a credit, e.g. `42.17 CR`.
    pub credit_suffixes: Vec<String>,
    /// Section headings whose rows are credits.
    pub credit_sections: Vec<String>,
    /// Section headings whose rows are purchases.
    pub purchase_sections: Vec<String>,
    /// Vendor phrases that indicate a credit when no stronger marker exists.
    pub credit_keywords: Vec<String>,
    /// Vendor phrases identifying a payment toward the card balance.
    pub payment_keywords: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for SignRules {
    fn default() -> Self {
        Self {
            credit_suffixes: strings(&["CR", "-"]),
            credit_sections: strings(&[
                "Payments",
                "Credits",
                "Other Credits",
                "Payments and Other Credits",
            ]),
            purchase_sections: strings(&[
                "Purchases",
                "Charges",
                "Purchases and Adjustments",
                "Purchases, Balance Transfers & Other Charges",
                "Fees Charged",
                "Interest Charged",
                "Cash Advances",
            ]),
            credit_keywords: strings(&[
                "PAYMENT THANK YOU",
                "AUTOMATIC PAYMENT",
                "ONLINE PAYMENT",
                "REFUND",
                "STATEMENT CREDIT",
            ]),
            payment_keywords: strings(&["PAYMENT THANK YOU", "AUTOMATIC PAYMENT", "ONLINE PAYMENT"]),
        }
    }
}

impl SignRules {
    fn is_credit_suffix(&self, suffix: &str) -> bool {
        self.credit_suffixes.iter().any(|s| s.eq_ignore_ascii_case(suffix))
    }

    fn section_kind(&self, line: &str) -> Option<Section> {
        let norm = collapse(line).to_lowercase();
        let norm = norm.trim_end_matches(':').trim();
        let norm = norm.strip_suffix("(continued)").unwrap_or(norm).trim();
        let best = |names: &[String]| {
            names
                .iter()
                .map(|n| n.to_lowercase())
                .filter(|n| {
                    norm == n
                        || norm
                            .strip_prefix(n.as_str())
                            .is_some_and(|rest| rest.starts_with(' ') && !rest.chars().any(|c| c.is_ascii_digit()))
                })
                .map(|n| n.len())
                .max()
        };
        match (best(&self.credit_sections), best(&self.purchase_sections)) {
            (Some(c), Some(p)) if p > c => Some(Section::Purchase),
            (Some(_), _) => Some(Section::Credit),
            (None, Some(_)) => Some(Section::Purchase),
            (None, None) => None,
        }
    }
}

fn contains_phrase(haystack_upper: &str, phrases: &[String]) -> bool {
    let padded = format!(" {haystack_upper} ");
    phrases
        .iter()
        .any(|p| padded.contains(&format!(" {} ", p.to_uppercase())))
}

/// Everything the parser needs to know beyond the text itself.
#[derive(Debug, Clone)]
pub struct StatementRules {
    pub markers: Vec<String>,
    pub sign: SignRules,
    /// Width of the statement's description column. Vendor text that fills
    /// it exactly was cut off and continues on the next line. Unset means
    /// only a dangling vendor (empty, or ending in `*`, `&`, `/` and the
    /// like) is treated as wrapped.
    pub wrap_width: Option<usize>,
    pub skip_card_payments: bool,
    /// Year for `MM/DD` dates when the statement period cannot be found.
    pub default_year: i32,
}

impl Default for StatementRules {
    fn default() -> Self {
        Self {
            markers: strings(DEFAULT_STATEMENT_MARKERS),
            sign: SignRules::default(),
            wrap_width: None,
            skip_card_payments: false,
            default_year: chrono::Local::now().year(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    DateWithoutAmount,
    MissingVendor,
    CardPayment,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::DateWithoutAmount => "date without amount",
            Self::MissingVendor => "no vendor text",
            Self::CardPayment => "card payment skipped",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedLine {
    pub line_ordinal: usize,
    pub text: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct ParsedStatement {
    pub transactions: Vec<Transaction>,
    pub skipped: Vec<SkippedLine>,
    pub period: Option<(NaiveDate, NaiveDate)>,
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})/(\d{1,2})(?:/(\d{4}|\d{2}))?$").expect("static regex"))
}

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<neg>-)?(?P<open>\()?\$?(?P<num>\d{1,3}(?:,\d{3})+|\d+)(?:\.(?P<cents>\d{1,2}))?(?P<close>\))?(?P<suffix>[A-Za-z]{1,3}|-)?$",
        )
        .expect("static regex")
    })
}

fn period_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\s*(?:-|\x{2013}|to|through|thru)\s*(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})",
        )
        .expect("static regex")
    })
}

fn noise_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:page\s+\d+(?:\s+of\s+\d+)?|.*\bcontinued\b.*)$").expect("static regex")
    })
}

/// Bank footers printed between rows; never part of a vendor.
fn boilerplate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bmember\s+fdic\b|\bN\.A\.|\bwww\.|https?://|\bcustomer\s+service\b|\b1-8\d\d-|\x{a9}|\(c\)\s*\d{4}")
            .expect("static regex")
    })
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn expand_year(raw: &str) -> Option<i32> {
    let y: i32 = raw.parse().ok()?;
    Some(if raw.len() == 2 { 2000 + y } else { y })
}

#[derive(Debug, Clone, PartialEq)]
struct DateToken {
    month: u32,
    day: u32,
    year: Option<i32>,
    raw: String,
}

impl DateToken {
    fn parse(token: &str) -> Option<Self> {
        let caps = date_re().captures(token)?;
        Some(Self {
            month: caps[1].parse().ok()?,
            day: caps[2].parse().ok()?,
            year: caps.get(3).and_then(|y| expand_year(y.as_str())),
            raw: token.to_string(),
        })
    }

    /// Explicit year, else the statement period, else the fallback year.
    /// Months after the closing month belong to the opening year, which
    /// covers December–January statements.
    fn resolve(&self, period: Option<(NaiveDate, NaiveDate)>, default_year: i32) -> TxnDate {
        let year = self.year.unwrap_or_else(|| match period {
            Some((start, end)) if self.month > end.month() => start.year(),
            Some((_, end)) => end.year(),
            None => default_year,
        });
        match NaiveDate::from_ymd_opt(year, self.month, self.day) {
            Some(d) => TxnDate::Parsed(d),
            None => TxnDate::Unparsed(self.raw.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct AmountToken {
    /// Magnitude; the sign is decided separately.
    value: Decimal,
    explicit_credit: bool,
}

impl AmountToken {
    fn parse(token: &str, rules: &SignRules) -> Option<Self> {
        let caps = amount_re().captures(token)?;
        let open = caps.name("open").is_some();
        let close = caps.name("close").is_some();
        if open != close {
            return None;
        }
        let suffix = caps.name("suffix").map(|m| m.as_str());
        if let Some(s) = suffix {
            if s != "-" && !rules.is_credit_suffix(s) {
                return None;
            }
        }
        let num = caps["num"].replace(',', "");
        let cents = caps.name("cents").map_or("", |m| m.as_str());
        let mut value = Decimal::from_str(&format!("{num}.{cents:0<2}")).ok()?;
        value.rescale(2);
        Some(Self {
            value,
            explicit_credit: caps.name("neg").is_some()
                || open
                || suffix.is_some_and(|s| rules.is_credit_suffix(s)),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct TxnLine {
    date: DateToken,
    reference: Option<String>,
    raw_vendor: String,
    amount: AmountToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Credit,
    Purchase,
}

#[derive(Debug, Clone, PartialEq)]
enum StatementLine {
    Blank,
    Marker,
    ColumnHeader { credit_column: bool },
    SectionHeader(Section),
    Transaction(TxnLine),
    DatedFragment,
    Text(String),
}

/// Byte spans of whitespace-separated tokens.
fn token_spans(line: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in line.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, line.len()));
    }
    spans
}

fn is_reference_number(token: &str) -> bool {
    token.len() >= 6
        && token.chars().all(|c| c.is_ascii_alphanumeric())
        && token.chars().any(|c| c.is_ascii_digit())
}

fn parse_txn_line(line: &str, rules: &SignRules) -> Option<TxnLine> {
    let spans = token_spans(line);
    let tok = |i: usize| &line[spans[i].0..spans[i].1];
    if spans.len() < 2 {
        return None;
    }
    let date = DateToken::parse(tok(0))?;

    // amount, optionally followed by a separate credit suffix word
    let mut last = spans.len() - 1;
    let mut suffix_credit = false;
    if last >= 2 && rules.is_credit_suffix(tok(last)) && AmountToken::parse(tok(last - 1), rules).is_some() {
        suffix_credit = true;
        last -= 1;
    }
    let mut amount = AmountToken::parse(tok(last), rules)?;
    amount.explicit_credit |= suffix_credit;

    // two-date layout: trans date, post date, reference number
    let mut first = 1;
    let mut date = date;
    let mut reference = None;
    if first < last {
        if let Some(post) = DateToken::parse(tok(first)) {
            date = post;
            first += 1;
            if first < last && is_reference_number(tok(first)) {
                reference = Some(tok(first).to_string());
                first += 1;
            }
        }
    }

    let raw_vendor = if first < last {
        line[spans[first].0..spans[last - 1].1].to_string()
    } else {
        String::new()
    };
    Some(TxnLine {
        date,
        reference,
        raw_vendor,
        amount,
    })
}

fn classify(line: &str, rules: &StatementRules) -> StatementLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return StatementLine::Blank;
    }
    let first = trimmed.split_whitespace().next().unwrap_or_default();
    if DateToken::parse(first).is_some() {
        if period_re().is_match(trimmed) && AmountToken::parse(trimmed.split_whitespace().last().unwrap_or_default(), &rules.sign).is_none() {
            return StatementLine::Text(collapse(trimmed));
        }
        return match parse_txn_line(trimmed, &rules.sign) {
            Some(txn) => StatementLine::Transaction(txn),
            None => StatementLine::DatedFragment,
        };
    }

    let upper = collapse(trimmed).to_uppercase();
    let has = |w: &str| upper.split(' ').any(|t| t == w);
    if (has("TRANS") && has("POST") && (has("REFERENCE") || has("DESCRIPTION"))) || (has("CREDITS") && has("CHARGES")) {
        return StatementLine::ColumnHeader {
            credit_column: has("CREDITS"),
        };
    }
    if let Some(section) = rules.sign.section_kind(trimmed) {
        return StatementLine::SectionHeader(section);
    }
    if rules.markers.iter().any(|m| upper.contains(&m.to_uppercase())) {
        return StatementLine::Marker;
    }
    StatementLine::Text(collapse(trimmed))
}

// ---------------------------------------------------------------------------
// Vendor normalization
// ---------------------------------------------------------------------------

fn is_glued_reference(tail: &str) -> bool {
    tail.len() >= 3
        && tail.chars().all(|c| c.is_ascii_alphanumeric())
        && tail.chars().any(|c| c.is_ascii_digit())
}

fn is_trailing_reference(token: &str) -> bool {
    let body = token.strip_prefix('#').unwrap_or(token);
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }
    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();
    if token.starts_with('#') {
        return digits > 0;
    }
    (digits == body.len() && digits >= 4) || (body.len() >= 6 && digits >= 3)
}

/// Strip glued `*REF` codes and trailing store/reference numbers, and
/// collapse whitespace. Falls back to the collapsed raw text if nothing
/// would remain.
pub fn normalize_vendor(raw: &str) -> String {
    let mut tokens: Vec<&str> = Vec::new();
    for token in raw.split_whitespace() {
        match token.split_once('*') {
            Some((head, tail)) if is_glued_reference(tail) => {
                if !head.is_empty() {
                    tokens.push(head);
                }
            }
            _ => tokens.push(token),
        }
    }
    while tokens.len() > 1 && tokens.last().is_some_and(|t| is_trailing_reference(t)) {
        tokens.pop();
    }
    if tokens.is_empty() {
        collapse(raw)
    } else {
        tokens.join(" ")
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

struct Pending {
    line: TxnLine,
    ordinal: usize,
    continuation: Option<String>,
    section: Option<Section>,
    credit_column: bool,
}

enum State {
    SeekingTransaction,
    MergingContinuation(Pending),
}

fn is_truncated(vendor: &str, wrap_width: Option<usize>) -> bool {
    let vendor = vendor.trim();
    vendor.is_empty()
        || vendor.ends_with(['*', '-', '&', '/', ',', '#'])
        || wrap_width.is_some_and(|w| vendor.chars().count() == w)
}

fn is_continuation(text: &str, rules: &StatementRules) -> bool {
    text.chars().any(char::is_alphabetic)
        && !noise_re().is_match(text)
        && !boilerplate_re().is_match(text)
        && !rules.markers.iter().any(|m| text.to_uppercase().contains(&m.to_uppercase()))
        && text
            .split_whitespace()
            .last()
            .is_some_and(|t| AmountToken::parse(t, &rules.sign).is_none())
}

/// Purchases positive, credits negative. Returns the signed amount and
/// whether the markers were too weak to be sure.
fn decide_sign(amount: &AmountToken, vendor_upper: &str, section: Option<Section>, credit_column: bool, rules: &SignRules) -> (Decimal, bool) {
    let credit = -amount.value;
    let purchase = amount.value;
    if amount.explicit_credit {
        return (credit, false);
    }
    let keyword = contains_phrase(vendor_upper, &rules.credit_keywords);
    match section {
        Some(Section::Credit) => (credit, false),
        Some(Section::Purchase) if keyword => (purchase, true),
        Some(Section::Purchase) => (purchase, false),
        None if keyword => (credit, false),
        None => (purchase, credit_column),
    }
}

struct Parser<'a> {
    rules: &'a StatementRules,
    source_file: &'a str,
    period: Option<(NaiveDate, NaiveDate)>,
    transactions: Vec<Transaction>,
    skipped: Vec<SkippedLine>,
    candidates: usize,
}

impl Parser<'_> {
    fn finish(&mut self, pending: Pending) {
        let Pending { line, ordinal, continuation, section, credit_column } = pending;
        let raw_vendor = match &continuation {
            Some(more) if line.raw_vendor.is_empty() => more.clone(),
            Some(more) => format!("{} {more}", line.raw_vendor.trim_end()),
            None => line.raw_vendor.clone(),
        };
        if raw_vendor.trim().is_empty() {
            self.skip(ordinal, &line.date.raw, SkipReason::MissingVendor);
            return;
        }
        let vendor = normalize_vendor(&raw_vendor);
        let vendor_upper = vendor.to_uppercase();
        if self.rules.skip_card_payments && contains_phrase(&vendor_upper, &self.rules.sign.payment_keywords) {
            self.skip(ordinal, &raw_vendor, SkipReason::CardPayment);
            return;
        }

        let mut notes = Vec::new();
        let date = line.date.resolve(self.period, self.rules.default_year);
        if matches!(date, TxnDate::Unparsed(_)) {
            notes.push(TxnNote::UnparsedDate);
        }
        let (amount, ambiguous) = decide_sign(&line.amount, &vendor_upper, section, credit_column, &self.rules.sign);
        if ambiguous {
            notes.push(TxnNote::AmbiguousSign);
        }
        if continuation.is_some() {
            notes.push(TxnNote::MergedContinuation);
        }
        tracing::debug!(line = ordinal, vendor = %vendor, amount = %amount, ?notes, "transaction");
        self.transactions.push(Transaction {
            date,
            vendor,
            amount,
            raw_vendor,
            reference: line.reference,
            source_file: self.source_file.to_string(),
            line_ordinal: ordinal,
            notes,
        });
    }

    fn skip(&mut self, ordinal: usize, text: &str, reason: SkipReason) {
        tracing::debug!(line = ordinal, %reason, "skipped line");
        self.skipped.push(SkippedLine {
            line_ordinal: ordinal,
            text: text.to_string(),
            reason,
        });
    }
}

fn find_period(text: &str) -> Option<(NaiveDate, NaiveDate)> {
    let caps = period_re().captures(text)?;
    let date = |m: usize, d: usize, y: usize| {
        NaiveDate::from_ymd_opt(expand_year(&caps[y])?, caps[m].parse().ok()?, caps[d].parse().ok()?)
    };
    let start = date(1, 2, 3)?;
    let end = date(4, 5, 6)?;
    (start <= end).then_some((start, end))
}

pub fn parse_statement(text: &str, source_file: &str, rules: &StatementRules) -> Result<ParsedStatement> {
    let upper = text.to_uppercase();
    if !rules.markers.iter().any(|m| upper.contains(&m.to_uppercase())) {
        return Err(LedgerError::UnsupportedFormat {
            file: source_file.to_string(),
            reason: "no credit-card statement markers found".to_string(),
        });
    }

    let mut parser = Parser {
        rules,
        source_file,
        period: find_period(text),
        transactions: Vec::new(),
        skipped: Vec::new(),
        candidates: 0,
    };
    let mut section: Option<Section> = None;
    let mut credit_column = false;
    let mut state = State::SeekingTransaction;

    for (idx, line) in text.lines().enumerate() {
        let ordinal = idx + 1;
        let token = classify(line, rules);

        if let State::MergingContinuation(mut pending) = std::mem::replace(&mut state, State::SeekingTransaction) {
            match &token {
                StatementLine::Text(t) if is_continuation(t, rules) => {
                    pending.continuation = Some(t.clone());
                    parser.finish(pending);
                    continue;
                }
                _ => parser.finish(pending),
            }
        }

        match token {
            StatementLine::Blank | StatementLine::Marker | StatementLine::Text(_) => {}
            StatementLine::ColumnHeader { credit_column: c } => credit_column |= c,
            StatementLine::SectionHeader(s) => section = Some(s),
            StatementLine::DatedFragment => {
                parser.candidates += 1;
                parser.skip(ordinal, line.trim(), SkipReason::DateWithoutAmount);
            }
            StatementLine::Transaction(txn) => {
                parser.candidates += 1;
                let pending = Pending {
                    ordinal,
                    continuation: None,
                    section,
                    credit_column,
                    line: txn,
                };
                if is_truncated(&pending.line.raw_vendor, rules.wrap_width) {
                    state = State::MergingContinuation(pending);
                } else {
                    parser.finish(pending);
                }
            }
        }
    }
    if let State::MergingContinuation(pending) = state {
        parser.finish(pending);
    }

    if parser.transactions.is_empty() && parser.skipped.iter().all(|s| s.reason == SkipReason::DateWithoutAmount) {
        return Err(LedgerError::NoTransactionsFound {
            file: source_file.to_string(),
        });
    }
    tracing::info!(
        file = source_file,
        transactions = parser.transactions.len(),
        skipped = parser.skipped.len(),
        candidates = parser.candidates,
        "statement parsed"
    );
    Ok(ParsedStatement {
        transactions: parser.transactions,
        skipped: parser.skipped,
        period: parser.period,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> StatementRules {
        StatementRules {
            default_year: 2025,
            ..StatementRules::default()
        }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn parse(text: &str) -> ParsedStatement {
        parse_statement(text, "stmt.pdf", &rules()).unwrap()
    }

    #[test]
    fn test_single_line_example() {
        let p = parse("Transaction Details\n03/14  AMAZON MKTPLACE US*1A2B3  -42.17\n");
        assert_eq!(p.transactions.len(), 1);
        let t = &p.transactions[0];
        assert_eq!(t.date, TxnDate::Parsed(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()));
        assert_eq!(t.vendor, "AMAZON MKTPLACE US");
        assert_eq!(t.raw_vendor, "AMAZON MKTPLACE US*1A2B3");
        assert_eq!(t.amount, dec("-42.17"));
        assert_eq!(t.line_ordinal, 2);
        assert_eq!(t.source_file, "stmt.pdf");
        assert!(t.notes.is_empty());
    }

    #[test]
    fn test_two_date_layout_uses_post_date_and_reference() {
        let text = "\
Statement Period 12/03/2024 to 01/02/2025
Transaction Details
Trans Post Reference Number Description Credits Charges
Purchases
12/30 12/31 5543286QJ5WN288J6 AMAZON MKTPL*KA0S393X3 SEATTLE WA 39.12
01/02 01/02 2469216ABCDE12345 STAPLES 00123 1,204.50
";
        let p = parse(text);
        assert_eq!(p.period.unwrap().0, NaiveDate::from_ymd_opt(2024, 12, 3).unwrap());
        assert_eq!(p.transactions.len(), 2);
        let a = &p.transactions[0];
        assert_eq!(a.date, TxnDate::Parsed(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
        assert_eq!(a.reference.as_deref(), Some("5543286QJ5WN288J6"));
        assert_eq!(a.vendor, "AMAZON MKTPL SEATTLE WA");
        assert_eq!(a.amount, dec("39.12"));
        let b = &p.transactions[1];
        assert_eq!(b.date, TxnDate::Parsed(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()));
        assert_eq!(b.vendor, "STAPLES");
        assert_eq!(b.amount, dec("1204.50"));
        assert!(!b.has_note(TxnNote::AmbiguousSign));
    }

    #[test]
    fn test_markers_present_but_no_rows() {
        let err = parse_statement("Account Summary\nNew Balance $0.00\n", "empty.pdf", &rules()).unwrap_err();
        assert!(matches!(err, LedgerError::NoTransactionsFound { ref file } if file == "empty.pdf"));
    }

    #[test]
    fn test_unrecognized_document() {
        let err = parse_statement("Dear customer,\n03/14 LUNCH 12.00\n", "letter.pdf", &rules()).unwrap_err();
        assert!(matches!(err, LedgerError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_vendor_filling_column_is_merged() {
        let text = "\
Transaction Details
03/01 03/02 ABC1234567 SOUTHWEST AIRLINES (WN) 0123 250.00
DALLAS TX
03/05 03/05 ABC7654321 SHELL OIL 57444 40.00
";
        let r = StatementRules {
            wrap_width: Some(28),
            ..rules()
        };
        let p = parse_statement(text, "stmt.pdf", &r).unwrap();
        assert_eq!(p.transactions.len(), 2);
        let t = &p.transactions[0];
        assert_eq!(t.raw_vendor, "SOUTHWEST AIRLINES (WN) 0123 DALLAS TX");
        assert_eq!(t.vendor, "SOUTHWEST AIRLINES (WN) 0123 DALLAS TX");
        assert!(t.has_note(TxnNote::MergedContinuation));
        assert_eq!(p.transactions[1].vendor, "SHELL OIL");
        assert_eq!(p.transactions[1].line_ordinal, 4);
    }

    #[test]
    fn test_long_vendor_is_complete_by_default() {
        let text = "\
Transaction Details
01/02 01/03 5543286QJ5WN288J6 AMAZON MKTPL*KA0S393X3 SEATTLE WA 39.12
Wells Fargo Bank, N.A. Member FDIC
";
        let p = parse(text);
        let t = &p.transactions[0];
        assert_eq!(t.raw_vendor, "AMAZON MKTPL*KA0S393X3 SEATTLE WA");
        assert_eq!(t.vendor, "AMAZON MKTPL SEATTLE WA");
        assert!(!t.has_note(TxnNote::MergedContinuation));
    }

    #[test]
    fn test_dangling_vendor_skips_footer_and_markers() {
        let text = "Transaction Details\n03/07 CORNER BAKERY & 18.25\nWells Fargo Bank, N.A. Member FDIC\n";
        let p = parse(text);
        assert_eq!(p.transactions[0].raw_vendor, "CORNER BAKERY &");

        let text = "Transaction Details\n03/07 CORNER BAKERY & 18.25\nAccount Summary continues here\n";
        let p = parse(text);
        assert_eq!(p.transactions[0].raw_vendor, "CORNER BAKERY &");
    }

    #[test]
    fn test_whole_dollar_amounts() {
        let p = parse("Transaction Details\n01/02 01/03 5543286QJ5WN288J6 HOME DEPOT 39\n01/04 FURNITURE BARN 1,204\n01/05 REFUND DESK 7.5 CR\n");
        let amounts: Vec<Decimal> = p.transactions.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![dec("39.00"), dec("1204.00"), dec("-7.50")]);
        assert_eq!(p.transactions[0].amount.scale(), 2);
        assert_eq!(p.transactions[0].vendor, "HOME DEPOT");
    }

    #[test]
    fn test_empty_vendor_takes_next_line() {
        let text = "Transaction Details\n03/07 18.25\nCORNER BAKERY CAFE\n";
        let p = parse(text);
        assert_eq!(p.transactions[0].vendor, "CORNER BAKERY CAFE");
        assert_eq!(p.transactions[0].line_ordinal, 2);
    }

    #[test]
    fn test_next_dated_line_is_not_merged() {
        let text = "Transaction Details\n03/07 18.25\n03/08 CORNER BAKERY CAFE 9.10\n";
        let p = parse(text);
        assert_eq!(p.transactions.len(), 1);
        assert_eq!(p.transactions[0].vendor, "CORNER BAKERY CAFE");
        assert_eq!(p.skipped.len(), 1);
        assert_eq!(p.skipped[0].reason, SkipReason::MissingVendor);
    }

    #[test]
    fn test_short_vendor_does_not_swallow_noise() {
        let text = "Transaction Details\n03/07 LYFT RIDE 18.25\nPage 1 of 2\n";
        let p = parse(text);
        assert_eq!(p.transactions[0].raw_vendor, "LYFT RIDE");
    }

    #[test]
    fn test_trailing_cr_marks_credit() {
        let p = parse("Transaction Details\n03/09 RETURNED ITEM TARGET 25.00 CR\n03/10 TARGET 0042 25.00CR\n");
        assert_eq!(p.transactions[0].amount, dec("-25.00"));
        assert_eq!(p.transactions[1].amount, dec("-25.00"));
        assert_eq!(p.transactions[1].vendor, "TARGET");
    }

    #[test]
    fn test_parenthesized_and_trailing_minus_are_credits() {
        let p = parse("Transaction Details\n03/09 REFUND CO (25.00)\n03/10 OTHER CO 5.00-\n");
        assert_eq!(p.transactions[0].amount, dec("-25.00"));
        assert_eq!(p.transactions[1].amount, dec("-5.00"));
    }

    #[test]
    fn test_payment_section_makes_credits() {
        let text = "\
Transaction Details
Payments
03/03 03/03 F1234567890 ONLINE TRANSFER REF 500.00
Purchases
03/04 03/04 F1234567891 OFFICE DEPOT 45.00
";
        let p = parse(text);
        assert_eq!(p.transactions[0].amount, dec("-500.00"));
        assert_eq!(p.transactions[1].amount, dec("45.00"));
        assert!(p.transactions.iter().all(|t| t.notes.is_empty()));
    }

    #[test]
    fn test_credit_column_without_markers_is_ambiguous() {
        let text = "\
Transaction Details
Trans Post Reference Number Description Credits Charges
03/04 03/04 F1234567891 OFFICE DEPOT 45.00
03/05 03/05 F1234567892 PAYMENT THANK YOU 300.00
";
        let p = parse(text);
        assert_eq!(p.transactions[0].amount, dec("45.00"));
        assert!(p.transactions[0].has_note(TxnNote::AmbiguousSign));
        assert_eq!(p.transactions[1].amount, dec("-300.00"));
        assert!(!p.transactions[1].has_note(TxnNote::AmbiguousSign));
    }

    #[test]
    fn test_keyword_in_purchase_section_is_ambiguous() {
        let p = parse("Transaction Details\nPurchases\n03/04 STORE REFUND DESK 45.00\n");
        assert_eq!(p.transactions[0].amount, dec("45.00"));
        assert!(p.transactions[0].has_note(TxnNote::AmbiguousSign));
    }

    #[test]
    fn test_skip_card_payments_setting() {
        let mut r = rules();
        r.skip_card_payments = true;
        let p = parse_statement(
            "Transaction Details\n03/05 PAYMENT THANK YOU 300.00\n03/06 DELI 8.00\n",
            "s.pdf",
            &r,
        )
        .unwrap();
        assert_eq!(p.transactions.len(), 1);
        assert_eq!(p.skipped[0].reason, SkipReason::CardPayment);
    }

    #[test]
    fn test_invalid_date_is_kept_unparsed() {
        let p = parse("Transaction Details\n02/30 MYSTERY VENDOR 10.00\n");
        let t = &p.transactions[0];
        assert_eq!(t.date, TxnDate::Unparsed("02/30".to_string()));
        assert!(t.has_note(TxnNote::UnparsedDate));
    }

    #[test]
    fn test_dated_line_without_amount_is_skipped_not_fatal() {
        let p = parse("Transaction Details\n03/01 BALANCE FORWARD\n03/02 DELI 8.00\n");
        assert_eq!(p.transactions.len(), 1);
        assert_eq!(p.skipped[0].reason, SkipReason::DateWithoutAmount);
        assert_eq!(p.skipped[0].line_ordinal, 2);
    }

    #[test]
    fn test_full_dates_and_two_digit_years() {
        let p = parse("Transaction Details\n03/02/24 DELI 8.00\n04/05/2023 CAFE 3.50\n");
        assert_eq!(p.transactions[0].date, TxnDate::Parsed(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()));
        assert_eq!(p.transactions[1].date, TxnDate::Parsed(NaiveDate::from_ymd_opt(2023, 4, 5).unwrap()));
    }

    #[test]
    fn test_document_order_is_preserved() {
        let p = parse("Transaction Details\n03/20 LATE 1.00\n03/01 EARLY 2.00\n");
        let ordinals: Vec<usize> = p.transactions.iter().map(|t| t.line_ordinal).collect();
        assert_eq!(ordinals, vec![2, 3]);
        assert_eq!(p.transactions[0].vendor, "LATE");
    }

    #[test]
    fn test_normalize_vendor() {
        assert_eq!(normalize_vendor("AMAZON MKTPLACE US*1A2B3"), "AMAZON MKTPLACE US");
        assert_eq!(normalize_vendor("SQ *BLUE BOTTLE COFFEE"), "SQ *BLUE BOTTLE COFFEE");
        assert_eq!(normalize_vendor("STARBUCKS STORE 12345"), "STARBUCKS STORE");
        assert_eq!(normalize_vendor("WALGREENS   #4411"), "WALGREENS");
        assert_eq!(normalize_vendor("DELTA AIR 0062345678901"), "DELTA AIR");
        assert_eq!(normalize_vendor("7-ELEVEN 1234"), "7-ELEVEN");
        assert_eq!(normalize_vendor("12345"), "12345");
        assert_eq!(normalize_vendor("  ZOOM.US   888-799-9666 "), "ZOOM.US 888-799-9666");
    }

    #[test]
    fn test_section_kind_matching() {
        let rules = SignRules::default();
        assert_eq!(rules.section_kind("Payments"), Some(Section::Credit));
        assert_eq!(rules.section_kind("PAYMENTS AND OTHER CREDITS:"), Some(Section::Credit));
        assert_eq!(rules.section_kind("Purchases (continued)"), Some(Section::Purchase));
        assert_eq!(rules.section_kind("Payments -$500.00"), None);
        assert_eq!(rules.section_kind("Payment due date"), None);
    }

    #[test]
    fn test_custom_credit_suffix() {
        let mut r = rules();
        r.sign.credit_suffixes.push("CRD".to_string());
        let p = parse_statement("Transaction Details\n03/09 STORE 25.00 CRD\n", "s.pdf", &r).unwrap();
        assert_eq!(p.transactions[0].amount, dec("-25.00"));
    }
}
