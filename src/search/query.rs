//! Extraction of time and size constraints from free-text queries.
//!
//! Recognised phrasings:
//! - `[in the] last N hour(s)|day(s)|week(s)|month(s)`, optionally qualified by
//!   "created", "modified" or "accessed" elsewhere in the query
//! - `smaller than 5 mb`, `bigger than 1.5gb`, `equal to 10 kb`
//! - `2kb or more`, `3 mb or smaller`
//! - `<= 500kb`, `>2 gb`
//!
//! Whatever is left once the phrases are removed is the residual text used for
//! name and path matching.

use crate::storage::record::{now_seconds, FileRecord, TimeField};
use regex::Regex;
use std::fmt;
use std::ops::Range;

const HOUR: u64 = 3_600;
const DAY: u64 = 86_400;
const WEEK: u64 = 604_800;
/// Fixed 30-day month
const MONTH: u64 = 2_592_000;

const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;
const TB: f64 = GB * 1024.0;

const SIZE: &str = r"(?P<value>\d+(?:\.\d+)?)\s*(?P<unit>kb|mb|gb|tb)";

/// Keywords selecting the timestamp a time constraint applies to, checked in order.
const TIME_FIELD_KEYWORDS: [(TimeField, &[&str]); 3] = [
    (TimeField::CreatedAt, &["created", "creation"]),
    (TimeField::ModifiedAt, &["modified", "modification", "changed"]),
    (TimeField::AccessedAt, &["accessed", "access"]),
];

/// Comparison applied to a file's size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeOp {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
}

impl SizeOp {
    pub fn apply(self, size: u64, bytes: u64) -> bool {
        match self {
            SizeOp::Lt => size < bytes,
            SizeOp::Gt => size > bytes,
            SizeOp::Le => size <= bytes,
            SizeOp::Ge => size >= bytes,
            SizeOp::Eq => size == bytes,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            SizeOp::Lt => "<",
            SizeOp::Gt => ">",
            SizeOp::Le => "<=",
            SizeOp::Ge => ">=",
            SizeOp::Eq => "=",
        }
    }
}

impl fmt::Display for SizeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// `field >= cutoff`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeConstraint {
    pub field: TimeField,
    /// Unix seconds
    pub cutoff: f64,
}

impl TimeConstraint {
    pub fn matches(&self, record: &FileRecord) -> bool {
        record.timestamp(self.field) >= self.cutoff
    }
}

/// `size OP bytes`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeConstraint {
    pub op: SizeOp,
    pub bytes: u64,
}

impl SizeConstraint {
    pub fn matches(&self, record: &FileRecord) -> bool {
        self.op.apply(record.size, self.bytes)
    }
}

/// A query split into its constraints and the remaining free text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub time: Option<TimeConstraint>,
    pub size: Option<SizeConstraint>,
    /// Lower-cased text left after removing the constraint phrases
    pub residual: String,
}

impl ParsedQuery {
    pub fn has_constraints(&self) -> bool {
        self.time.is_some() || self.size.is_some()
    }

    /// Whether `record` satisfies every extracted constraint.
    pub fn admits(&self, record: &FileRecord) -> bool {
        self.time.map_or(true, |t| t.matches(record))
            && self.size.map_or(true, |s| s.matches(record))
    }
}

/// Where a size rule takes its operator from
#[derive(Debug, Clone, Copy)]
enum OperatorSource {
    Fixed(SizeOp),
    /// The `word` capture: less/smaller map to `<`, greater/larger/bigger to `>`
    Word,
}

struct SizeRule {
    pattern: Regex,
    operator: OperatorSource,
}

struct Match<T> {
    value: T,
    span: Range<usize>,
}

/// Rule-based constraint parser. Size rules are tried in order and the first
/// match wins.
pub struct QueryParser {
    time_pattern: Regex,
    size_rules: Vec<SizeRule>,
    leading_file: Regex,
    whitespace: Regex,
}

impl QueryParser {
    pub fn new() -> Self {
        use OperatorSource::{Fixed, Word};

        let rules: [(String, OperatorSource); 17] = [
            (format!(r"smaller\s+than\s+{SIZE}"), Fixed(SizeOp::Lt)),
            (format!(r"less\s+than\s+{SIZE}"), Fixed(SizeOp::Lt)),
            (format!(r"larger\s+than\s+{SIZE}"), Fixed(SizeOp::Gt)),
            (format!(r"greater\s+than\s+{SIZE}"), Fixed(SizeOp::Gt)),
            (format!(r"bigger\s+than\s+{SIZE}"), Fixed(SizeOp::Gt)),
            (format!(r"equal\s+to\s+{SIZE}"), Fixed(SizeOp::Eq)),
            (format!(r"{SIZE}\s+or\s+less"), Fixed(SizeOp::Le)),
            (format!(r"{SIZE}\s+or\s+more"), Fixed(SizeOp::Ge)),
            (format!(r"{SIZE}\s+or\s+smaller"), Fixed(SizeOp::Le)),
            (format!(r"{SIZE}\s+or\s+larger"), Fixed(SizeOp::Ge)),
            (format!(r"{SIZE}\s+or\s+bigger"), Fixed(SizeOp::Ge)),
            (format!(r"<\s*{SIZE}"), Fixed(SizeOp::Lt)),
            (format!(r">\s*{SIZE}"), Fixed(SizeOp::Gt)),
            (format!(r"<=\s*{SIZE}"), Fixed(SizeOp::Le)),
            (format!(r">=\s*{SIZE}"), Fixed(SizeOp::Ge)),
            (format!(r"=\s*{SIZE}"), Fixed(SizeOp::Eq)),
            (
                format!(r"files?\s+(?P<word>less|smaller|greater|larger|bigger)\s+than\s+{SIZE}"),
                Word,
            ),
        ];

        let size_rules = rules
            .into_iter()
            .map(|(pattern, operator)| SizeRule {
                pattern: compile(&pattern),
                operator,
            })
            .collect();

        Self {
            time_pattern: compile(
                r"(?:in\s+the\s+)?last\s+(?P<value>\d+)\s+(?P<unit>hours?|days?|weeks?|months?)",
            ),
            size_rules,
            leading_file: compile(r"^files?\b"),
            whitespace: compile(r"\s+"),
        }
    }

    /// Time constraint relative to the current time
    pub fn parse_time_constraint(&self, query: &str) -> Option<TimeConstraint> {
        self.parse_time_constraint_at(query, now_seconds())
    }

    pub fn parse_time_constraint_at(&self, query: &str, now: f64) -> Option<TimeConstraint> {
        self.match_time(&query.to_lowercase(), now).map(|m| m.value)
    }

    pub fn parse_size_constraint(&self, query: &str) -> Option<SizeConstraint> {
        self.match_size(&query.to_lowercase()).map(|m| m.value)
    }

    pub fn parse(&self, query: &str) -> ParsedQuery {
        self.parse_at(query, now_seconds())
    }

    /// Extract both constraints and the residual text, evaluating time phrases against `now`.
    pub fn parse_at(&self, query: &str, now: f64) -> ParsedQuery {
        let lowered = query.to_lowercase();
        let time = self.match_time(&lowered, now);
        let size = self.match_size(&lowered);

        let mut spans: Vec<Range<usize>> = Vec::new();
        if let Some(m) = &time {
            spans.push(m.span.clone());
        }
        if let Some(m) = &size {
            spans.push(m.span.clone());
        }
        let residual = remove_spans(&lowered, spans);
        let residual = self.whitespace.replace_all(residual.trim(), " ");
        let residual = self.leading_file.replace(&residual, "");
        let residual = residual.trim().to_string();

        ParsedQuery {
            time: time.map(|m| m.value),
            size: size.map(|m| m.value),
            residual,
        }
    }

    fn match_time(&self, lowered: &str, now: f64) -> Option<Match<TimeConstraint>> {
        let caps = self.time_pattern.captures(lowered)?;
        let value: u64 = caps["value"].parse().ok()?;
        let unit = match caps["unit"].trim_end_matches('s') {
            "hour" => HOUR,
            "day" => DAY,
            "week" => WEEK,
            "month" => MONTH,
            _ => return None,
        };
        let delta = value.checked_mul(unit)?;

        let field = TIME_FIELD_KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| lowered.contains(w)))
            .map_or(TimeField::ModifiedAt, |(field, _)| *field);

        let span = caps.get(0)?.range();
        Some(Match {
            value: TimeConstraint {
                field,
                cutoff: now - delta as f64,
            },
            span,
        })
    }

    fn match_size(&self, lowered: &str) -> Option<Match<SizeConstraint>> {
        for rule in &self.size_rules {
            let Some(caps) = rule.pattern.captures(lowered) else {
                continue;
            };

            let op = match rule.operator {
                OperatorSource::Fixed(op) => op,
                OperatorSource::Word => match caps.name("word").map(|m| m.as_str()) {
                    Some("less") | Some("smaller") => SizeOp::Lt,
                    Some("greater") | Some("larger") | Some("bigger") => SizeOp::Gt,
                    _ => continue,
                },
            };

            let value: f64 = caps["value"].parse().ok()?;
            let multiplier = match &caps["unit"] {
                "kb" => KB,
                "mb" => MB,
                "gb" => GB,
                "tb" => TB,
                _ => return None,
            };
            let bytes = value * multiplier;
            if !bytes.is_finite() || bytes >= u64::MAX as f64 {
                return None;
            }

            let span = caps.get(0)?.range();
            return Some(Match {
                value: SizeConstraint {
                    op,
                    bytes: bytes as u64,
                },
                span,
            });
        }
        None
    }
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern:?}: {e}"))
}

/// Cut the byte ranges out of `text`, leaving a space where each one was.
fn remove_spans(text: &str, mut spans: Vec<Range<usize>>) -> String {
    spans.sort_by_key(|s| s.start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        if span.start > cursor {
            out.push_str(&text[cursor..span.start]);
        }
        out.push(' ');
        cursor = cursor.max(span.end);
    }
    out.push_str(&text[cursor.min(text.len())..]);
    out
}
