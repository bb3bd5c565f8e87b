//! Operators and their evaluation table.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::field::{FieldType, Observed};

/// Comparison applied by a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    /// Field equals the value (case-insensitive for text, date prefix for dates).
    Equals,
    /// Text field contains the value, case-insensitively.
    Contains,
    /// `field <= value`
    LessOrEqual,
    /// `field >= value`
    GreaterOrEqual,
    /// `field > value`
    GreaterThan,
    /// `field < value`
    LessThan,
    /// Field value is one of the given values, or a list field shares one with them.
    SetMembership,
    /// Field is present and not null.
    NotNull,
    /// Boolean field equals the value.
    BoolEquals,
    /// At least one item in the collection has one of the values. Fails on an empty collection.
    AnyItemHas,
    /// No item in the collection has any of the values. Holds on an empty collection.
    NoItemHas,
}

impl Operator {
    /// Name used in reports and errors.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::Contains => "contains",
            Self::LessOrEqual => "lessOrEqual",
            Self::GreaterOrEqual => "greaterOrEqual",
            Self::GreaterThan => "greaterThan",
            Self::LessThan => "lessThan",
            Self::SetMembership => "setMembership",
            Self::NotNull => "notNull",
            Self::BoolEquals => "boolEquals",
            Self::AnyItemHas => "anyItemHas",
            Self::NoItemHas => "noItemHas",
        }
    }

    /// Query-language prefix for relational operators.
    #[must_use]
    pub const fn symbol(&self) -> Option<&'static str> {
        match self {
            Self::LessOrEqual => Some("<="),
            Self::GreaterOrEqual => Some(">="),
            Self::GreaterThan => Some(">"),
            Self::LessThan => Some("<"),
            _ => None,
        }
    }

    /// Parses a relational prefix, longest match first.
    #[must_use]
    pub fn from_symbol_prefix(text: &str) -> Option<(Self, &str)> {
        [
            ("<=", Self::LessOrEqual),
            (">=", Self::GreaterOrEqual),
            ("<", Self::LessThan),
            (">", Self::GreaterThan),
        ]
        .into_iter()
        .find_map(|(sym, op)| text.strip_prefix(sym).map(|rest| (op, rest)))
    }

    /// Whether the operator compares order.
    #[must_use]
    pub const fn is_relational(&self) -> bool {
        self.symbol().is_some()
    }

    /// Whether the operator quantifies over the whole collection instead of each item.
    #[must_use]
    pub const fn is_collection_level(&self) -> bool {
        matches!(self, Self::AnyItemHas | Self::NoItemHas)
    }

    /// Whether the operator is meaningful for a field type.
    #[must_use]
    pub const fn accepts(&self, field_type: FieldType) -> bool {
        use FieldType::{Bool, Count, Date, List, Number, Text};
        match self {
            Self::Equals => matches!(field_type, Text | Number | Date | Count),
            Self::Contains => matches!(field_type, Text),
            Self::LessOrEqual | Self::GreaterOrEqual | Self::GreaterThan | Self::LessThan => {
                matches!(field_type, Number | Date | Count)
            }
            Self::SetMembership => matches!(field_type, Text | List),
            Self::NotNull => true,
            Self::BoolEquals => matches!(field_type, Bool),
            Self::AnyItemHas | Self::NoItemHas => matches!(field_type, Text | List),
        }
    }

    /// Evaluates the operator for one observed value.
    ///
    /// Collection-level operators evaluate to whether this single item has
    /// one of the values; the caller applies the quantifier.
    #[must_use]
    pub fn evaluate(&self, field_type: FieldType, observed: &Observed, expected: &PredicateValue) -> bool {
        match self {
            Self::NotNull => true,
            Self::Contains => match (observed, expected.as_text()) {
                (Observed::Text(actual), Some(needle)) => {
                    actual.to_lowercase().contains(&needle.to_lowercase())
                }
                _ => false,
            },
            Self::Equals => compare(field_type, observed, expected) == Some(Ordering::Equal),
            Self::LessOrEqual => matches!(compare(field_type, observed, expected), Some(Ordering::Less | Ordering::Equal)),
            Self::GreaterOrEqual => {
                matches!(compare(field_type, observed, expected), Some(Ordering::Greater | Ordering::Equal))
            }
            Self::GreaterThan => compare(field_type, observed, expected) == Some(Ordering::Greater),
            Self::LessThan => compare(field_type, observed, expected) == Some(Ordering::Less),
            Self::BoolEquals => matches!(
                (observed, expected),
                (Observed::Bool(a), PredicateValue::Bool(b)) if a == b
            ),
            Self::SetMembership | Self::AnyItemHas | Self::NoItemHas => {
                let wanted = expected.as_lowercase_set();
                match observed {
                    Observed::Text(actual) => wanted.contains(&actual.to_lowercase()),
                    Observed::List(actual) => {
                        actual.iter().any(|a| wanted.contains(&a.to_lowercase()))
                    }
                    _ => false,
                }
            }
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compares an observed value against the expected one.
///
/// Text compares case-folded. Date fields compare on the observed value's
/// prefix of the same length as the expected date, so `2020-05-03T10:00:00Z`
/// against `2021-01-01` compares `2020-05-03`.
fn compare(field_type: FieldType, observed: &Observed, expected: &PredicateValue) -> Option<Ordering> {
    match (observed, expected) {
        (Observed::Number(a), PredicateValue::Number(b)) => a.partial_cmp(b),
        (Observed::Text(a), PredicateValue::Text(b)) if field_type == FieldType::Date => {
            let prefix = a.get(..b.len()).unwrap_or(a);
            Some(prefix.cmp(b.as_str()))
        }
        (Observed::Text(a), PredicateValue::Text(b)) => Some(a.to_lowercase().cmp(&b.to_lowercase())),
        (Observed::Bool(a), PredicateValue::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
pub(crate) fn looks_like_date(text: &str) -> bool {
    let bytes = text.as_bytes();
    let digits = |range: std::ops::Range<usize>| {
        bytes.get(range).is_some_and(|b| b.iter().all(u8::is_ascii_digit))
    };
    match bytes.len() {
        4 => digits(0..4),
        7 => digits(0..4) && bytes[4] == b'-' && digits(5..7),
        10 => digits(0..4) && bytes[4] == b'-' && digits(5..7) && bytes[7] == b'-' && digits(8..10),
        _ => false,
    }
}

/// The value side of a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredicateValue {
    /// No value (`notNull`).
    None,
    /// Boolean.
    Bool(bool),
    /// Number.
    Number(f64),
    /// String or date.
    Text(String),
    /// Sequence of strings.
    List(Vec<String>),
}

impl PredicateValue {
    /// Text view of a scalar text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Lower-cased values for membership checks.
    #[must_use]
    pub fn as_lowercase_set(&self) -> Vec<String> {
        match self {
            Self::Text(s) => vec![s.to_lowercase()],
            Self::List(items) => items.iter().map(|s| s.to_lowercase()).collect(),
            _ => Vec::new(),
        }
    }

    /// Query-language spelling. Whole numbers drop the fraction and text
    /// containing whitespace is quoted.
    #[must_use]
    pub fn to_query_text(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Text(s) => quote(s),
            Self::List(items) => items.iter().map(|s| quote(s)).collect::<Vec<_>>().join(","),
        }
    }
}

impl fmt::Display for PredicateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("-"),
            Self::Text(s) => f.write_str(s),
            other => f.write_str(&other.to_query_text()),
        }
    }
}

impl From<&str> for PredicateValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PredicateValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for PredicateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for PredicateValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for PredicateValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<Vec<&str>> for PredicateValue {
    fn from(values: Vec<&str>) -> Self {
        Self::List(values.into_iter().map(str::to_string).collect())
    }
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn quote(text: &str) -> String {
    if text.chars().any(char::is_whitespace) {
        format!("\"{text}\"")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Observed {
        Observed::Text(s.to_string())
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let needle = PredicateValue::from("python");
        for name in ["python-sdk", "PythonUtils", "fastpython"] {
            assert!(Operator::Contains.evaluate(FieldType::Text, &text(name), &needle), "{name}");
        }
        assert!(!Operator::Contains.evaluate(FieldType::Text, &text("rustlings"), &needle));
    }

    #[test]
    fn test_relational_numbers() {
        let bound = PredicateValue::from(5000_i64);
        assert!(Operator::GreaterThan.evaluate(FieldType::Number, &Observed::Number(5001.0), &bound));
        assert!(!Operator::GreaterThan.evaluate(FieldType::Number, &Observed::Number(4999.0), &bound));
        assert!(!Operator::GreaterThan.evaluate(FieldType::Number, &Observed::Number(5000.0), &bound));
        assert!(Operator::GreaterOrEqual.evaluate(FieldType::Number, &Observed::Number(5000.0), &bound));
        assert!(Operator::LessOrEqual.evaluate(FieldType::Number, &Observed::Number(100.0), &PredicateValue::from(100_i64)));
    }

    #[test]
    fn test_dates_compare_on_prefix() {
        let cutoff = PredicateValue::from("2021-01-01");
        assert!(Operator::LessOrEqual.evaluate(FieldType::Date, &text("2020-12-31T23:59:59Z"), &cutoff));
        assert!(Operator::LessOrEqual.evaluate(FieldType::Date, &text("2021-01-01T08:00:00Z"), &cutoff));
        assert!(!Operator::LessOrEqual.evaluate(FieldType::Date, &text("2021-01-02T00:00:00Z"), &cutoff));
        assert!(Operator::Equals.evaluate(FieldType::Date, &text("2020-01-01T12:00:00Z"), &PredicateValue::from("2020-01-01")));
    }

    #[test]
    fn test_date_shaped_text_compares_whole_value() {
        let login = PredicateValue::from("1234");
        assert!(!Operator::Equals.evaluate(FieldType::Text, &text("1234abc"), &login));
        assert!(Operator::Equals.evaluate(FieldType::Text, &text("1234"), &login));
        assert!(!Operator::Equals.evaluate(FieldType::Text, &text("2020-01-01T12:00:00Z"), &PredicateValue::from("2020-01-01")));
    }

    #[test]
    fn test_set_membership_lowercases() {
        let topics = Observed::List(vec!["Python".into(), "cli".into()]);
        assert!(Operator::SetMembership.evaluate(FieldType::List, &topics, &PredicateValue::from("python")));
        assert!(Operator::SetMembership.evaluate(FieldType::Text, &text("MIT"), &PredicateValue::from(vec!["mit", "apache-2.0"])));
        assert!(!Operator::SetMembership.evaluate(FieldType::Text, &text("gpl-3.0"), &PredicateValue::from(vec!["mit"])));
    }

    #[test]
    fn test_type_mismatch_never_holds() {
        let mismatch = Observed::Mismatch(serde_json::json!("big"));
        assert!(!Operator::LessOrEqual.evaluate(FieldType::Number, &mismatch, &PredicateValue::from(100_i64)));
        assert!(!Operator::Contains.evaluate(FieldType::Text, &mismatch, &PredicateValue::from("big")));
    }

    #[test]
    fn test_accepts_table() {
        assert!(Operator::GreaterThan.accepts(FieldType::Number));
        assert!(Operator::GreaterThan.accepts(FieldType::Date));
        assert!(!Operator::GreaterThan.accepts(FieldType::Text));
        assert!(!Operator::Contains.accepts(FieldType::Number));
        assert!(Operator::BoolEquals.accepts(FieldType::Bool));
        assert!(Operator::AnyItemHas.accepts(FieldType::Text));
        assert!(!Operator::NoItemHas.accepts(FieldType::Number));
    }

    #[test]
    fn test_symbol_prefix_prefers_longest() {
        assert_eq!(Operator::from_symbol_prefix("<=100"), Some((Operator::LessOrEqual, "100")));
        assert_eq!(Operator::from_symbol_prefix(">5000"), Some((Operator::GreaterThan, "5000")));
        assert_eq!(Operator::from_symbol_prefix("python"), None);
    }

    #[test]
    fn test_query_text() {
        assert_eq!(PredicateValue::from(5000_i64).to_query_text(), "5000");
        assert_eq!(PredicateValue::from("help wanted").to_query_text(), "\"help wanted\"");
        assert_eq!(PredicateValue::from(true).to_query_text(), "true");
        assert!(looks_like_date("2021-01-01"));
        assert!(!looks_like_date("python"));
    }
}
