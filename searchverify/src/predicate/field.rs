//! The field catalog.
//!
//! Every filter the harness understands is one [`FieldDef`] row: its declared
//! type, where its value lives in a result item, how the value is derived
//! and how it is spelled in a query. Supporting a new filter means adding a
//! row here.

use serde_json::Value;

use crate::item::{FieldValue, ResultItem};

/// Declared type of a field. Decides which operators are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Free-form string, compared case-insensitively.
    Text,
    /// Integer or float.
    Number,
    /// ISO-8601 timestamp, compared on its date prefix.
    Date,
    /// Boolean flag.
    Bool,
    /// Sequence of strings.
    List,
    /// Number of elements in a sequence.
    Count,
}

/// How the checked value is derived from the raw JSON at `path`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// Use the value as is.
    Direct,
    /// Length of an array.
    Length,
    /// Collect one string key from an array of objects.
    Pluck(&'static str),
    /// File extension of a file name, without the dot.
    Extension,
}

/// How a field is spelled in the provider's query language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySyntax {
    /// `value in:name`
    InQualifier(&'static str),
    /// `stars:>5000`, `language:Python`
    Qualifier(&'static str),
    /// `location:denmark`, which the provider matches as a substring.
    MatchQualifier(&'static str),
    /// `is:private` / `is:public`
    IsFlag {
        /// Word for `true`.
        on: &'static str,
        /// Word for `false`, if the provider has one.
        off: Option<&'static str>,
    },
    /// `mirror:true`, asserting the backing field is set.
    PresenceFlag(&'static str),
    /// Only meaningful on follow-up payloads; has no query form.
    PayloadOnly,
}

/// One row of the field catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name used when declaring predicates.
    pub name: &'static str,
    /// Declared type.
    pub field_type: FieldType,
    /// Dotted JSON path, or `None` if the provider never exposes the value.
    pub path: Option<&'static str>,
    /// Value derivation.
    pub derive: Derivation,
    /// Query spelling.
    pub syntax: QuerySyntax,
    /// Value accepted by the `sort` parameter, if sortable.
    pub sort_key: Option<&'static str>,
}

const fn field(
    name: &'static str,
    field_type: FieldType,
    path: Option<&'static str>,
    syntax: QuerySyntax,
) -> FieldDef {
    FieldDef {
        name,
        field_type,
        path,
        derive: Derivation::Direct,
        syntax,
        sort_key: None,
    }
}

const fn sortable(mut def: FieldDef, key: &'static str) -> FieldDef {
    def.sort_key = Some(key);
    def
}

const fn derived(mut def: FieldDef, derive: Derivation) -> FieldDef {
    def.derive = derive;
    def
}

use FieldType::{Bool, Count, Date, List, Number, Text};
use QuerySyntax::{InQualifier, MatchQualifier, PayloadOnly, PresenceFlag, Qualifier};

/// The catalog.
pub static FIELDS: &[FieldDef] = &[
    // Repository search
    field("name", Text, Some("name"), InQualifier("name")),
    field("description", Text, Some("description"), InQualifier("description")),
    field("readme", Text, Some("content"), InQualifier("readme")),
    field("repo", Text, Some("full_name"), Qualifier("repo")),
    field("user", Text, Some("owner.login"), Qualifier("user")),
    field("org", Text, Some("owner.login"), Qualifier("org")),
    field("size", Number, Some("size"), Qualifier("size")),
    // Not part of repository or user search items.
    sortable(field("followers", Number, Some("followers"), Qualifier("followers")), "followers"),
    sortable(field("forks", Number, Some("forks_count"), Qualifier("forks")), "forks"),
    sortable(field("stars", Number, Some("stargazers_count"), Qualifier("stars")), "stars"),
    field("created", Date, Some("created_at"), Qualifier("created")),
    field("pushed", Date, Some("pushed_at"), Qualifier("pushed")),
    field("language", Text, Some("language"), Qualifier("language")),
    field("topic", List, Some("topics"), Qualifier("topic")),
    derived(field("topics", Count, Some("topics"), Qualifier("topics")), Derivation::Length),
    field("license", Text, Some("license.key"), Qualifier("license")),
    field(
        "private",
        Bool,
        Some("private"),
        QuerySyntax::IsFlag { on: "private", off: Some("public") },
    ),
    field("mirror", Text, Some("mirror_url"), PresenceFlag("mirror")),
    field("archived", Bool, Some("archived"), Qualifier("archived")),
    field("good-first-issues", Number, None, Qualifier("good-first-issues")),
    sortable(
        field("help-wanted-issues", Number, None, Qualifier("help-wanted-issues")),
        "help-wanted-issues",
    ),
    field("sponsorable", Bool, None, QuerySyntax::IsFlag { on: "sponsorable", off: None }),
    // User search
    field("type", Text, Some("type"), Qualifier("type")),
    field("location", Text, Some("location"), MatchQualifier("location")),
    sortable(field("repos", Number, Some("public_repos"), Qualifier("repos")), "repositories"),
    // Code search
    derived(field("extension", Text, Some("name"), Qualifier("extension")), Derivation::Extension),
    field("path", Text, Some("path"), Qualifier("path")),
    field("file", Text, None, InQualifier("file")),
    // Follow-up payloads
    derived(field("labels", List, Some("labels"), PayloadOnly), Derivation::Pluck("name")),
    field("state", Text, Some("state"), PayloadOnly),
];

/// Finds a field by name.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static FieldDef> {
    FIELDS.iter().find(|def| def.name == name)
}

/// Finds the field a sort key orders by.
#[must_use]
pub fn lookup_sort_key(key: &str) -> Option<&'static FieldDef> {
    FIELDS.iter().find(|def| def.sort_key == Some(key))
}

/// Finds the field spelled with a `qualifier:` prefix.
#[must_use]
pub fn lookup_qualifier(qualifier: &str) -> Option<&'static FieldDef> {
    FIELDS.iter().find(|def| match def.syntax {
        Qualifier(q) | MatchQualifier(q) | PresenceFlag(q) => q == qualifier,
        _ => false,
    })
}

/// Finds the field spelled `value in:<target>`.
#[must_use]
pub fn lookup_in_qualifier(target: &str) -> Option<&'static FieldDef> {
    FIELDS
        .iter()
        .find(|def| matches!(def.syntax, InQualifier(t) if t == target))
}

/// Finds the field behind an `is:` flag word, with the boolean it denotes.
#[must_use]
pub fn lookup_is_flag(word: &str) -> Option<(&'static FieldDef, bool)> {
    FIELDS.iter().find_map(|def| match def.syntax {
        QuerySyntax::IsFlag { on, .. } if on == word => Some((def, true)),
        QuerySyntax::IsFlag { off: Some(off), .. } if off == word => Some((def, false)),
        _ => None,
    })
}

/// A value read from an item and normalised for comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    /// String value.
    Text(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Bool(bool),
    /// List of strings.
    List(Vec<String>),
    /// Present, but not of the declared type.
    Mismatch(Value),
}

impl Observed {
    /// JSON form for reports.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            // Whole numbers render without a fractional part.
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => serde_json::json!(*n as i64),
            Self::Number(n) => serde_json::json!(n),
            Self::Bool(b) => Value::Bool(*b),
            Self::List(items) => serde_json::json!(items),
            Self::Mismatch(v) => v.clone(),
        }
    }
}

/// Result of reading a field from an item.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// The field is structurally absent.
    Absent,
    /// The field is present but `null`.
    Null,
    /// The field has a value.
    Value(Observed),
}

impl FieldDef {
    /// Whether values of this field are compared relationally.
    #[must_use]
    pub const fn is_ordered(&self) -> bool {
        matches!(self.field_type, Number | Count | Date)
    }

    /// Reads and derives this field's value from an item.
    #[must_use]
    pub fn extract(&self, item: &ResultItem) -> Extracted {
        let Some(path) = self.path else {
            return Extracted::Absent;
        };
        let raw = match item.field(path) {
            FieldValue::Absent => return Extracted::Absent,
            FieldValue::Null => return Extracted::Null,
            FieldValue::Present(v) => v,
        };

        let observed = match self.derive {
            Derivation::Direct => self.observe_direct(raw),
            Derivation::Length => raw.as_array().map_or_else(
                || Observed::Mismatch(raw.clone()),
                |a| Observed::Number(a.len() as f64),
            ),
            Derivation::Pluck(key) => raw.as_array().map_or_else(
                || Observed::Mismatch(raw.clone()),
                |a| {
                    Observed::List(
                        a.iter()
                            .filter_map(|entry| entry.get(key).and_then(Value::as_str))
                            .map(str::to_string)
                            .collect(),
                    )
                },
            ),
            Derivation::Extension => raw.as_str().map_or_else(
                || Observed::Mismatch(raw.clone()),
                |name| {
                    Observed::Text(
                        name.rsplit_once('.')
                            .map(|(_, ext)| ext.to_string())
                            .unwrap_or_default(),
                    )
                },
            ),
        };
        Extracted::Value(observed)
    }

    fn observe_direct(&self, raw: &Value) -> Observed {
        let observed = match self.field_type {
            Text | Date => raw.as_str().map(|s| Observed::Text(s.to_string())),
            Number | Count => raw.as_f64().map(Observed::Number),
            Bool => raw.as_bool().map(Observed::Bool),
            List => raw.as_array().map(|a| {
                Observed::List(
                    a.iter()
                        .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                        .collect(),
                )
            }),
        };
        observed.unwrap_or_else(|| Observed::Mismatch(raw.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_field_names_are_unique() {
        let names: HashSet<_> = FIELDS.iter().map(|f| f.name).collect();
        assert_eq!(names.len(), FIELDS.len());
    }

    #[test]
    fn test_lookup_helpers() {
        assert_eq!(lookup("stars").unwrap().path, Some("stargazers_count"));
        assert_eq!(lookup_sort_key("forks").unwrap().name, "forks");
        assert_eq!(lookup_qualifier("mirror").unwrap().name, "mirror");
        assert_eq!(lookup_in_qualifier("readme").unwrap().name, "readme");
        assert_eq!(lookup_is_flag("public").map(|(f, v)| (f.name, v)), Some(("private", false)));
        assert!(lookup("watchers").is_none());
    }

    #[test]
    fn test_extract_derivations() {
        let item = ResultItem::from_value(json!({
            "name": "notes.md",
            "topics": ["python", "cli"],
            "labels": [{"name": "help wanted"}, {"name": "bug"}],
            "stargazers_count": 5001
        }))
        .unwrap();

        assert_eq!(lookup("topics").unwrap().extract(&item), Extracted::Value(Observed::Number(2.0)));
        assert_eq!(
            lookup("labels").unwrap().extract(&item),
            Extracted::Value(Observed::List(vec!["help wanted".into(), "bug".into()]))
        );
        assert_eq!(
            lookup("extension").unwrap().extract(&item),
            Extracted::Value(Observed::Text("md".into()))
        );
        assert_eq!(lookup("stars").unwrap().extract(&item), Extracted::Value(Observed::Number(5001.0)));
    }

    #[test]
    fn test_extract_absent_and_mismatch() {
        let item = ResultItem::from_value(json!({"size": "big", "language": null})).unwrap();

        assert_eq!(lookup("good-first-issues").unwrap().extract(&item), Extracted::Absent);
        assert_eq!(lookup("forks").unwrap().extract(&item), Extracted::Absent);
        assert_eq!(lookup("language").unwrap().extract(&item), Extracted::Null);
        assert_eq!(
            lookup("size").unwrap().extract(&item),
            Extracted::Value(Observed::Mismatch(json!("big")))
        );
    }
}
