//! The predicate type.

use serde::Serialize;
use std::fmt;

use super::field::{self, FieldDef, FieldType, QuerySyntax};
use super::operator::{looks_like_date, Operator, PredicateValue};
use crate::errors::{Result, VerifyError};

/// Which payload a predicate is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// The search results.
    #[default]
    Primary,
    /// The follow-up payload resolved from a search result.
    Secondary,
}

/// One field/operator/value condition.
///
/// Predicates are validated on construction: the field must exist in the
/// catalog, the operator must suit its type and the value must suit the
/// operator. Invalid combinations never reach the network.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    field: Option<&'static str>,
    operator: Operator,
    value: PredicateValue,
    applies_to: Target,
}

impl Predicate {
    /// Creates a validated predicate on a catalog field.
    pub fn new(field: &str, operator: Operator, value: impl Into<PredicateValue>) -> Result<Self> {
        let value = value.into();
        let def = field::lookup(field).ok_or_else(|| {
            VerifyError::unsupported(field, operator.as_str(), "unknown field")
        })?;

        if !operator.accepts(def.field_type) {
            return Err(VerifyError::unsupported(
                field,
                operator.as_str(),
                format!("operator is not valid for {:?} fields", def.field_type),
            ));
        }
        check_value(def, operator, &value)?;
        let (operator, value) = single_membership_as_equals(def, operator, value);

        Ok(Self {
            field: Some(def.name),
            operator,
            value,
            applies_to: Target::Primary,
        })
    }

    /// Free-text keyword, emitted bare in the query and never re-checked.
    pub fn keyword(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(VerifyError::unsupported("<free text>", "contains", "empty keyword"));
        }
        Ok(Self {
            field: None,
            operator: Operator::Contains,
            value: PredicateValue::Text(text),
            applies_to: Target::Primary,
        })
    }

    /// `field` contains `value`.
    pub fn contains(field: &str, value: impl Into<String>) -> Result<Self> {
        Self::new(field, Operator::Contains, value.into())
    }

    /// `field` equals `value`.
    pub fn equals(field: &str, value: impl Into<PredicateValue>) -> Result<Self> {
        Self::new(field, Operator::Equals, value)
    }

    /// Boolean `field` equals `value`.
    pub fn is(field: &str, value: bool) -> Result<Self> {
        Self::new(field, Operator::BoolEquals, value)
    }

    /// `field` is present and non-null.
    pub fn not_null(field: &str) -> Result<Self> {
        Self::new(field, Operator::NotNull, PredicateValue::None)
    }

    /// `field` is one of `values`, or a list field shares one of them.
    pub fn member_of(field: &str, values: impl Into<PredicateValue>) -> Result<Self> {
        Self::new(field, Operator::SetMembership, values)
    }

    /// Marks the predicate as applying to the follow-up payload.
    #[must_use]
    pub const fn secondary(mut self) -> Self {
        self.applies_to = Target::Secondary;
        self
    }

    /// The field name, `None` for free text.
    #[must_use]
    pub const fn field(&self) -> Option<&'static str> {
        self.field
    }

    /// The catalog row, `None` for free text.
    #[must_use]
    pub fn def(&self) -> Option<&'static FieldDef> {
        self.field.and_then(field::lookup)
    }

    /// The operator.
    #[must_use]
    pub const fn operator(&self) -> Operator {
        self.operator
    }

    /// The expected value.
    #[must_use]
    pub const fn value(&self) -> &PredicateValue {
        &self.value
    }

    /// Which payload the predicate applies to.
    #[must_use]
    pub const fn applies_to(&self) -> Target {
        self.applies_to
    }

    /// Whether this is a free-text keyword.
    #[must_use]
    pub const fn is_keyword(&self) -> bool {
        self.field.is_none()
    }

    /// Whether the field only exists on follow-up payloads and has no query spelling.
    #[must_use]
    pub fn is_payload_only(&self) -> bool {
        self.def()
            .is_some_and(|def| matches!(def.syntax, QuerySyntax::PayloadOnly))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Some(field) => write!(f, "{field} {} {}", self.operator, self.value),
            None => write!(f, "\"{}\"", self.value),
        }
    }
}

/// On a text field, membership in one value is equality, and both render
/// as `qualifier:value`.
fn single_membership_as_equals(
    def: &FieldDef,
    operator: Operator,
    value: PredicateValue,
) -> (Operator, PredicateValue) {
    if operator != Operator::SetMembership || def.field_type != FieldType::Text {
        return (operator, value);
    }
    match value {
        PredicateValue::Text(text) => (Operator::Equals, PredicateValue::Text(text)),
        PredicateValue::List(mut values) if values.len() == 1 => {
            (Operator::Equals, PredicateValue::Text(values.remove(0)))
        }
        other => (operator, other),
    }
}

fn check_value(def: &FieldDef, operator: Operator, value: &PredicateValue) -> Result<()> {
    let reject = |reason: &str| -> Result<()> {
        Err(VerifyError::unsupported(def.name, operator.as_str(), reason))
    };

    match (operator, value) {
        (Operator::NotNull, PredicateValue::None) => Ok(()),
        (Operator::NotNull, _) => reject("notNull takes no value"),
        (Operator::BoolEquals, PredicateValue::Bool(_)) => Ok(()),
        (Operator::BoolEquals, _) => reject("boolEquals needs a boolean"),
        (Operator::Contains, PredicateValue::Text(s)) if !s.is_empty() => Ok(()),
        (Operator::Contains, _) => reject("contains needs non-empty text"),
        (
            Operator::SetMembership | Operator::AnyItemHas | Operator::NoItemHas,
            PredicateValue::Text(_),
        ) => Ok(()),
        (
            Operator::SetMembership | Operator::AnyItemHas | Operator::NoItemHas,
            PredicateValue::List(values),
        ) if !values.is_empty() => Ok(()),
        (Operator::SetMembership | Operator::AnyItemHas | Operator::NoItemHas, _) => {
            reject("membership needs text or a non-empty list")
        }
        (_, value) => match (def.field_type, value) {
            (FieldType::Number | FieldType::Count, PredicateValue::Number(_)) => Ok(()),
            (FieldType::Date, PredicateValue::Text(s)) if looks_like_date(s) => Ok(()),
            (FieldType::Text, PredicateValue::Text(_)) => Ok(()),
            (FieldType::Date, _) => reject("dates must be YYYY, YYYY-MM or YYYY-MM-DD"),
            _ => reject("value type does not match the field type"),
        },
    }
}
