//! Predicate-to-query-string translation, and the inverse token parser.

use regex::Regex;
use std::sync::OnceLock;

use crate::errors::{Result, VerifyError};
use crate::predicate::field::{self, QuerySyntax};
use crate::predicate::{Operator, Predicate, PredicateValue, Target};

/// Renders one predicate as a query token.
///
/// Returns `Ok(None)` for follow-up predicates on payload-only fields: they
/// are checked after resolution and have nothing to contribute to the query.
pub fn predicate_token(predicate: &Predicate) -> Result<Option<String>> {
    let value = predicate.value();
    let operator = predicate.operator();

    let Some(def) = predicate.def() else {
        return Ok(Some(value.to_query_text()));
    };

    let unsupported = |reason: &str| -> Result<Option<String>> {
        Err(VerifyError::unsupported(def.name, operator.as_str(), reason))
    };

    // Quantifiers over a follow-up collection have no query form.
    if predicate.applies_to() == Target::Secondary && operator.is_collection_level() {
        return Ok(None);
    }

    let token = match def.syntax {
        QuerySyntax::PayloadOnly => {
            if predicate.applies_to() == Target::Secondary {
                return Ok(None);
            }
            return unsupported("field only exists on follow-up payloads");
        }
        QuerySyntax::InQualifier(target) => match operator {
            Operator::Contains => format!("{} in:{target}", value.to_query_text()),
            _ => return unsupported("in-qualifier fields only support contains"),
        },
        QuerySyntax::Qualifier(q) => match operator {
            op if op.is_relational() => {
                let symbol = op.symbol().unwrap_or_default();
                format!("{q}:{symbol}{}", value.to_query_text())
            }
            Operator::Equals | Operator::SetMembership | Operator::BoolEquals => {
                format!("{q}:{}", value.to_query_text())
            }
            _ => return unsupported("operator has no qualifier form"),
        },
        QuerySyntax::MatchQualifier(q) => match operator {
            Operator::Contains => format!("{q}:{}", value.to_query_text()),
            _ => return unsupported("substring qualifiers only support contains"),
        },
        QuerySyntax::IsFlag { on, off } => match (operator, value) {
            (Operator::BoolEquals, PredicateValue::Bool(true)) => format!("is:{on}"),
            (Operator::BoolEquals, PredicateValue::Bool(false)) => match off {
                Some(off) => format!("is:{off}"),
                None => return unsupported("provider has no negated form of this flag"),
            },
            _ => return unsupported("flag fields only support boolEquals"),
        },
        QuerySyntax::PresenceFlag(q) => match operator {
            Operator::NotNull => format!("{q}:true"),
            _ => return unsupported("presence flags only support notNull"),
        },
    };

    Ok(Some(token))
}

/// Joins predicate tokens with the provider's implicit AND, preserving order.
pub fn translate(predicates: &[Predicate]) -> Result<String> {
    let mut tokens = Vec::with_capacity(predicates.len());
    for predicate in predicates {
        if let Some(token) = predicate_token(predicate)? {
            tokens.push(token);
        }
    }
    if tokens.is_empty() {
        return Err(VerifyError::unsupported(
            "<query>",
            "translate",
            "a query needs at least one searchable predicate",
        ));
    }
    Ok(tokens.join(" "))
}

/// One token recovered from a query string.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToken {
    /// Catalog field, `None` for free text.
    pub field: Option<&'static str>,
    /// Operator the token expresses.
    pub operator: Operator,
    /// Value as spelled in the query, quotes removed.
    pub value: String,
}

impl ParsedToken {
    /// Builds the token a predicate should parse back to.
    #[must_use]
    pub fn from_predicate(predicate: &Predicate) -> Self {
        let value = match predicate.value() {
            PredicateValue::None => "true".to_string(),
            PredicateValue::Text(s) => s.clone(),
            PredicateValue::List(items) => items.join(","),
            other => other.to_query_text(),
        };
        Self {
            field: predicate.field(),
            operator: predicate.operator(),
            value,
        }
    }
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r#"(?:[^\s"]*"[^"]*")+[^\s"]*|\S+"#).unwrap()
    })
}

fn unquote(text: &str) -> String {
    text.replace('"', "")
}

/// Parses a query string back into field/operator/value tokens.
pub fn parse(query: &str) -> Result<Vec<ParsedToken>> {
    let raw: Vec<&str> = token_pattern().find_iter(query).map(|m| m.as_str()).collect();
    let mut tokens = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let current = raw[i];

        // `value in:target` spans two raw tokens
        if let Some(target) = raw.get(i + 1).and_then(|next| next.strip_prefix("in:")) {
            let def = field::lookup_in_qualifier(target).ok_or_else(|| {
                VerifyError::unsupported(target, "contains", "unknown in-qualifier")
            })?;
            tokens.push(ParsedToken {
                field: Some(def.name),
                operator: Operator::Contains,
                value: unquote(current),
            });
            i += 2;
            continue;
        }

        tokens.push(parse_single(current)?);
        i += 1;
    }

    Ok(tokens)
}

fn parse_single(raw: &str) -> Result<ParsedToken> {
    let Some((qualifier, rest)) = raw.split_once(':') else {
        return Ok(ParsedToken {
            field: None,
            operator: Operator::Contains,
            value: unquote(raw),
        });
    };

    if qualifier == "is" {
        let (def, flag) = field::lookup_is_flag(rest)
            .ok_or_else(|| VerifyError::unsupported(rest, "boolEquals", "unknown is: flag"))?;
        return Ok(ParsedToken {
            field: Some(def.name),
            operator: Operator::BoolEquals,
            value: flag.to_string(),
        });
    }

    let def = field::lookup_qualifier(qualifier)
        .ok_or_else(|| VerifyError::unsupported(qualifier, "equals", "unknown qualifier"))?;

    let (operator, value) = match def.syntax {
        QuerySyntax::PresenceFlag(_) => (Operator::NotNull, rest.to_string()),
        QuerySyntax::MatchQualifier(_) => (Operator::Contains, rest.to_string()),
        _ => match Operator::from_symbol_prefix(rest) {
            Some((op, value)) => (op, value.to_string()),
            None => {
                let op = match def.field_type {
                    field::FieldType::List => Operator::SetMembership,
                    field::FieldType::Bool => Operator::BoolEquals,
                    field::FieldType::Text if rest.contains(',') => Operator::SetMembership,
                    _ => Operator::Equals,
                };
                (op, rest.to_string())
            }
        },
    };

    Ok(ParsedToken {
        field: Some(def.name),
        operator,
        value: unquote(&value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn p(field: &str, op: Operator, value: impl Into<PredicateValue>) -> Predicate {
        Predicate::new(field, op, value).unwrap()
    }

    #[test]
    fn test_tokens_per_syntax() {
        let cases = [
            (Predicate::contains("name", "python").unwrap(), "python in:name"),
            (p("stars", Operator::GreaterThan, 5000_i64), "stars:>5000"),
            (p("size", Operator::LessOrEqual, 100_i64), "size:<=100"),
            (p("created", Operator::LessOrEqual, "2021-01-01"), "created:<=2021-01-01"),
            (p("language", Operator::Equals, "Python"), "language:Python"),
            (p("topic", Operator::SetMembership, "python"), "topic:python"),
            (Predicate::is("private", true).unwrap(), "is:private"),
            (Predicate::is("private", false).unwrap(), "is:public"),
            (Predicate::is("archived", true).unwrap(), "archived:true"),
            (Predicate::not_null("mirror").unwrap(), "mirror:true"),
            (Predicate::contains("location", "denmark").unwrap(), "location:denmark"),
            (Predicate::keyword("renataberoli").unwrap(), "renataberoli"),
        ];
        for (predicate, expected) in cases {
            assert_eq!(predicate_token(&predicate).unwrap().as_deref(), Some(expected));
        }
    }

    #[test]
    fn test_translate_preserves_order() {
        let predicates = vec![
            Predicate::keyword("signature").unwrap(),
            Predicate::equals("user", "renataberoli").unwrap(),
            Predicate::is("private", true).unwrap(),
        ];
        assert_eq!(translate(&predicates).unwrap(), "signature user:renataberoli is:private");
    }

    #[test]
    fn test_unsupported_forms() {
        let no_negation = Predicate::is("sponsorable", false).unwrap();
        assert!(predicate_token(&no_negation).is_err());

        let primary_labels = p("labels", Operator::AnyItemHas, "bug");
        assert!(predicate_token(&primary_labels).is_err());

        let equals_name = p("name", Operator::Equals, "python");
        assert!(predicate_token(&equals_name).is_err());
    }

    #[test]
    fn test_secondary_payload_predicates_are_skipped() {
        let predicates = vec![
            Predicate::keyword("renataberoli").unwrap(),
            p("labels", Operator::AnyItemHas, "help wanted").secondary(),
        ];
        assert_eq!(translate(&predicates).unwrap(), "renataberoli");
    }

    #[test]
    fn test_empty_query_is_rejected() {
        let only_labels = vec![p("labels", Operator::NoItemHas, "bug").secondary()];
        assert!(translate(&only_labels).is_err());
    }

    #[test]
    fn test_round_trip() {
        let predicates = vec![
            Predicate::keyword("renataberoli").unwrap(),
            Predicate::contains("description", "help wanted").unwrap(),
            p("forks", Operator::GreaterOrEqual, 10_000_i64),
            p("pushed", Operator::Equals, "2020-01-01"),
            Predicate::is("private", false).unwrap(),
            Predicate::not_null("mirror").unwrap(),
            p("license", Operator::SetMembership, vec!["mit", "apache-2.0"]),
            Predicate::is("archived", true).unwrap(),
            Predicate::member_of("language", "python").unwrap(),
            Predicate::member_of("topic", "cli").unwrap(),
        ];
        let query = translate(&predicates).unwrap();
        let parsed = parse(&query).unwrap();
        let expected: Vec<ParsedToken> = predicates.iter().map(ParsedToken::from_predicate).collect();

        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_parse_rejects_unknown_qualifier() {
        assert!(parse("watchers:>3").is_err());
        assert!(parse("python in:wiki").is_err());
    }
}
