//! The compiled query a case runs.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::translate::translate;
use crate::errors::{Result, VerifyError};
use crate::predicate::{field, FieldDef, Predicate, Target};

/// Search endpoint family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTarget {
    /// `/search/repositories`
    #[default]
    Repositories,
    /// `/search/users`
    Users,
    /// `/search/code`
    Code,
}

impl SearchTarget {
    /// Endpoint path relative to the API base.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Repositories => "/search/repositories",
            Self::Users => "/search/users",
            Self::Code => "/search/code",
        }
    }
}

impl fmt::Display for SearchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Repositories => write!(f, "repositories"),
            Self::Users => write!(f, "users"),
            Self::Code => write!(f, "code"),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Smallest first.
    Asc,
    /// Largest first.
    #[default]
    Desc,
}

impl SortDirection {
    /// Value of the `order` parameter.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Requested ordering of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    /// Value of the `sort` parameter.
    pub key: String,
    /// Direction.
    pub direction: SortDirection,
}

impl SortSpec {
    /// The catalog field this sort orders by, if any.
    #[must_use]
    pub fn field(&self) -> Option<&'static FieldDef> {
        field::lookup_sort_key(&self.key)
    }
}

/// Ordered predicates plus sort and authentication mode.
///
/// Built once per case and read-only afterwards. The query string is
/// rendered at build time, so translation errors surface before any request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySpec {
    target: SearchTarget,
    predicates: Vec<Predicate>,
    sort: Option<SortSpec>,
    authenticated: bool,
    query: String,
}

impl QuerySpec {
    /// Starts a builder for the given endpoint.
    #[must_use]
    pub fn builder(target: SearchTarget) -> QuerySpecBuilder {
        QuerySpecBuilder::new(target)
    }

    /// The endpoint family.
    #[must_use]
    pub const fn target(&self) -> SearchTarget {
        self.target
    }

    /// All predicates in declaration order.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Predicates applying to one payload, keywords excluded.
    pub fn checked_predicates(&self, target: Target) -> impl Iterator<Item = &Predicate> {
        self.predicates
            .iter()
            .filter(move |p| !p.is_keyword() && p.applies_to() == target)
    }

    /// Requested ordering.
    #[must_use]
    pub const fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    /// Whether requests carry the credential.
    #[must_use]
    pub const fn authenticated(&self) -> bool {
        self.authenticated
    }

    /// The rendered `q` parameter.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Request parameters for one page, in the provider's order.
    #[must_use]
    pub fn params(&self, page: u32, per_page: u32) -> Vec<(String, String)> {
        let mut params = vec![("q".to_string(), self.query.clone())];
        if let Some(sort) = &self.sort {
            params.push(("sort".to_string(), sort.key.clone()));
            params.push(("order".to_string(), sort.direction.as_str().to_string()));
        }
        params.push(("page".to_string(), page.to_string()));
        params.push(("per_page".to_string(), per_page.to_string()));
        params
    }
}

/// Builder for [`QuerySpec`].
#[derive(Debug)]
pub struct QuerySpecBuilder {
    target: SearchTarget,
    predicates: Vec<Predicate>,
    sort: Option<SortSpec>,
    authenticated: bool,
    error: Option<VerifyError>,
}

impl QuerySpecBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub const fn new(target: SearchTarget) -> Self {
        Self {
            target,
            predicates: Vec::new(),
            sort: None,
            authenticated: false,
            error: None,
        }
    }

    /// Appends a predicate. Construction errors are kept and reported by `build`.
    #[must_use]
    pub fn predicate(mut self, predicate: Result<Predicate>) -> Self {
        match predicate {
            Ok(p) => self.predicates.push(p),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    /// Appends several predicates.
    #[must_use]
    pub fn predicates(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.predicates.extend(predicates);
        self
    }

    /// Sets the sort key and direction.
    #[must_use]
    pub fn sort(mut self, key: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(SortSpec {
            key: key.into(),
            direction,
        });
        self
    }

    /// Sets the authentication mode.
    #[must_use]
    pub const fn authenticated(mut self, authenticated: bool) -> Self {
        self.authenticated = authenticated;
        self
    }

    /// Validates and renders the query.
    pub fn build(self) -> Result<QuerySpec> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let query = translate(&self.predicates)?;

        Ok(QuerySpec {
            target: self.target,
            predicates: self.predicates,
            sort: self.sort,
            authenticated: self.authenticated,
            query,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Operator;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_renders_query() {
        let spec = QuerySpec::builder(SearchTarget::Repositories)
            .predicate(Predicate::new("stars", Operator::GreaterThan, 5000_i64))
            .sort("stars", SortDirection::Asc)
            .build()
            .unwrap();

        assert_eq!(spec.query(), "stars:>5000");
        assert_eq!(spec.sort().unwrap().field().unwrap().name, "stars");
        assert!(!spec.authenticated());
    }

    #[test]
    fn test_params_order() {
        let spec = QuerySpec::builder(SearchTarget::Repositories)
            .predicate(Predicate::new("forks", Operator::GreaterOrEqual, 10_000_i64))
            .sort("forks", SortDirection::Asc)
            .build()
            .unwrap();

        let params = spec.params(2, 50);
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["q", "sort", "order", "page", "per_page"]);
        assert_eq!(params[2].1, "asc");
        assert_eq!(params[3].1, "2");
    }

    #[test]
    fn test_builder_surfaces_first_predicate_error() {
        let err = QuerySpec::builder(SearchTarget::Repositories)
            .predicate(Predicate::contains("watchers", "x"))
            .predicate(Predicate::contains("name", "python"))
            .build()
            .unwrap_err();

        assert_eq!(err.kind(), "unsupported_predicate");
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn test_build_fails_on_untranslatable_predicate() {
        let result = QuerySpec::builder(SearchTarget::Repositories)
            .predicate(Predicate::is("sponsorable", false))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_checked_predicates_skip_keywords() {
        let spec = QuerySpec::builder(SearchTarget::Repositories)
            .predicate(Predicate::keyword("cadmio"))
            .predicate(Predicate::contains("readme", "cadmio").map(Predicate::secondary))
            .predicate(Predicate::is("archived", false))
            .build()
            .unwrap();

        assert_eq!(spec.checked_predicates(Target::Primary).count(), 1);
        assert_eq!(spec.checked_predicates(Target::Secondary).count(), 1);
        assert_eq!(spec.query(), "cadmio cadmio in:readme archived:false");
    }

    #[test]
    fn test_target_paths() {
        assert_eq!(SearchTarget::Users.path(), "/search/users");
        assert_eq!(SearchTarget::Code.to_string(), "code");
    }
}
