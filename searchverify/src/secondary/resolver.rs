//! Fetches follow-up payloads and checks secondary predicates against them.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::link::{LinkKind, SecondaryLink};
use crate::cancellation::CancellationToken;
use crate::config::HarnessConfig;
use crate::errors::{Result, VerifyError};
use crate::executor::FetchExecutor;
use crate::item::ResultItem;
use crate::predicate::Predicate;
use crate::validate::{
    CountExpectation, CountReport, PredicateReport, PredicateStatus, SecondaryReport, Validator, Violation,
};

/// A resolved follow-up payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SecondaryPayload {
    /// A single object, such as a README or a user profile.
    Single(ResultItem),
    /// An array, such as an issue or follower list.
    Collection(Vec<ResultItem>),
    /// Nothing to check; the reason is reported as unverifiable.
    Missing(String),
}

impl SecondaryPayload {
    /// Items to validate.
    #[must_use]
    pub fn items(&self) -> &[ResultItem] {
        match self {
            Self::Single(item) => std::slice::from_ref(item),
            Self::Collection(items) => items,
            Self::Missing(_) => &[],
        }
    }
}

/// Follows secondary links through the shared executor.
#[derive(Debug, Clone)]
pub struct SecondaryResolver {
    executor: Arc<FetchExecutor>,
    config: Arc<HarnessConfig>,
}

impl SecondaryResolver {
    /// Creates a resolver.
    #[must_use]
    pub const fn new(executor: Arc<FetchExecutor>, config: Arc<HarnessConfig>) -> Self {
        Self { executor, config }
    }

    /// Resolves one link for one primary item.
    ///
    /// A README that is missing or rejected is a legitimate repository state
    /// and resolves to [`SecondaryPayload::Missing`]. A collection endpoint
    /// answering 404 or 410 does too. Rate-limit exhaustion and cancellation
    /// propagate and abort the case.
    pub async fn resolve(
        &self,
        item: &ResultItem,
        link: &SecondaryLink,
        authenticated: bool,
        cancel: &CancellationToken,
    ) -> Result<(Option<String>, SecondaryPayload)> {
        let Some(url) = link.url_for(item, &self.config) else {
            let reason = format!("{} has no {} link", item.label(), link.kind());
            return Ok((None, SecondaryPayload::Missing(reason)));
        };
        debug!(url = %url, link = %link.kind(), item = %item.label(), "Resolving secondary link");

        let payload = match link.kind() {
            LinkKind::Readme => match self.executor.fetch_one(&url, authenticated, cancel).await {
                Ok(response) if response.status == 200 => {
                    SecondaryPayload::Single(ResultItem::from_value(json!({
                        "content": response.body,
                        "url": url,
                    }))?)
                }
                Ok(response) => SecondaryPayload::Missing(format!("README returned {}", response.status)),
                Err(VerifyError::RequestRejected { status, .. }) => {
                    SecondaryPayload::Missing(format!("README returned {status}"))
                }
                Err(VerifyError::TransientNetwork { message, .. }) => {
                    SecondaryPayload::Missing(format!("README unavailable: {message}"))
                }
                Err(e) => return Err(e),
            },
            LinkKind::Issues => {
                let limits = self.executor.limits();
                match self
                    .executor
                    .execute_collection(&url, authenticated, limits, cancel)
                    .await
                {
                    Ok(outcome) => SecondaryPayload::Collection(outcome.items),
                    Err(e) => gone_or(e)?,
                }
            }
            LinkKind::Resource(_) | LinkKind::Custom(_) => {
                match self.executor.fetch_one(&url, authenticated, cancel).await {
                    Ok(response) => parse_payload(&response.body)?,
                    Err(e) => gone_or(e)?,
                }
            }
        };

        if let SecondaryPayload::Missing(reason) = &payload {
            info!(url = %url, reason = %reason, "Secondary payload unavailable");
        }
        Ok((Some(url), payload))
    }

    /// Resolves the link for each selected item and validates `predicates`.
    ///
    /// Returns one report per followed item plus every secondary violation.
    /// With nothing to follow, a single report marks every predicate and the
    /// count expectation unverifiable.
    pub async fn verify(
        &self,
        items: &[ResultItem],
        link: &SecondaryLink,
        predicates: &[&Predicate],
        validator: &Validator,
        authenticated: bool,
        cancel: &CancellationToken,
    ) -> Result<(Vec<SecondaryReport>, Vec<Violation>)> {
        let selected = link.select(items);
        if selected.is_empty() {
            let reason = format!("no primary item to follow {}", link.kind());
            debug!(link = %link.kind(), "Secondary predicates left unchecked");
            let report = SecondaryReport {
                item_label: "<none>".to_string(),
                url: None,
                predicates: predicates.iter().map(|p| unverifiable(p, &reason)).collect(),
                count: link.expected_count().map(unchecked_count),
                missing: Some(reason),
            };
            return Ok((vec![report], Vec::new()));
        }

        let mut reports = Vec::new();
        let mut violations = Vec::new();

        for item in selected {
            let (url, payload) = self.resolve(item, link, authenticated, cancel).await?;

            let report = match &payload {
                SecondaryPayload::Missing(reason) => SecondaryReport {
                    item_label: item.label(),
                    url,
                    predicates: predicates
                        .iter()
                        .map(|p| unverifiable(p, reason))
                        .collect(),
                    count: link.expected_count().map(unchecked_count),
                    missing: Some(reason.clone()),
                },
                resolved => {
                    let checked = validator.validate(resolved.items(), predicates.iter().copied());
                    violations.extend(checked.violations);
                    SecondaryReport {
                        item_label: item.label(),
                        url,
                        predicates: checked.predicates,
                        count: link
                            .expected_count()
                            .map(|expect| expect.check(resolved.items().len() as u64)),
                        missing: None,
                    }
                }
            };
            reports.push(report);
        }

        Ok((reports, violations))
    }
}

fn gone_or(err: VerifyError) -> Result<SecondaryPayload> {
    match err {
        VerifyError::RequestRejected { status: 404 | 410, url, .. } => {
            Ok(SecondaryPayload::Missing(format!("{url} is gone")))
        }
        other => Err(other),
    }
}

fn parse_payload(body: &str) -> Result<SecondaryPayload> {
    match serde_json::from_str::<Value>(body)? {
        Value::Array(entries) => entries
            .into_iter()
            .map(ResultItem::from_value)
            .collect::<Result<Vec<_>>>()
            .map(SecondaryPayload::Collection),
        other => ResultItem::from_value(other).map(SecondaryPayload::Single),
    }
}

const fn unchecked_count(expected: CountExpectation) -> CountReport {
    CountReport {
        expected,
        observed: 0,
        status: PredicateStatus::Unverifiable,
    }
}

fn unverifiable(predicate: &Predicate, reason: &str) -> PredicateReport {
    PredicateReport {
        predicate: predicate.clone(),
        status: PredicateStatus::Unverifiable,
        checked_items: 0,
        violations: 0,
        reason: Some(VerifyError::unverifiable(predicate.field().unwrap_or("<free text>"), reason).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{HttpResponse, RateLimitGate};
    use crate::predicate::Operator;
    use crate::testing::{fixtures, ScriptedTransport};
    use pretty_assertions::assert_eq;

    fn resolver(transport: Arc<ScriptedTransport>) -> SecondaryResolver {
        let config = Arc::new(HarnessConfig::default());
        let executor = Arc::new(FetchExecutor::new(&config, transport, Arc::new(RateLimitGate::default())));
        SecondaryResolver::new(executor, config)
    }

    fn repo_item() -> ResultItem {
        ResultItem::from_value(fixtures::repo("cadmio").owner("mona").build()).unwrap()
    }

    #[tokio::test]
    async fn test_readme_resolves_to_content() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            "raw.githubusercontent.com/mona/cadmio/main/README.md",
            HttpResponse::new(200, "# Cadmio\nA small tool."),
        ));
        let (url, payload) = resolver(transport)
            .resolve(&repo_item(), &SecondaryLink::readme(), false, &CancellationToken::new())
            .await
            .unwrap();

        assert!(url.unwrap().ends_with("/mona/cadmio/main/README.md"));
        let SecondaryPayload::Single(item) = payload else {
            panic!("expected a single payload");
        };
        assert_eq!(item.get_str("content"), Some("# Cadmio\nA small tool."));
    }

    #[tokio::test]
    async fn test_missing_readme_is_not_an_error() {
        let transport = Arc::new(
            ScriptedTransport::new().respond("README.md", HttpResponse::new(404, "404: Not Found")),
        );
        let (_, payload) = resolver(transport)
            .resolve(&repo_item(), &SecondaryLink::readme(), false, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(payload, SecondaryPayload::Missing("README returned 404".to_string()));
    }

    #[tokio::test]
    async fn test_issues_collection() {
        let issues = serde_json::json!([
            fixtures::issue(1).labels(&["help wanted"]).build(),
            fixtures::issue(2).build()
        ]);
        let transport = Arc::new(
            ScriptedTransport::new().respond("/repos/mona/cadmio/issues", fixtures::json_response(&issues)),
        );
        let (url, payload) = resolver(transport.clone())
            .resolve(&repo_item(), &SecondaryLink::issues(), false, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(url.as_deref(), Some("https://api.github.com/repos/mona/cadmio/issues"));
        assert_eq!(payload.items().len(), 2);
        assert_eq!(transport.requests()[0].param("per_page"), Some("30"));
    }

    #[tokio::test]
    async fn test_disabled_issues_are_missing() {
        let transport = Arc::new(
            ScriptedTransport::new().respond("/issues", HttpResponse::new(410, "Issues are disabled")),
        );
        let (_, payload) = resolver(transport)
            .resolve(&repo_item(), &SecondaryLink::issues(), false, &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(payload, SecondaryPayload::Missing(_)));
    }

    #[tokio::test]
    async fn test_resource_object_is_single() {
        let user = ResultItem::from_value(fixtures::user("mona").build()).unwrap();
        let detail = fixtures::user("mona").detail("Copenhagen, Denmark", 40, 12).build();
        let transport = Arc::new(
            ScriptedTransport::new().respond("/users/mona", fixtures::json_response(&detail)),
        );

        let (_, payload) = resolver(transport)
            .resolve(&user, &SecondaryLink::resource("url"), false, &CancellationToken::new())
            .await
            .unwrap();
        let SecondaryPayload::Single(item) = payload else {
            panic!("expected a single payload");
        };
        assert_eq!(item.get_str("location"), Some("Copenhagen, Denmark"));
    }

    #[tokio::test]
    async fn test_verify_counts_collection_entries() {
        let user = ResultItem::from_value(fixtures::user("mona").build()).unwrap();
        let followers = serde_json::json!([fixtures::user("a").build(), fixtures::user("b").build()]);
        let transport = Arc::new(
            ScriptedTransport::new().respond("/users/mona/followers", fixtures::json_response(&followers)),
        );
        let link = SecondaryLink::resource("followers_url").with_count(CountExpectation::Exactly(2));

        let (reports, violations) = resolver(transport)
            .verify(&[user], &link, &[], &Validator::default(), false, &CancellationToken::new())
            .await
            .unwrap();

        assert!(violations.is_empty());
        let count = reports[0].count.unwrap();
        assert_eq!(count.observed, 2);
        assert_eq!(count.status, PredicateStatus::Satisfied);
    }

    #[tokio::test]
    async fn test_verify_reports_missing_payload_as_unverifiable() {
        let transport = Arc::new(
            ScriptedTransport::new().respond("README.md", HttpResponse::new(404, "")),
        );
        let predicate = Predicate::contains("readme", "cadmio").unwrap().secondary();

        let (reports, violations) = resolver(transport)
            .verify(
                &[repo_item()],
                &SecondaryLink::readme(),
                &[&predicate],
                &Validator::default(),
                false,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(violations.is_empty());
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].predicates[0].status, PredicateStatus::Unverifiable);
        assert!(reports[0].missing.is_some());
    }

    #[tokio::test]
    async fn test_verify_without_items_leaves_predicates_unverifiable() {
        let transport = Arc::new(ScriptedTransport::new());
        let predicate = Predicate::contains("readme", "cadmio").unwrap().secondary();

        let (reports, violations) = resolver(transport.clone())
            .verify(
                &[],
                &SecondaryLink::readme(),
                &[&predicate],
                &Validator::default(),
                false,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(violations.is_empty());
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].predicates[0].status, PredicateStatus::Unverifiable);
        assert!(reports[0].missing.as_deref().unwrap().contains("no primary item"));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_verify_checks_issue_labels() {
        let issues = serde_json::json!([fixtures::issue(1).labels(&["bug"]).build()]);
        let transport = Arc::new(
            ScriptedTransport::new().respond("/issues", fixtures::json_response(&issues)),
        );
        let wanted = Predicate::new("labels", Operator::AnyItemHas, "help wanted").unwrap().secondary();

        let (reports, _) = resolver(transport)
            .verify(
                &[repo_item()],
                &SecondaryLink::issues(),
                &[&wanted],
                &Validator::default(),
                false,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(reports[0].predicates[0].status, PredicateStatus::Violated);
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_propagates() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond("/issues", fixtures::rate_limited(0))
                .respond("/issues", fixtures::rate_limited(0)),
        );
        let err = resolver(transport)
            .resolve(&repo_item(), &SecondaryLink::issues(), false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "rate_limit_exhausted");
    }
}
