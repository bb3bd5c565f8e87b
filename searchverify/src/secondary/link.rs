//! Links from a primary result to a follow-up payload.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::config::HarnessConfig;
use crate::item::ResultItem;
use crate::validate::CountExpectation;

/// Derives a follow-up URL from a primary item.
pub type UrlTemplate = Arc<dyn Fn(&ResultItem, &HarnessConfig) -> Option<String> + Send + Sync>;

/// What a link points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum LinkKind {
    /// The repository README on the raw content host.
    Readme,
    /// The repository issue collection.
    Issues,
    /// A URL stored in one of the item's fields.
    Resource(String),
    /// A caller-supplied template.
    Custom(String),
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Readme => write!(f, "readme"),
            Self::Issues => write!(f, "issues"),
            Self::Resource(field) => write!(f, "resource:{field}"),
            Self::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

/// Which primary items a case follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUp {
    /// The first item.
    #[default]
    First,
    /// One random item, reproducible with a seed.
    Random {
        /// RNG seed.
        seed: Option<u64>,
    },
    /// Up to `limit` items from the start.
    All {
        /// Maximum items followed.
        limit: usize,
    },
}

/// A follow-up link owned by one case.
#[derive(Clone)]
pub struct SecondaryLink {
    kind: LinkKind,
    template: UrlTemplate,
    follow: FollowUp,
    expect: Option<CountExpectation>,
}

impl fmt::Debug for SecondaryLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondaryLink")
            .field("kind", &self.kind)
            .field("follow", &self.follow)
            .field("expect", &self.expect)
            .finish_non_exhaustive()
    }
}

impl SecondaryLink {
    /// `{raw_base}/{owner}/{name}/{default_branch}/{readme_path}`.
    #[must_use]
    pub fn readme() -> Self {
        Self::new(
            LinkKind::Readme,
            Arc::new(|item: &ResultItem, config: &HarnessConfig| {
                let owner = item.get_str("owner.login")?;
                let name = item.get_str("name")?;
                let branch = item.get_str("default_branch")?;
                Some(format!(
                    "{}/{owner}/{name}/{branch}/{}",
                    config.raw_content_base_url.trim_end_matches('/'),
                    config.readme_path.trim_start_matches('/')
                ))
            }),
        )
    }

    /// The item's `issues_url` with its `{/number}` placeholder removed.
    #[must_use]
    pub fn issues() -> Self {
        Self::new(
            LinkKind::Issues,
            Arc::new(|item: &ResultItem, _: &HarnessConfig| {
                item.get_str("issues_url").map(strip_placeholder)
            }),
        )
    }

    /// Follows the URL stored in `field`, such as `url`, `followers_url` or `repos_url`.
    #[must_use]
    pub fn resource(field: &str) -> Self {
        let path = field.to_string();
        Self::new(
            LinkKind::Resource(field.to_string()),
            Arc::new(move |item: &ResultItem, _: &HarnessConfig| {
                item.get_str(&path).map(strip_placeholder)
            }),
        )
    }

    /// A named caller-supplied template.
    #[must_use]
    pub fn custom<F>(name: impl Into<String>, template: F) -> Self
    where
        F: Fn(&ResultItem) -> Option<String> + Send + Sync + 'static,
    {
        Self::new(
            LinkKind::Custom(name.into()),
            Arc::new(move |item: &ResultItem, _: &HarnessConfig| template(item)),
        )
    }

    fn new(kind: LinkKind, template: UrlTemplate) -> Self {
        Self {
            kind,
            template,
            follow: FollowUp::default(),
            expect: None,
        }
    }

    /// Sets which primary items are followed.
    #[must_use]
    pub const fn with_follow(mut self, follow: FollowUp) -> Self {
        self.follow = follow;
        self
    }

    /// Expects the followed payload to hold this many entries.
    #[must_use]
    pub const fn with_count(mut self, expect: CountExpectation) -> Self {
        self.expect = Some(expect);
        self
    }

    /// The payload size expectation, if any.
    #[must_use]
    pub const fn expected_count(&self) -> Option<CountExpectation> {
        self.expect
    }

    /// The link kind.
    #[must_use]
    pub const fn kind(&self) -> &LinkKind {
        &self.kind
    }

    /// The follow-up selection.
    #[must_use]
    pub const fn follow(&self) -> FollowUp {
        self.follow
    }

    /// Derives the follow-up URL, or `None` if the item lacks the parts.
    #[must_use]
    pub fn url_for(&self, item: &ResultItem, config: &HarnessConfig) -> Option<String> {
        (self.template)(item, config)
    }

    /// Picks the primary items to follow.
    #[must_use]
    pub fn select<'a>(&self, items: &'a [ResultItem]) -> Vec<&'a ResultItem> {
        if items.is_empty() {
            return Vec::new();
        }
        match self.follow {
            FollowUp::First => items.iter().take(1).collect(),
            FollowUp::Random { seed } => {
                let index = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed).gen_range(0..items.len()),
                    None => rand::thread_rng().gen_range(0..items.len()),
                };
                vec![&items[index]]
            }
            FollowUp::All { limit } => items.iter().take(limit).collect(),
        }
    }
}

/// Removes a trailing URI-template placeholder such as `{/number}`.
#[must_use]
pub fn strip_placeholder(url: &str) -> String {
    match url.rfind('{') {
        Some(start) if url.ends_with('}') => url[..start].to_string(),
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn item(value: serde_json::Value) -> ResultItem {
        ResultItem::from_value(value).unwrap()
    }

    #[test]
    fn test_readme_url() {
        let repo = item(fixtures::repo("cadmio").owner("mona").default_branch("trunk").build());
        let url = SecondaryLink::readme().url_for(&repo, &HarnessConfig::default());
        assert_eq!(
            url.as_deref(),
            Some("https://raw.githubusercontent.com/mona/cadmio/trunk/README.md")
        );
    }

    #[test]
    fn test_readme_url_needs_branch() {
        let repo = item(fixtures::repo("cadmio").without("default_branch").build());
        assert!(SecondaryLink::readme().url_for(&repo, &HarnessConfig::default()).is_none());
    }

    #[test]
    fn test_issues_url_strips_placeholder() {
        let repo = item(fixtures::repo("r").owner("o").build());
        let url = SecondaryLink::issues().url_for(&repo, &HarnessConfig::default());
        assert_eq!(url.as_deref(), Some("https://api.github.com/repos/o/r/issues"));
    }

    #[test]
    fn test_strip_placeholder() {
        assert_eq!(
            strip_placeholder("https://api.github.com/users/x/following{/other_user}"),
            "https://api.github.com/users/x/following"
        );
        assert_eq!(strip_placeholder("https://api.github.com/users/x"), "https://api.github.com/users/x");
    }

    #[test]
    fn test_resource_and_custom_links() {
        let user = item(fixtures::user("mona").build());
        let config = HarnessConfig::default();

        let followers = SecondaryLink::resource("followers_url");
        assert_eq!(followers.kind().to_string(), "resource:followers_url");
        assert_eq!(
            followers.url_for(&user, &config).as_deref(),
            Some("https://api.github.com/users/mona/followers")
        );

        let custom = SecondaryLink::custom("events", |i: &ResultItem| {
            i.get_str("login").map(|l| format!("https://api.github.com/users/{l}/events"))
        });
        assert_eq!(
            custom.url_for(&user, &config).as_deref(),
            Some("https://api.github.com/users/mona/events")
        );
    }

    #[test]
    fn test_selection() {
        let items: Vec<ResultItem> = (0..5)
            .map(|i| item(fixtures::repo(&format!("r{i}")).build()))
            .collect();

        assert_eq!(SecondaryLink::issues().select(&items).len(), 1);
        assert_eq!(
            SecondaryLink::issues()
                .with_follow(FollowUp::All { limit: 3 })
                .select(&items)
                .len(),
            3
        );

        let random = SecondaryLink::issues().with_follow(FollowUp::Random { seed: Some(3) });
        assert_eq!(random.select(&items)[0], random.select(&items)[0]);
        assert!(random.select(&[]).is_empty());
    }
}
