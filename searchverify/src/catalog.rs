//! The built-in scenarios for repository, user and code search.
//!
//! Each function returns fully built cases; a scenario that fails to build
//! is a programming error surfaced through the returned `Result`.

use crate::case::VerificationCase;
use crate::errors::Result;
use crate::predicate::{Operator, Predicate};
use crate::query::{SearchTarget, SortDirection};
use crate::secondary::SecondaryLink;
use crate::validate::CountExpectation;

fn repos(name: &str) -> crate::case::CaseBuilder {
    VerificationCase::builder(name, SearchTarget::Repositories)
}

fn users(name: &str) -> crate::case::CaseBuilder {
    VerificationCase::builder(name, SearchTarget::Users)
}

/// Repository search scenarios.
pub fn repository_cases() -> Result<Vec<VerificationCase>> {
    Ok(vec![
        repos("repo by name")
            .predicate(Predicate::contains("name", "python"))
            .build()?,
        repos("repo by description")
            .predicate(Predicate::contains("description", "python"))
            .build()?,
        repos("repo by readme")
            .secondary_predicate(Predicate::contains("readme", "cadmio"))
            .follow(SecondaryLink::readme())
            .build()?,
        repos("repo by full name")
            .predicate(Predicate::equals("repo", "renataberoli/renataberoli.github.io"))
            .expect(CountExpectation::Exactly(1))
            .build()?,
        repos("repo by user")
            .predicate(Predicate::equals("user", "renataberoli"))
            .build()?,
        repos("repo by org")
            .predicate(Predicate::equals("org", "github"))
            .build()?,
        repos("repo by size")
            .predicate(Predicate::new("size", Operator::LessOrEqual, 100_i64))
            .build()?,
        // Repository items carry no follower count.
        repos("repo by followers")
            .predicate(Predicate::contains("description", "renataberoli"))
            .predicate(Predicate::equals("followers", 1_i64))
            .best_effort()
            .build()?,
        repos("repo by forks")
            .predicate(Predicate::new("forks", Operator::GreaterOrEqual, 10_000_i64))
            .sort("forks", SortDirection::Asc)
            .build()?,
        repos("repo by stars")
            .predicate(Predicate::new("stars", Operator::GreaterThan, 5000_i64))
            .sort("stars", SortDirection::Asc)
            .build()?,
        repos("repo by creation date")
            .predicate(Predicate::new("created", Operator::LessOrEqual, "2021-01-01"))
            .build()?,
        repos("repo by push date")
            .predicate(Predicate::equals("pushed", "2020-01-01"))
            .build()?,
        repos("repo by language")
            .predicate(Predicate::equals("language", "Python"))
            .build()?,
        repos("repo by topic")
            .predicate(Predicate::member_of("topic", "python"))
            .build()?,
        repos("repo by topic count")
            .predicate(Predicate::equals("topics", 1_i64))
            .build()?,
        repos("repo by license")
            .predicate(Predicate::equals("license", "eupl-1.1"))
            .build()?,
        repos("private repo hidden from anonymous search")
            .predicate(Predicate::contains("readme", "signature"))
            .predicate(Predicate::equals("user", "renataberoli"))
            .predicate(Predicate::is("private", true))
            .expect(CountExpectation::Empty)
            .build()?,
        repos("private repo visible to its owner")
            .secondary_predicate(Predicate::contains("readme", "signature"))
            .predicate(Predicate::equals("user", "renataberoli"))
            .predicate(Predicate::is("private", true))
            .follow(SecondaryLink::readme())
            .authenticated(true)
            .expect(CountExpectation::AtLeast(1))
            .build()?,
        repos("public repo")
            .predicate(Predicate::contains("description", "renataberoli"))
            .predicate(Predicate::equals("user", "renataberoli"))
            .predicate(Predicate::is("private", false))
            .build()?,
        repos("mirror repo")
            .predicate(Predicate::not_null("mirror"))
            .build()?,
        repos("archived repo")
            .predicate(Predicate::is("archived", true))
            .build()?,
        repos("repo with good first issues")
            .predicate(Predicate::contains("description", "renataberoli"))
            .predicate(Predicate::equals("good-first-issues", 1_i64))
            .secondary_predicate(Predicate::new("labels", Operator::AnyItemHas, "good first issue"))
            .follow(SecondaryLink::issues())
            .best_effort()
            .build()?,
        repos("repo with help wanted issues")
            .predicate(Predicate::contains("description", "renataberoli"))
            .predicate(Predicate::equals("help-wanted-issues", 1_i64))
            .secondary_predicate(Predicate::new("labels", Operator::AnyItemHas, "help wanted"))
            .follow(SecondaryLink::issues())
            .best_effort()
            .build()?,
        // Sponsorship is not exposed anywhere, so this is inconclusive at best.
        repos("sponsorable repo")
            .predicate(Predicate::is("sponsorable", true))
            .best_effort()
            .build()?,
    ])
}

/// User search scenarios.
pub fn user_cases() -> Result<Vec<VerificationCase>> {
    Ok(vec![
        users("user by followers")
            .keyword("python")
            .predicate(Predicate::new("followers", Operator::GreaterOrEqual, 30_i64))
            .sort("followers", SortDirection::Asc)
            .follow(SecondaryLink::resource("followers_url").with_count(CountExpectation::AtLeast(30)))
            .best_effort()
            .build()?,
        users("user by type")
            .predicate(Predicate::equals("type", "organization"))
            .build()?,
        users("user by repository language")
            .predicate(Predicate::equals("language", "python"))
            .predicate(Predicate::new("repos", Operator::GreaterThan, 30_i64))
            .secondary_predicate(Predicate::new("language", Operator::AnyItemHas, "python"))
            .follow(SecondaryLink::resource("repos_url"))
            .best_effort()
            .build()?,
        users("user by location")
            .keyword("python")
            .secondary_predicate(Predicate::contains("location", "denmark"))
            .follow(SecondaryLink::resource("url"))
            .build()?,
    ])
}

/// Code search scenarios.
pub fn code_cases() -> Result<Vec<VerificationCase>> {
    Ok(vec![VerificationCase::builder("code by text, extension and user", SearchTarget::Code)
        .predicate(Predicate::contains("file", "phage"))
        .predicate(Predicate::equals("extension", "md"))
        .predicate(Predicate::equals("user", "voorloopnul"))
        .best_effort()
        .build()?])
}

/// Every built-in scenario.
pub fn all_cases() -> Result<Vec<VerificationCase>> {
    let mut cases = repository_cases()?;
    cases.extend(user_cases()?);
    cases.extend(code_cases()?);
    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn query_of<'a>(cases: &'a [VerificationCase], name: &str) -> &'a str {
        cases
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.spec().query())
            .unwrap()
    }

    #[test]
    fn test_every_case_builds_with_a_unique_name() {
        let cases = all_cases().unwrap();
        assert_eq!(cases.len(), 29);
        let names: HashSet<&str> = cases.iter().map(VerificationCase::name).collect();
        assert_eq!(names.len(), cases.len());
    }

    #[test]
    fn test_catalog_queries() {
        let repos = repository_cases().unwrap();
        assert_eq!(query_of(&repos, "repo by readme"), "cadmio in:readme");
        assert_eq!(query_of(&repos, "repo by size"), "size:<=100");
        assert_eq!(
            query_of(&repos, "private repo hidden from anonymous search"),
            "signature in:readme user:renataberoli is:private"
        );
        assert_eq!(
            query_of(&repos, "repo with help wanted issues"),
            "renataberoli in:description help-wanted-issues:1"
        );

        let users = user_cases().unwrap();
        assert_eq!(query_of(&users, "user by location"), "python location:denmark");
        assert_eq!(query_of(&users, "user by repository language"), "language:python repos:>30");

        let code = code_cases().unwrap();
        assert_eq!(
            query_of(&code, "code by text, extension and user"),
            "phage in:file extension:md user:voorloopnul"
        );
    }

    #[test]
    fn test_user_by_followers_counts_the_follower_list() {
        let users = user_cases().unwrap();
        let case = users.iter().find(|c| c.name() == "user by followers").unwrap();
        let link = case.secondary().unwrap();
        assert_eq!(link.kind(), &crate::secondary::LinkKind::Resource("followers_url".to_string()));
        assert_eq!(link.expected_count(), Some(CountExpectation::AtLeast(30)));
    }

    #[test]
    fn test_only_visibility_case_authenticates() {
        let authenticated: Vec<String> = all_cases()
            .unwrap()
            .into_iter()
            .filter(|c| c.spec().authenticated())
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(authenticated, vec!["private repo visible to its owner"]);
    }
}
