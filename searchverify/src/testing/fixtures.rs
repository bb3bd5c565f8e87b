//! JSON fixtures shaped like provider payloads.

use serde_json::{json, Map, Value};

use crate::executor::rate_limit::{REMAINING_HEADER, RESET_HEADER};
use crate::executor::HttpResponse;

/// Builder for a repository search item.
#[derive(Debug, Clone)]
pub struct RepoFixture {
    fields: Map<String, Value>,
}

/// A public, unarchived repository owned by `octocat`.
#[must_use]
pub fn repo(name: &str) -> RepoFixture {
    let fields = json!({
        "id": 1,
        "name": name,
        "full_name": format!("octocat/{name}"),
        "owner": {"login": "octocat", "type": "User"},
        "private": false,
        "url": format!("https://api.github.com/repos/octocat/{name}"),
        "issues_url": format!("https://api.github.com/repos/octocat/{name}/issues{{/number}}"),
        "description": null,
        "size": 100,
        "stargazers_count": 0,
        "forks_count": 0,
        "created_at": "2020-01-01T00:00:00Z",
        "pushed_at": "2024-01-01T00:00:00Z",
        "language": null,
        "topics": [],
        "license": null,
        "archived": false,
        "mirror_url": null,
        "default_branch": "main"
    });
    RepoFixture {
        fields: into_map(fields),
    }
}

impl RepoFixture {
    /// Sets the numeric id.
    #[must_use]
    pub fn id(self, id: u64) -> Self {
        self.field("id", json!(id))
    }

    /// Changes the owner, updating `full_name` and the API URLs.
    #[must_use]
    pub fn owner(self, login: &str) -> Self {
        let name = self
            .fields
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.field("owner", json!({"login": login, "type": "User"}))
            .field("full_name", json!(format!("{login}/{name}")))
            .field("url", json!(format!("https://api.github.com/repos/{login}/{name}")))
            .field(
                "issues_url",
                json!(format!("https://api.github.com/repos/{login}/{name}/issues{{/number}}")),
            )
    }

    /// Sets the star count.
    #[must_use]
    pub fn stars(self, stars: u64) -> Self {
        self.field("stargazers_count", json!(stars))
    }

    /// Sets the fork count.
    #[must_use]
    pub fn forks(self, forks: u64) -> Self {
        self.field("forks_count", json!(forks))
    }

    /// Sets `created_at`.
    #[must_use]
    pub fn created_at(self, at: &str) -> Self {
        self.field("created_at", json!(at))
    }

    /// Sets `pushed_at`.
    #[must_use]
    pub fn pushed_at(self, at: &str) -> Self {
        self.field("pushed_at", json!(at))
    }

    /// Sets the primary language.
    #[must_use]
    pub fn language(self, language: &str) -> Self {
        self.field("language", json!(language))
    }

    /// Sets the description.
    #[must_use]
    pub fn description(self, description: &str) -> Self {
        self.field("description", json!(description))
    }

    /// Sets the topics.
    #[must_use]
    pub fn topics(self, topics: &[&str]) -> Self {
        self.field("topics", json!(topics))
    }

    /// Sets the license key.
    #[must_use]
    pub fn license(self, key: &str) -> Self {
        self.field("license", json!({"key": key, "name": key}))
    }

    /// Sets visibility.
    #[must_use]
    pub fn private(self, private: bool) -> Self {
        self.field("private", json!(private))
    }

    /// Sets the archived flag.
    #[must_use]
    pub fn archived(self, archived: bool) -> Self {
        self.field("archived", json!(archived))
    }

    /// Sets the mirror URL.
    #[must_use]
    pub fn mirror(self, url: &str) -> Self {
        self.field("mirror_url", json!(url))
    }

    /// Sets the default branch.
    #[must_use]
    pub fn default_branch(self, branch: &str) -> Self {
        self.field("default_branch", json!(branch))
    }

    /// Sets or replaces any field.
    #[must_use]
    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Drops a field entirely.
    #[must_use]
    pub fn without(mut self, key: &str) -> Self {
        self.fields.remove(key);
        self
    }

    /// The JSON object.
    #[must_use]
    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Builder for an issue payload.
#[derive(Debug, Clone)]
pub struct IssueFixture {
    fields: Map<String, Value>,
}

/// An open issue without labels.
#[must_use]
pub fn issue(number: u64) -> IssueFixture {
    IssueFixture {
        fields: into_map(json!({
            "number": number,
            "title": format!("Issue {number}"),
            "state": "open",
            "labels": []
        })),
    }
}

impl IssueFixture {
    /// Sets the label names.
    #[must_use]
    pub fn labels(mut self, names: &[&str]) -> Self {
        let labels: Vec<Value> = names.iter().map(|n| json!({"name": n})).collect();
        self.fields.insert("labels".to_string(), Value::Array(labels));
        self
    }

    /// Sets the state.
    #[must_use]
    pub fn state(mut self, state: &str) -> Self {
        self.fields.insert("state".to_string(), json!(state));
        self
    }

    /// The JSON object.
    #[must_use]
    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Builder for a user search item.
#[derive(Debug, Clone)]
pub struct UserFixture {
    fields: Map<String, Value>,
}

/// A user account as returned by user search.
#[must_use]
pub fn user(login: &str) -> UserFixture {
    UserFixture {
        fields: into_map(json!({
            "login": login,
            "id": 1,
            "type": "User",
            "url": format!("https://api.github.com/users/{login}"),
            "followers_url": format!("https://api.github.com/users/{login}/followers"),
            "repos_url": format!("https://api.github.com/users/{login}/repos")
        })),
    }
}

impl UserFixture {
    /// Sets the account type (`User` or `Organization`).
    #[must_use]
    pub fn kind(mut self, kind: &str) -> Self {
        self.fields.insert("type".to_string(), json!(kind));
        self
    }

    /// Adds the detail-only fields returned by the user endpoint.
    #[must_use]
    pub fn detail(mut self, location: &str, followers: u64, public_repos: u64) -> Self {
        self.fields.insert("location".to_string(), json!(location));
        self.fields.insert("followers".to_string(), json!(followers));
        self.fields.insert("public_repos".to_string(), json!(public_repos));
        self
    }

    /// The JSON object.
    #[must_use]
    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }
}

/// A code search item.
#[must_use]
pub fn code_item(path: &str, repo_full_name: &str) -> Value {
    let name = path.rsplit('/').next().unwrap_or(path);
    let owner = repo_full_name.split('/').next().unwrap_or(repo_full_name);
    json!({
        "name": name,
        "path": path,
        "repository": {"full_name": repo_full_name, "owner": {"login": owner}}
    })
}

/// A 200 search page.
#[must_use]
pub fn search_page(total_count: u64, items: Vec<Value>) -> HttpResponse {
    let body = json!({
        "total_count": total_count,
        "incomplete_results": false,
        "items": items
    });
    HttpResponse::new(200, body.to_string()).with_header(REMAINING_HEADER, "29")
}

/// A 200 JSON response.
#[must_use]
pub fn json_response(body: &Value) -> HttpResponse {
    HttpResponse::new(200, body.to_string())
}

/// A 403 with a spent budget that resets `reset_in_seconds` from now.
#[must_use]
pub fn rate_limited(reset_in_seconds: i64) -> HttpResponse {
    let reset = chrono::Utc::now().timestamp() + reset_in_seconds;
    HttpResponse::new(403, r#"{"message":"API rate limit exceeded"}"#)
        .with_header(REMAINING_HEADER, "0")
        .with_header(RESET_HEADER, reset.to_string())
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
