pub mod diff;
#[cfg(test)]
pub mod fixtures;
pub mod types;

pub use types::{FileStatus, PostedComment, PublishMode, PullRequest, PullRequestRef, ReviewEvent};

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, DEFAULT_MAX_COMMENT_CHARS};
use crate::review::ReviewText;

const API_VERSION: &str = "2022-11-28";
const CLIENT_NAME: &str = "pr-reviewer";

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("GitHub rejected the credentials ({0})")]
    Authentication(String),

    #[error("Not found on GitHub ({0})")]
    NotFound(String),

    #[error("GitHub rate limit exhausted ({0})")]
    RateLimited(String),

    #[error("GitHub API returned {status} ({message})")]
    Api { status: u16, message: String },

    #[error("Invalid PR URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid pull request reference: {0}")]
    InvalidReference(String),

    #[error("Failed to parse diff: {0}")]
    DiffParse(String),

    #[error("Refusing to publish an empty review")]
    EmptyReview,

    #[error("{0} is not valid UTF-8 text")]
    NotText(String),
}

/// A publish that failed part-way through a split review.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct PublishError {
    pub source: GitHubError,
    /// Parts that were already on the pull request when the failure happened.
    pub posted: Vec<PostedComment>,
}

impl From<GitHubError> for PublishError {
    fn from(source: GitHubError) -> Self {
        Self {
            source,
            posted: Vec::new(),
        }
    }
}

/// Something that can load a pull request with its changed files.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    async fn fetch(&self, reference: &PullRequestRef) -> Result<PullRequest, GitHubError>;
}

/// Something that can put review text on a pull request.
///
/// Implementations must not alter the text beyond splitting it across
/// several posts; the parts concatenate back to the original.
#[async_trait]
pub trait ReviewPublisher: Send + Sync {
    async fn publish(
        &self,
        reference: &PullRequestRef,
        review: &ReviewText,
    ) -> Result<Vec<PostedComment>, PublishError>;
}

/// Parse a GitHub PR URL into a reference.
///
/// Expected format: https://github.com/{owner}/{repo}/pull/{number}
pub fn parse_pr_url(url: &str) -> Result<PullRequestRef, GitHubError> {
    let parsed = Url::parse(url).map_err(|_| GitHubError::InvalidUrl(url.to_string()))?;

    if !matches!(parsed.host_str(), Some("github.com") | Some("www.github.com")) {
        return Err(GitHubError::InvalidUrl(url.to_string()));
    }

    let segments: Vec<_> = parsed
        .path_segments()
        .ok_or_else(|| GitHubError::InvalidUrl(url.to_string()))?
        .filter(|segment| !segment.is_empty())
        .collect();

    // Tolerate extra segments such as /pull/42/files.
    if segments.len() < 4 || segments[2] != "pull" {
        return Err(GitHubError::InvalidUrl(url.to_string()));
    }

    let number = segments[3]
        .parse::<u64>()
        .map_err(|_| GitHubError::InvalidUrl(url.to_string()))?;

    PullRequestRef::new(segments[0], segments[1], number)
}

/// REST client for the three GitHub calls the tool makes: PR metadata,
/// PR diff (plus optional file contents), and publishing.
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    include_contents: bool,
    mode: PublishMode,
    event: ReviewEvent,
    max_comment_chars: usize,
}

impl GitHubClient {
    /// Build a client from the loaded configuration.
    pub fn new(config: &Config, token: &str) -> Result<Self, GitHubError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.github.timeout_secs))
            .build()?;

        Ok(Self::with_http(http, &config.github.api_base, token)
            .include_contents(config.review.include_file_contents)
            .publish_as(
                config.publish.mode,
                config.publish.event,
                config.publish.max_comment_chars,
            ))
    }

    /// Build a client around an existing HTTP client with default options.
    pub fn with_http(http: reqwest::Client, api_base: &str, token: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            include_contents: false,
            mode: PublishMode::Comment,
            event: ReviewEvent::Comment,
            max_comment_chars: DEFAULT_MAX_COMMENT_CHARS,
        }
    }

    pub fn include_contents(mut self, enabled: bool) -> Self {
        self.include_contents = enabled;
        self
    }

    pub fn publish_as(mut self, mode: PublishMode, event: ReviewEvent, max_chars: usize) -> Self {
        self.mode = mode;
        self.event = event;
        self.max_comment_chars = max_chars;
        self
    }

    /// Fetch metadata and the parsed diff of a pull request.
    ///
    /// 1. GET /repos/{owner}/{repo}/pulls/{number} for metadata (JSON)
    /// 2. GET the same endpoint with Accept: application/vnd.github.diff
    /// 3. Split the diff into ChangedFile entries
    /// 4. Optionally GET the head revision of every non-removed text file
    #[instrument(skip(self, reference), fields(pr = %reference))]
    pub async fn fetch_pull_request(
        &self,
        reference: &PullRequestRef,
    ) -> Result<PullRequest, GitHubError> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}",
            self.api_base, reference.owner, reference.repo, reference.number
        );

        #[derive(Deserialize)]
        struct User {
            login: String,
        }

        #[derive(Deserialize)]
        struct Branch {
            #[serde(rename = "ref")]
            name: String,
            sha: String,
        }

        #[derive(Deserialize)]
        struct PullResponse {
            title: String,
            body: Option<String>,
            state: String,
            user: User,
            head: Branch,
            base: Branch,
            created_at: String,
            updated_at: String,
            #[serde(default)]
            changed_files: usize,
            #[serde(default)]
            additions: usize,
            #[serde(default)]
            deletions: usize,
        }

        debug!("fetching PR metadata from GitHub API");
        let metadata = self
            .send(
                self.request(Method::GET, &url)
                    .header(ACCEPT, "application/vnd.github+json"),
                "pull request",
            )
            .await?
            .json::<PullResponse>()
            .await?;
        debug!(title = %metadata.title, changed_files = metadata.changed_files, "received PR metadata");

        debug!("fetching PR diff from GitHub API");
        let diff_text = self
            .send(
                self.request(Method::GET, &url)
                    .header(ACCEPT, "application/vnd.github.diff"),
                "pull request diff",
            )
            .await?
            .text()
            .await?;
        debug!(diff_bytes = diff_text.len(), "received PR diff");

        let mut files = diff::parse_diff(&diff_text)?;
        if files.len() != metadata.changed_files {
            warn!(
                reported = metadata.changed_files,
                parsed = files.len(),
                "diff does not list every changed file"
            );
        }

        if self.include_contents {
            for file in files
                .iter_mut()
                .filter(|f| f.status != FileStatus::Removed && !f.binary)
            {
                match self
                    .fetch_file_contents(reference, &file.path, &metadata.head.sha)
                    .await
                {
                    Ok(contents) => file.contents = Some(contents),
                    Err(err) => warn!(path = %file.path, error = %err, "could not fetch file contents"),
                }
            }
        }

        Ok(PullRequest {
            reference: reference.clone(),
            title: metadata.title,
            body: metadata.body,
            state: metadata.state,
            author: metadata.user.login,
            head_ref: metadata.head.name,
            base_ref: metadata.base.name,
            head_sha: metadata.head.sha,
            created_at: metadata.created_at,
            updated_at: metadata.updated_at,
            additions: metadata.additions,
            deletions: metadata.deletions,
            files,
        })
    }

    /// GET /repos/{owner}/{repo}/contents/{path}?ref={sha} as raw text.
    async fn fetch_file_contents(
        &self,
        reference: &PullRequestRef,
        path: &str,
        sha: &str,
    ) -> Result<String, GitHubError> {
        let base = format!(
            "{}/repos/{}/{}/contents",
            self.api_base, reference.owner, reference.repo
        );
        let mut url = Url::parse(&base).map_err(|_| GitHubError::InvalidUrl(base.clone()))?;
        url.path_segments_mut()
            .map_err(|_| GitHubError::InvalidUrl(base.clone()))?
            .extend(path.split('/'));
        url.query_pairs_mut().append_pair("ref", sha);

        debug!(%path, "fetching file contents");
        let bytes = self
            .send(
                self.request(Method::GET, url.as_str())
                    .header(ACCEPT, "application/vnd.github.raw"),
                "file contents",
            )
            .await?
            .bytes()
            .await?;
        String::from_utf8(bytes.to_vec()).map_err(|_| GitHubError::NotText(path.to_string()))
    }

    /// Publish review text as one or more comments (or reviews), in order.
    ///
    /// In review mode only the last part carries the configured event; the
    /// parts before it are posted as COMMENT reviews.
    #[instrument(skip(self, reference, text), fields(pr = %reference, mode = ?self.mode))]
    pub async fn post_review_text(
        &self,
        reference: &PullRequestRef,
        text: &str,
    ) -> Result<Vec<PostedComment>, PublishError> {
        if text.trim().is_empty() {
            return Err(GitHubError::EmptyReview.into());
        }

        let parts = split_comment_body(text, self.max_comment_chars);
        let total = parts.len();
        let mut posted = Vec::with_capacity(total);
        for (index, part) in parts.into_iter().enumerate() {
            let result = match self.mode {
                PublishMode::Comment => self.create_issue_comment(reference, part).await,
                PublishMode::Review => {
                    let event = if index + 1 == total {
                        self.event
                    } else {
                        ReviewEvent::Comment
                    };
                    self.create_review(reference, part, event).await
                }
            };
            match result {
                Ok(comment) => {
                    info!(part = index + 1, total, id = comment.id, "published review part");
                    posted.push(comment);
                }
                Err(source) => return Err(PublishError { source, posted }),
            }
        }
        Ok(posted)
    }

    /// POST /repos/{owner}/{repo}/issues/{number}/comments
    async fn create_issue_comment(
        &self,
        reference: &PullRequestRef,
        body: &str,
    ) -> Result<PostedComment, GitHubError> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_base, reference.owner, reference.repo, reference.number
        );
        let comment = self
            .send(
                self.request(Method::POST, &url)
                    .header(ACCEPT, "application/vnd.github+json")
                    .json(&serde_json::json!({ "body": body })),
                "issue comment",
            )
            .await?
            .json::<PostedComment>()
            .await?;
        Ok(comment)
    }

    /// POST /repos/{owner}/{repo}/pulls/{number}/reviews
    async fn create_review(
        &self,
        reference: &PullRequestRef,
        body: &str,
        event: ReviewEvent,
    ) -> Result<PostedComment, GitHubError> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/reviews",
            self.api_base, reference.owner, reference.repo, reference.number
        );
        let review = self
            .send(
                self.request(Method::POST, &url)
                    .header(ACCEPT, "application/vnd.github+json")
                    .json(&serde_json::json!({
                        "body": body,
                        "event": event.as_api_str(),
                    })),
                "pull request review",
            )
            .await?
            .json::<PostedComment>()
            .await?;
        Ok(review)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(USER_AGENT, CLIENT_NAME)
            .header("X-GitHub-Api-Version", API_VERSION)
            .bearer_auth(&self.token)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, GitHubError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let rate_exhausted = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim() == "0");
        let body = response.text().await.unwrap_or_default();
        debug!(%status, what, "GitHub API error response");
        Err(classify_error(status, rate_exhausted, &body, what))
    }
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    async fn fetch(&self, reference: &PullRequestRef) -> Result<PullRequest, GitHubError> {
        self.fetch_pull_request(reference).await
    }
}

#[async_trait]
impl ReviewPublisher for GitHubClient {
    async fn publish(
        &self,
        reference: &PullRequestRef,
        review: &ReviewText,
    ) -> Result<Vec<PostedComment>, PublishError> {
        self.post_review_text(reference, review.as_str()).await
    }
}

/// Map a non-success GitHub response onto the error taxonomy.
fn classify_error(status: StatusCode, rate_exhausted: bool, body: &str, what: &str) -> GitHubError {
    let message = format!("{}: {}", what, error_message(body));
    match status.as_u16() {
        401 => GitHubError::Authentication(message),
        403 if rate_exhausted || message.to_lowercase().contains("rate limit") => {
            GitHubError::RateLimited(message)
        }
        403 => GitHubError::Authentication(message),
        404 => GitHubError::NotFound(message),
        429 => GitHubError::RateLimited(message),
        code => GitHubError::Api {
            status: code,
            message,
        },
    }
}

/// GitHub error bodies look like `{"message": "...", "documentation_url": "..."}`.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) => body.trim().chars().take(300).collect(),
    }
}

/// Split `text` into consecutive parts of at most `max_chars` characters,
/// preferring to cut after a newline. Concatenating the parts yields `text`.
///
/// GitHub rejects blank bodies, so a whitespace-only part is folded into its
/// neighbour; such a part may then exceed `max_chars` by that whitespace.
pub fn split_comment_body(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut bounds: Vec<(usize, usize)> = Vec::new();
    let mut offset = 0;

    while offset < text.len() {
        let rest = &text[offset..];
        let end = match rest.char_indices().nth(max_chars) {
            Some((limit, _)) => offset + rest[..limit].rfind('\n').map_or(limit, |newline| newline + 1),
            None => text.len(),
        };
        match bounds.last_mut() {
            Some(last) if text[offset..end].trim().is_empty() || text[last.0..last.1].trim().is_empty() => {
                last.1 = end;
            }
            _ => bounds.push((offset, end)),
        }
        offset = end;
    }

    bounds.into_iter().map(|(start, end)| &text[start..end]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const PULL_JSON: &str = r#"{
        "number": 42,
        "title": "Add OAuth2 login flow",
        "body": "Implements the login flow.",
        "state": "open",
        "user": {"login": "alice"},
        "head": {"ref": "feature/oauth", "sha": "abc123"},
        "base": {"ref": "main", "sha": "def456"},
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-02T10:00:00Z",
        "changed_files": 2,
        "additions": 3,
        "deletions": 1
    }"#;

    const PULL_DIFF: &str = "diff --git a/src/auth.rs b/src/auth.rs\nindex 1..2 100644\n--- a/src/auth.rs\n+++ b/src/auth.rs\n@@ -1,2 +1,3 @@\n fn login() {\n-    todo!()\n+    let token = fetch();\n+    store(token);\n }\ndiff --git a/old.txt b/old.txt\ndeleted file mode 100644\n--- a/old.txt\n+++ /dev/null\n@@ -1 +0,0 @@\n-bye\n";

    fn test_client(server: &mockito::Server) -> GitHubClient {
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        GitHubClient::with_http(http, &server.url(), "test-token")
    }

    fn reference() -> PullRequestRef {
        PullRequestRef::new("org", "repo", 42).unwrap()
    }

    #[test]
    fn test_parse_valid_pr_url() {
        let reference = parse_pr_url("https://github.com/org/repo/pull/42").unwrap();
        assert_eq!(reference.owner, "org");
        assert_eq!(reference.repo, "repo");
        assert_eq!(reference.number, 42);

        let reference = parse_pr_url("https://github.com/org/repo/pull/7/files").unwrap();
        assert_eq!(reference.number, 7);
    }

    #[test]
    fn test_parse_invalid_pr_url() {
        assert!(parse_pr_url("https://example.com").is_err());
        assert!(parse_pr_url("not-a-url").is_err());
        assert!(parse_pr_url("https://github.com/org/repo/pulls/42").is_err());
        assert!(parse_pr_url("https://github.com/org/repo/pull/0").is_err());
    }

    #[test]
    fn test_split_short_text_is_single_part() {
        assert_eq!(split_comment_body("short review", 100), vec!["short review"]);
        assert!(split_comment_body("", 100).is_empty());
    }

    #[test]
    fn test_split_prefers_line_boundaries() {
        let text = "line one\nline two\nline three\n";
        let parts = split_comment_body(text, 12);
        assert_eq!(parts, vec!["line one\n", "line two\n", "line three\n"]);
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn test_split_long_line_on_char_boundary() {
        let text = "ééééé";
        let parts = split_comment_body(text, 2);
        assert_eq!(parts, vec!["éé", "éé", "é"]);
        assert!(parts.iter().all(|p| p.chars().count() <= 2));
    }

    #[test]
    fn test_split_never_yields_blank_parts() {
        let parts = split_comment_body("aaaaaaaaa\n\n\n", 10);
        assert_eq!(parts, vec!["aaaaaaaaa\n\n\n"]);

        let text = "\n\n\n\n\n\n\n\n\n\n\nreview body\n";
        let parts = split_comment_body(text, 10);
        assert_eq!(parts.concat(), text);
        assert!(parts.iter().all(|p| !p.trim().is_empty()));
    }

    #[test]
    fn test_classify_error_statuses() {
        let body = r#"{"message": "Bad credentials"}"#;
        assert!(matches!(
            classify_error(StatusCode::UNAUTHORIZED, false, body, "x"),
            GitHubError::Authentication(m) if m.contains("Bad credentials")
        ));
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, true, "", "x"),
            GitHubError::RateLimited(_)
        ));
        assert!(matches!(
            classify_error(
                StatusCode::FORBIDDEN,
                false,
                r#"{"message": "API rate limit exceeded for user"}"#,
                "x"
            ),
            GitHubError::RateLimited(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, false, "", "x"),
            GitHubError::Authentication(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::NOT_FOUND, false, "", "x"),
            GitHubError::NotFound(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::TOO_MANY_REQUESTS, false, "", "x"),
            GitHubError::RateLimited(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::UNPROCESSABLE_ENTITY, false, "nope", "x"),
            GitHubError::Api { status: 422, message } if message == "x: nope"
        ));
    }

    #[tokio::test]
    async fn test_fetch_pull_request() {
        let mut server = mockito::Server::new_async().await;
        let metadata = server
            .mock("GET", "/repos/org/repo/pulls/42")
            .match_header("accept", "application/vnd.github+json")
            .match_header("authorization", "Bearer test-token")
            .match_header("x-github-api-version", API_VERSION)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PULL_JSON)
            .create_async()
            .await;
        let diff = server
            .mock("GET", "/repos/org/repo/pulls/42")
            .match_header("accept", "application/vnd.github.diff")
            .with_status(200)
            .with_body(PULL_DIFF)
            .create_async()
            .await;

        let pr = test_client(&server)
            .fetch_pull_request(&reference())
            .await
            .unwrap();

        metadata.assert_async().await;
        diff.assert_async().await;
        assert_eq!(pr.title, "Add OAuth2 login flow");
        assert_eq!(pr.body.as_deref(), Some("Implements the login flow."));
        assert_eq!(pr.author, "alice");
        assert_eq!(pr.head_ref, "feature/oauth");
        assert_eq!(pr.base_ref, "main");
        assert_eq!(pr.head_sha, "abc123");
        assert_eq!(pr.files.len(), 2);
        assert_eq!(pr.files[0].path, "src/auth.rs");
        assert_eq!(pr.files[0].additions, 2);
        assert_eq!(pr.files[1].status, FileStatus::Removed);
        assert!(pr.files.iter().all(|f| f.contents.is_none()));
    }

    #[tokio::test]
    async fn test_fetch_with_contents_skips_removed_files() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/org/repo/pulls/42")
            .match_header("accept", "application/vnd.github+json")
            .with_status(200)
            .with_body(PULL_JSON)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/org/repo/pulls/42")
            .match_header("accept", "application/vnd.github.diff")
            .with_status(200)
            .with_body(PULL_DIFF)
            .create_async()
            .await;
        let contents = server
            .mock("GET", "/repos/org/repo/contents/src/auth.rs")
            .match_query(Matcher::UrlEncoded("ref".into(), "abc123".into()))
            .match_header("accept", "application/vnd.github.raw")
            .with_status(200)
            .with_body("fn login() {}\n")
            .expect(1)
            .create_async()
            .await;

        let pr = test_client(&server)
            .include_contents(true)
            .fetch_pull_request(&reference())
            .await
            .unwrap();

        contents.assert_async().await;
        assert_eq!(pr.files[0].contents.as_deref(), Some("fn login() {}\n"));
        assert!(pr.files[1].contents.is_none());
    }

    #[tokio::test]
    async fn test_fetch_contents_failure_is_not_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/org/repo/pulls/42")
            .match_header("accept", "application/vnd.github+json")
            .with_status(200)
            .with_body(PULL_JSON)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/org/repo/pulls/42")
            .match_header("accept", "application/vnd.github.diff")
            .with_status(200)
            .with_body(PULL_DIFF)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/org/repo/contents/src/auth.rs")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let pr = test_client(&server)
            .include_contents(true)
            .fetch_pull_request(&reference())
            .await
            .unwrap();
        assert!(pr.files[0].contents.is_none());
    }

    #[tokio::test]
    async fn test_fetch_missing_repo_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/org/repo/pulls/42")
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .create_async()
            .await;

        let err = test_client(&server)
            .fetch_pull_request(&reference())
            .await
            .unwrap_err();
        assert!(matches!(err, GitHubError::NotFound(m) if m.contains("Not Found")));
    }

    #[tokio::test]
    async fn test_fetch_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/org/repo/pulls/42")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .with_body(r#"{"message": "API rate limit exceeded"}"#)
            .create_async()
            .await;

        let err = test_client(&server)
            .fetch_pull_request(&reference())
            .await
            .unwrap_err();
        assert!(matches!(err, GitHubError::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_post_review_text_as_comment() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/org/repo/issues/42/comments")
            .match_header("authorization", "Bearer test-token")
            .match_body(Matcher::Json(serde_json::json!({"body": "Looks good."})))
            .with_status(201)
            .with_body(r#"{"id": 1001, "html_url": "https://github.com/org/repo/pull/42#issuecomment-1001"}"#)
            .expect(1)
            .create_async()
            .await;

        let posted = test_client(&server)
            .post_review_text(&reference(), "Looks good.")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].id, 1001);
    }

    #[tokio::test]
    async fn test_post_long_review_in_parts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/org/repo/issues/42/comments")
            .with_status(201)
            .with_body(r#"{"id": 7, "html_url": ""}"#)
            .expect(3)
            .create_async()
            .await;

        let posted = test_client(&server)
            .publish_as(PublishMode::Comment, ReviewEvent::Comment, 10)
            .post_review_text(&reference(), "aaaaaaaa\nbbbbbbbb\ncccc")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(posted.len(), 3);
    }

    #[tokio::test]
    async fn test_post_review_text_as_review() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/org/repo/pulls/42/reviews")
            .match_body(Matcher::Json(serde_json::json!({
                "body": "Please fix the tests.",
                "event": "REQUEST_CHANGES",
            })))
            .with_status(200)
            .with_body(r#"{"id": 55, "html_url": "https://github.com/org/repo/pull/42#pullrequestreview-55", "state": "CHANGES_REQUESTED"}"#)
            .create_async()
            .await;

        let posted = test_client(&server)
            .publish_as(PublishMode::Review, ReviewEvent::RequestChanges, 1000)
            .post_review_text(&reference(), "Please fix the tests.")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(posted[0].id, 55);
    }

    #[tokio::test]
    async fn test_post_with_bad_token_is_authentication_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/repos/org/repo/issues/42/comments")
            .with_status(401)
            .with_body(r#"{"message": "Bad credentials"}"#)
            .create_async()
            .await;

        let err = test_client(&server)
            .post_review_text(&reference(), "text")
            .await
            .unwrap_err();
        assert!(matches!(err.source, GitHubError::Authentication(_)));
        assert!(err.posted.is_empty());
    }

    #[tokio::test]
    async fn test_post_empty_review_is_rejected() {
        let server = mockito::Server::new_async().await;
        let err = test_client(&server)
            .post_review_text(&reference(), "  \n")
            .await
            .unwrap_err();
        assert!(matches!(err.source, GitHubError::EmptyReview));
    }

    #[tokio::test]
    async fn test_split_review_carries_event_on_last_part_only() {
        let mut server = mockito::Server::new_async().await;
        let comments = server
            .mock("POST", "/repos/org/repo/pulls/42/reviews")
            .match_body(Matcher::PartialJson(serde_json::json!({"event": "COMMENT"})))
            .with_status(200)
            .with_body(r#"{"id": 1, "html_url": ""}"#)
            .expect(2)
            .create_async()
            .await;
        let approval = server
            .mock("POST", "/repos/org/repo/pulls/42/reviews")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "body": "cccc",
                "event": "APPROVE",
            })))
            .with_status(200)
            .with_body(r#"{"id": 2, "html_url": ""}"#)
            .expect(1)
            .create_async()
            .await;

        let posted = test_client(&server)
            .publish_as(PublishMode::Review, ReviewEvent::Approve, 10)
            .post_review_text(&reference(), "aaaaaaaa\nbbbbbbbb\ncccc")
            .await
            .unwrap();

        comments.assert_async().await;
        approval.assert_async().await;
        assert_eq!(posted.len(), 3);
        assert_eq!(posted[2].id, 2);
    }

    #[tokio::test]
    async fn test_failed_part_reports_parts_already_posted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/repos/org/repo/issues/42/comments")
            .match_body(Matcher::Json(serde_json::json!({"body": "aaaaaaaa\n"})))
            .with_status(201)
            .with_body(r#"{"id": 11, "html_url": "https://github.com/org/repo/pull/42#issuecomment-11"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/repos/org/repo/issues/42/comments")
            .match_body(Matcher::Json(serde_json::json!({"body": "bbbb"})))
            .with_status(500)
            .with_body(r#"{"message": "Server Error"}"#)
            .create_async()
            .await;

        let err = test_client(&server)
            .publish_as(PublishMode::Comment, ReviewEvent::Comment, 10)
            .post_review_text(&reference(), "aaaaaaaa\nbbbb")
            .await
            .unwrap_err();

        assert!(matches!(err.source, GitHubError::Api { status: 500, .. }));
        assert_eq!(err.posted.len(), 1);
        assert_eq!(err.posted[0].id, 11);
    }

    #[tokio::test]
    async fn test_fetch_with_contents_skips_binary_and_non_utf8_files() {
        let diff = "diff --git a/logo.png b/logo.png\nnew file mode 100644\nindex 0000000..1234567\nBinary files /dev/null and b/logo.png differ\ndiff --git a/data.txt b/data.txt\nindex 1..2 100644\n--- a/data.txt\n+++ b/data.txt\n@@ -1 +1 @@\n-old\n+new\n";
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/org/repo/pulls/42")
            .match_header("accept", "application/vnd.github+json")
            .with_status(200)
            .with_body(PULL_JSON)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/org/repo/pulls/42")
            .match_header("accept", "application/vnd.github.diff")
            .with_status(200)
            .with_body(diff)
            .create_async()
            .await;
        let image = server
            .mock("GET", "/repos/org/repo/contents/logo.png")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(b"\x89PNG\r\n\x1a\n".to_vec())
            .expect(0)
            .create_async()
            .await;
        let latin1 = server
            .mock("GET", "/repos/org/repo/contents/data.txt")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(vec![b'c', b'a', b'f', 0xe9])
            .expect(1)
            .create_async()
            .await;

        let pr = test_client(&server)
            .include_contents(true)
            .fetch_pull_request(&reference())
            .await
            .unwrap();

        image.assert_async().await;
        latin1.assert_async().await;
        assert!(pr.files[0].binary);
        assert!(pr.files.iter().all(|f| f.contents.is_none()));
    }

    #[tokio::test]
    async fn test_fetch_file_contents_rejects_invalid_utf8() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/org/repo/contents/bin/blob")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(vec![0xff, 0xfe, 0x00])
            .create_async()
            .await;

        let err = test_client(&server)
            .fetch_file_contents(&reference(), "bin/blob", "abc123")
            .await
            .unwrap_err();
        assert!(matches!(err, GitHubError::NotText(path) if path == "bin/blob"));
    }
}
