use serde::Deserialize;

use super::GitHubError;

/// Identifies the pull request a run operates on.
///
/// Built once from the command line and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequestRef {
    /// Validate and build a reference. Owner and repo must be single,
    /// non-empty path segments and the number must be positive.
    pub fn new(owner: &str, repo: &str, number: u64) -> Result<Self, GitHubError> {
        let owner = owner.trim();
        let repo = repo.trim();
        for (label, value) in [("owner", owner), ("repo", repo)] {
            if value.is_empty() {
                return Err(GitHubError::InvalidReference(format!("{} must not be empty", label)));
            }
            if value.contains('/') || value.chars().any(char::is_whitespace) {
                return Err(GitHubError::InvalidReference(format!(
                    "{} '{}' is not a single path segment",
                    label, value
                )));
            }
        }
        if number == 0 {
            return Err(GitHubError::InvalidReference(
                "pull request number must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        })
    }
}

impl std::fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Metadata and changed files of a pull request.
///
/// Not Deserialize: assembled from the metadata JSON, the raw diff and
/// (optionally) per-file contents.
#[derive(Debug, Clone)]
pub struct PullRequest {
    pub reference: PullRequestRef,
    pub title: String,
    /// PR description; GitHub returns null when empty
    pub body: Option<String>,
    /// "open" or "closed"
    pub state: String,
    /// Author's GitHub login
    pub author: String,
    pub head_ref: String,
    pub base_ref: String,
    pub head_sha: String,
    pub created_at: String,
    pub updated_at: String,
    /// Total lines added, as reported by GitHub
    pub additions: usize,
    /// Total lines deleted, as reported by GitHub
    pub deletions: usize,
    /// Changed files in diff order
    pub files: Vec<ChangedFile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStatus::Added => write!(f, "added"),
            FileStatus::Modified => write!(f, "modified"),
            FileStatus::Removed => write!(f, "removed"),
        }
    }
}

/// A single file within the PR diff.
#[derive(Debug, Clone)]
pub struct ChangedFile {
    /// File path on the head side (e.g., "src/auth/config.rs")
    pub path: String,
    pub status: FileStatus,
    pub additions: usize,
    pub deletions: usize,
    /// This file's section of the unified diff, headers included
    pub diff: String,
    /// Git reported a binary change; no text contents exist for it
    pub binary: bool,
    /// Head revision of the file, only when content fetching is enabled
    pub contents: Option<String>,
}

/// How the review text is published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PublishMode {
    /// Plain conversation comment on the PR
    #[default]
    Comment,
    /// Pull request review carrying a review event
    Review,
}

/// Review event sent with review-mode publishing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewEvent {
    #[default]
    Comment,
    Approve,
    RequestChanges,
}

impl ReviewEvent {
    /// Value of the `event` field in the GitHub reviews API.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            ReviewEvent::Comment => "COMMENT",
            ReviewEvent::Approve => "APPROVE",
            ReviewEvent::RequestChanges => "REQUEST_CHANGES",
        }
    }
}

/// A comment or review created on GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostedComment {
    pub id: u64,
    #[serde(default)]
    pub html_url: String,
}
