//! Pull request values shared by unit tests across modules.

use super::types::{ChangedFile, FileStatus, PullRequest, PullRequestRef};

/// Minimal PullRequest with no changed files.
pub fn test_pull_request() -> PullRequest {
    PullRequest {
        reference: PullRequestRef::new("google", "adk-samples", 42).unwrap(),
        title: "Add OAuth2 login flow".to_string(),
        body: Some("Implements the OAuth2 login flow.".to_string()),
        state: "open".to_string(),
        author: "alice".to_string(),
        head_ref: "feature/oauth".to_string(),
        base_ref: "main".to_string(),
        head_sha: "abc123".to_string(),
        created_at: "2024-05-01T10:00:00Z".to_string(),
        updated_at: "2024-05-02T10:00:00Z".to_string(),
        additions: 0,
        deletions: 0,
        files: vec![],
    }
}

/// Modified file whose diff body is `lines`, counted the way the parser would.
pub fn test_changed_file(path: &str, lines: &str) -> ChangedFile {
    ChangedFile {
        path: path.to_string(),
        status: FileStatus::Modified,
        additions: lines.lines().filter(|l| l.starts_with('+')).count(),
        deletions: lines.lines().filter(|l| l.starts_with('-')).count(),
        diff: lines.to_string(),
        binary: false,
        contents: None,
    }
}
