use crate::github::PostedComment;

/// Summary of a finished run, printed to the terminal or written as markdown.
#[derive(Debug)]
pub struct Report {
    /// "owner/repo#number"
    pub pr: String,
    pub pr_title: String,
    pub author: String,
    pub files_changed: usize,
    pub additions: usize,
    pub deletions: usize,
    /// Model that wrote the review
    pub model: String,
    /// Review text as generated
    pub review: String,
    /// Comments created on GitHub; empty for dry runs
    pub posted: Vec<PostedComment>,
    pub dry_run: bool,
}

impl Report {
    pub fn status_line(&self) -> String {
        if self.dry_run {
            "Dry run: review not published".to_string()
        } else {
            match self.posted.len() {
                1 => "Published 1 comment".to_string(),
                n => format!("Published {} comments", n),
            }
        }
    }
}
