use crate::github::PullRequest;

/// Fixed instruction sent as the system instruction of every request.
pub const REVIEW_INSTRUCTIONS: &str = "\
You are an experienced software engineer reviewing a GitHub pull request.

Review the changes below and write a review in GitHub-flavoured markdown:
- Start with a short summary of what the pull request does.
- List concrete problems: bugs, security issues, missing error handling, \
performance pitfalls, and unclear or untested logic. Name the file and, \
where possible, the line for each one.
- Suggest specific improvements where they matter; skip nitpicks about \
formatting.
- End with an overall assessment.

Only comment on code that appears in the diff. If the changes look good, \
say so briefly.";

/// Build the user prompt: PR metadata followed by every changed file's diff
/// (and head contents when they were fetched). An empty file list still
/// produces a prompt.
pub fn build_prompt(pr: &PullRequest) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("Pull request: {}\n", pr.reference));
    prompt.push_str(&format!("Title: {}\n", pr.title));
    prompt.push_str(&format!("Author: {}\n", pr.author));
    prompt.push_str(&format!("Branches: {} -> {}\n", pr.head_ref, pr.base_ref));
    prompt.push_str(&format!(
        "State: {} | Opened: {} | Updated: {}\n",
        pr.state, pr.created_at, pr.updated_at
    ));
    prompt.push_str(&format!(
        "Files changed: {} | +{} -{}\n\n",
        pr.files.len(),
        pr.additions,
        pr.deletions
    ));

    prompt.push_str("Description:\n");
    match pr.body.as_deref().map(str::trim) {
        Some(body) if !body.is_empty() => prompt.push_str(body),
        _ => prompt.push_str("(no description provided)"),
    }
    prompt.push_str("\n\n");

    if pr.files.is_empty() {
        prompt.push_str("This pull request has no file changes.\n");
        return prompt;
    }

    prompt.push_str("Changes:\n\n");
    for file in &pr.files {
        prompt.push_str(&format!(
            "### {} ({}, +{} -{})\n\n```diff\n{}",
            file.path, file.status, file.additions, file.deletions, file.diff
        ));
        if !file.diff.ends_with('\n') {
            prompt.push('\n');
        }
        prompt.push_str("```\n\n");

        if let Some(contents) = &file.contents {
            prompt.push_str(&format!("Full contents of {} after the change:\n\n```\n{}", file.path, contents));
            if !contents.ends_with('\n') {
                prompt.push('\n');
            }
            prompt.push_str("```\n\n");
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::fixtures::{test_changed_file, test_pull_request};

    #[test]
    fn test_prompt_contains_metadata_and_diffs() {
        let mut pr = test_pull_request();
        pr.files = vec![
            test_changed_file("src/auth.rs", "+let token = fetch();\n"),
            test_changed_file("README.md", "+docs"),
        ];

        let prompt = build_prompt(&pr);
        assert!(prompt.contains("Pull request: google/adk-samples#42"));
        assert!(prompt.contains("Title: Add OAuth2 login flow"));
        assert!(prompt.contains("Author: alice"));
        assert!(prompt.contains("Branches: feature/oauth -> main"));
        assert!(prompt.contains("State: open | Opened: 2024-05-01T10:00:00Z"));
        assert!(prompt.contains("### src/auth.rs (modified, +1 -0)"));
        assert!(prompt.contains("+let token = fetch();\n```"));
        assert!(prompt.contains("+docs\n```"));
        assert!(prompt.find("src/auth.rs").unwrap() < prompt.find("README.md").unwrap());
    }

    #[test]
    fn test_prompt_with_no_files() {
        let pr = test_pull_request();
        let prompt = build_prompt(&pr);
        assert!(prompt.contains("Files changed: 0"));
        assert!(prompt.contains("no file changes"));
        assert!(!prompt.contains("```diff"));
    }

    #[test]
    fn test_prompt_without_description() {
        let mut pr = test_pull_request();
        pr.body = Some("   ".to_string());
        assert!(build_prompt(&pr).contains("(no description provided)"));
        pr.body = None;
        assert!(build_prompt(&pr).contains("(no description provided)"));
    }

    #[test]
    fn test_prompt_includes_contents_when_present() {
        let mut pr = test_pull_request();
        let mut file = test_changed_file("src/lib.rs", "+pub fn a() {}\n");
        file.contents = Some("pub fn a() {}".to_string());
        pr.files = vec![file];
        let prompt = build_prompt(&pr);
        assert!(prompt.contains("Full contents of src/lib.rs after the change:"));
        assert!(prompt.contains("pub fn a() {}\n```"));
    }

    #[test]
    fn test_instructions_are_fixed() {
        assert!(REVIEW_INSTRUCTIONS.contains("GitHub pull request"));
        assert!(REVIEW_INSTRUCTIONS.contains("overall assessment"));
    }
}
