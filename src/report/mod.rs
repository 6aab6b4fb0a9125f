pub mod types;

pub use types::Report;

use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::github::PostedComment;
use crate::pipeline::RunOutcome;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Build a Report from a finished run.
pub fn build(outcome: &RunOutcome, dry_run: bool) -> Report {
    let pr = &outcome.pull_request;
    Report {
        pr: pr.reference.to_string(),
        pr_title: pr.title.clone(),
        author: pr.author.clone(),
        files_changed: pr.files.len(),
        additions: pr.additions,
        deletions: pr.deletions,
        model: outcome.model.clone(),
        review: outcome.review.as_str().to_string(),
        posted: outcome.posted.clone(),
        dry_run,
    }
}

/// Output the report to the terminal, and additionally as markdown when a
/// path is given.
#[instrument(skip(report), fields(pr = %report.pr))]
pub fn output(report: &Report, output_path: Option<&Path>) -> Result<(), ReportError> {
    print_terminal_report(report);
    if let Some(path) = output_path {
        debug!(path = %path.display(), "writing report to file");
        write_markdown_report(report, path)?;
    }
    Ok(())
}

/// Print the review text a failed publish would otherwise lose, after the
/// parts that did make it onto the pull request.
pub fn print_failed_publish(review: &str, posted: &[PostedComment]) {
    eprintln!();
    if !posted.is_empty() {
        eprintln!(
            "{}",
            format!("═══ Posted {} part(s) before the failure ═══", posted.len()).yellow().bold()
        );
        for comment in posted {
            if comment.html_url.is_empty() {
                eprintln!("  • comment {}", comment.id);
            } else {
                eprintln!("  • {}", comment.html_url);
            }
        }
    }
    eprintln!("{}", "═══ Unpublished review ═══".yellow().bold());
    eprintln!("{}", review);
    eprintln!("{}", "═══════════════════════════".yellow().bold());
}

/// PR google/adk-samples#42: "Add OAuth2 login flow"
/// Author: alice | Files changed: 7 | +320 -45 | Model: gemini-2.0-flash
///
/// ═══ Review ═══
/// ...
///
/// ═══ Published 1 comment ═══
///   • https://github.com/...
fn print_terminal_report(report: &Report) {
    println!();
    println!("PR {}: \"{}\"", report.pr.bold(), report.pr_title);
    println!(
        "Author: {} | Files changed: {} | {} {} | Model: {}",
        report.author,
        report.files_changed,
        format!("+{}", report.additions).green(),
        format!("-{}", report.deletions).red(),
        report.model
    );
    println!();

    println!("{}", "═══ Review ═══".cyan().bold());
    println!("{}", report.review.trim_end());
    println!();

    let status = format!("═══ {} ═══", report.status_line());
    if report.dry_run {
        println!("{}", status.yellow().bold());
    } else {
        println!("{}", status.green().bold());
        for comment in &report.posted {
            if comment.html_url.is_empty() {
                println!("  • comment {}", comment.id);
            } else {
                println!("  • {}", comment.html_url);
            }
        }
    }
    println!();
}

/// # Review of google/adk-samples#42: "Add OAuth2 login flow"
/// **Author:** alice | **Files changed:** 7 | **+320 -45** | **Model:** gemini-2.0-flash
///
/// ## Review
/// ...
///
/// ## Published
/// - https://github.com/...
fn write_markdown_report(report: &Report, path: &Path) -> Result<(), ReportError> {
    let mut md = String::new();
    md.push_str(&format!("# Review of {}: \"{}\"\n\n", report.pr, report.pr_title));
    md.push_str(&format!(
        "**Author:** {} | **Files changed:** {} | **+{} -{}** | **Model:** {}\n\n",
        report.author, report.files_changed, report.additions, report.deletions, report.model
    ));

    md.push_str("## Review\n\n");
    md.push_str(report.review.trim_end());
    md.push_str("\n\n");

    md.push_str("## Published\n\n");
    if report.posted.is_empty() {
        md.push_str(&format!("{}.\n", report.status_line()));
    } else {
        for comment in &report.posted {
            md.push_str(&format!("- {} (id {})\n", comment.html_url, comment.id));
        }
    }

    std::fs::write(path, md)?;
    Ok(())
}
