mod config;
mod github;
mod pipeline;
mod report;
mod review;

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use github::{GitHubClient, PublishMode, PullRequestRef, ReviewEvent, ReviewPublisher};
use pipeline::RunError;
use review::GeminiGenerator;

/// PR Reviewer — fetches a GitHub Pull Request, asks a Gemini model to
/// review its diff, and posts the model's answer back as a PR comment.
#[derive(Parser, Debug)]
#[command(name = "pr-reviewer", version, about)]
struct Cli {
    /// Repository owner (user or organisation)
    #[arg(long, required_unless_present = "url", conflicts_with = "url")]
    owner: Option<String>,

    /// Repository name
    #[arg(long, required_unless_present = "url", conflicts_with = "url")]
    repo: Option<String>,

    /// Pull request number
    #[arg(
        long = "pr",
        required_unless_present = "url",
        conflicts_with = "url",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    number: Option<u64>,

    /// Pull request URL instead of --owner/--repo/--pr
    /// (e.g., https://github.com/org/repo/pull/42)
    #[arg(long)]
    url: Option<String>,

    /// Config file (defaults to ./.pr-reviewer.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model identifier, overriding GEMINI_MODEL and the config file
    #[arg(long)]
    model: Option<String>,

    /// Generate and print the review without posting it
    #[arg(long)]
    dry_run: bool,

    /// Post as a plain comment or as a pull request review
    #[arg(long, value_enum)]
    mode: Option<PublishMode>,

    /// Review event used with --mode review
    #[arg(long, value_enum)]
    event: Option<ReviewEvent>,

    /// Also send the head version of every changed file to the model
    #[arg(long)]
    include_contents: bool,

    /// Optional output file path for a markdown run report
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Cli {
    fn reference(&self) -> Result<PullRequestRef, github::GitHubError> {
        if let Some(url) = &self.url {
            return github::parse_pr_url(url);
        }
        // clap guarantees all three are present when --url is absent.
        PullRequestRef::new(
            self.owner.as_deref().unwrap_or_default(),
            self.repo.as_deref().unwrap_or_default(),
            self.number.unwrap_or_default(),
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let RunError::Publish { review, posted, .. } = &err {
                report::print_failed_publish(review.as_str(), posted);
            }
            eprintln!("{} {}", "error:".red().bold(), err);
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), RunError> {
    let reference = cli.reference().map_err(RunError::Setup)?;

    info!("loading configuration");
    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(model) = &cli.model {
        config.model.name = Some(model.clone());
    }
    if let Some(mode) = cli.mode {
        config.publish.mode = mode;
    }
    if let Some(event) = cli.event {
        config.publish.event = event;
    }
    config.review.include_file_contents |= cli.include_contents;
    debug!(
        model = config.model_name(),
        mode = ?config.publish.mode,
        include_contents = config.review.include_file_contents,
        "resolved configuration"
    );

    let github = GitHubClient::new(&config, config.github_token()?).map_err(RunError::Setup)?;
    let generator = GeminiGenerator::new(&config, config.api_key()?)?;
    let publisher: Option<&dyn ReviewPublisher> = if cli.dry_run { None } else { Some(&github) };

    let outcome = pipeline::run(&github, &generator, publisher, &reference)
        .instrument(info_span!("pr_review", pr = %reference))
        .await?;

    let built_report = report::build(&outcome, cli.dry_run);
    report::output(&built_report, cli.output.as_deref())?;
    info!(comments = built_report.posted.len(), "done");

    Ok(())
}
