use thiserror::Error;
use tracing::{info, info_span, Instrument};

use crate::config::ConfigError;
use crate::github::{
    GitHubError, PostedComment, PublishError, PullRequest, PullRequestRef, PullRequestSource,
    ReviewPublisher,
};
use crate::report::ReportError;
use crate::review::{ModelError, ReviewGenerator, ReviewText};

/// Coarse failure category; decides the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Authentication,
    NotFound,
    RateLimit,
    Model,
    Other,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Other => 1,
            ErrorKind::Config => 2,
            ErrorKind::Authentication => 3,
            ErrorKind::NotFound => 4,
            ErrorKind::RateLimit => 5,
            ErrorKind::Model => 6,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Fetching the pull request failed: {0}")]
    Fetch(#[source] GitHubError),

    #[error("Generating the review failed: {0}")]
    Generate(#[from] ModelError),

    /// Carries the generated review, and whatever parts of it were already
    /// posted, so neither is lost.
    #[error("Publishing the review failed: {source}")]
    Publish {
        #[source]
        source: GitHubError,
        review: ReviewText,
        posted: Vec<PostedComment>,
    },

    #[error(transparent)]
    Report(#[from] ReportError),

    /// Client construction or argument errors before any request is made.
    #[error(transparent)]
    Setup(GitHubError),
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunError::Config(_) => ErrorKind::Config,
            RunError::Fetch(err) | RunError::Publish { source: err, .. } | RunError::Setup(err) => {
                github_kind(err)
            }
            RunError::Generate(ModelError::Authentication(_)) => ErrorKind::Authentication,
            RunError::Generate(_) => ErrorKind::Model,
            RunError::Report(_) => ErrorKind::Other,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }
}

fn github_kind(err: &GitHubError) -> ErrorKind {
    match err {
        GitHubError::Authentication(_) => ErrorKind::Authentication,
        GitHubError::NotFound(_) => ErrorKind::NotFound,
        GitHubError::RateLimited(_) => ErrorKind::RateLimit,
        GitHubError::InvalidUrl(_) | GitHubError::InvalidReference(_) => ErrorKind::Config,
        _ => ErrorKind::Other,
    }
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub pull_request: PullRequest,
    pub model: String,
    pub review: ReviewText,
    /// Empty when publishing was skipped.
    pub posted: Vec<PostedComment>,
}

/// fetch → generate → publish, stopping at the first failure.
///
/// `publisher` is None for dry runs. The publisher, when present, is called
/// exactly once with the generator's text.
pub async fn run(
    source: &dyn PullRequestSource,
    generator: &dyn ReviewGenerator,
    publisher: Option<&dyn ReviewPublisher>,
    reference: &PullRequestRef,
) -> Result<RunOutcome, RunError> {
    info!(pr = %reference, "fetching pull request");
    let pull_request = source
        .fetch(reference)
        .instrument(info_span!("fetch", pr = %reference))
        .await
        .map_err(RunError::Fetch)?;
    info!(
        files = pull_request.files.len(),
        additions = pull_request.additions,
        deletions = pull_request.deletions,
        "fetched pull request"
    );

    info!(model = generator.model(), "generating review");
    let review = generator
        .generate_review(&pull_request)
        .instrument(info_span!("generate", model = generator.model()))
        .await?;
    info!(chars = review.as_str().len(), "review generated");

    let posted = match publisher {
        Some(publisher) => {
            info!("publishing review");
            match publisher
                .publish(reference, &review)
                .instrument(info_span!("publish", pr = %reference))
                .await
            {
                Ok(posted) => posted,
                Err(PublishError { source, posted }) => {
                    return Err(RunError::Publish {
                        source,
                        review,
                        posted,
                    })
                }
            }
        }
        None => {
            info!("dry run, review not published");
            Vec::new()
        }
    };

    Ok(RunOutcome {
        pull_request,
        model: generator.model().to_string(),
        review,
        posted,
    })
}
