//! Handing a verified update to the outside world.
//!
//! Two consumers care about a finished run. CI reads key/value lines from
//! the file named by `GITHUB_OUTPUT` ([`write_github_output`]); reviewers get
//! a pull request opened by a [`PullRequestOpener`]. The production opener
//! drives `git` and `gh` through [`ExternalCommand`].

use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::command::ExternalCommand;
use crate::config::PullRequestConfig;
use crate::core::TapError;
use crate::pipeline::RunSummary;

const BODY_TEMPLATE: &str = "\
Bumps the OpenJDK early-access cask and formula from `{{ previous }}` to `{{ version }}` (build {{ build_number }}).

| Platform | SHA-256 |
| --- | --- |
{% for artifact in artifacts %}| {{ artifact.platform }} | `{{ artifact.sha256 }}` |
{% endfor %}
Checksums were taken from the vendor's published `.sha256` files and both manifests passed verification.
";

/// Everything needed to open one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub branch: String,
    pub base: String,
    pub title: String,
    pub body: String,
    pub label: Option<String>,
    pub files: Vec<PathBuf>,
}

impl PullRequest {
    /// Describe the change made by a verified run.
    pub fn for_summary(summary: &RunSummary, config: &PullRequestConfig) -> Result<Self, TapError> {
        Ok(Self {
            branch: format!("bump/jdk-{}", summary.version),
            base: config.base_branch.clone(),
            title: format!("openjdk@ea {}", summary.version),
            body: render_body(summary)?,
            label: config.label.clone(),
            files: summary.changed_files.clone(),
        })
    }
}

/// Render the pull request description for `summary`.
pub fn render_body(summary: &RunSummary) -> Result<String, TapError> {
    let mut context = TeraContext::new();
    context.insert("previous", summary.previous.as_deref().unwrap_or("(none)"));
    context.insert("version", &summary.version);
    context.insert("build_number", &summary.build_number);
    context.insert("artifacts", &summary.artifacts);

    let mut tera = Tera::default();
    tera.render_str(BODY_TEMPLATE, &context).map_err(|e| TapError::Other {
        message: format!("failed to render pull request body: {e}"),
    })
}

/// Publishes a change for review.
#[allow(async_fn_in_trait)]
pub trait PullRequestOpener {
    /// Open the pull request and return its URL.
    async fn open(&self, request: &PullRequest) -> Result<String, TapError>;
}

/// Opens pull requests with `git` and the GitHub CLI.
#[derive(Debug, Clone)]
pub struct GhCliOpener {
    repo: PathBuf,
    remote: String,
}

impl GhCliOpener {
    pub fn new(repo: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            remote: remote.into(),
        }
    }

    /// Commands run by [`PullRequestOpener::open`], in order.
    #[must_use]
    pub fn commands(&self, request: &PullRequest) -> Vec<ExternalCommand> {
        let git = || ExternalCommand::new("git").current_dir(&self.repo);
        let files = request.files.iter().map(|f| {
            f.strip_prefix(&self.repo).unwrap_or(f).to_string_lossy().into_owned()
        });

        let mut create = ExternalCommand::new("gh").current_dir(&self.repo).args([
            "pr",
            "create",
            "--base",
            request.base.as_str(),
            "--head",
            request.branch.as_str(),
            "--title",
            request.title.as_str(),
            "--body",
            request.body.as_str(),
        ]);
        if let Some(label) = &request.label {
            create = create.args(["--label", label.as_str()]);
        }

        vec![
            git().args(["checkout", "-B", request.branch.as_str()]),
            git().args(["add", "--"]).args(files),
            git().args(["commit", "-m", request.title.as_str()]),
            git().args(["push", "--force-with-lease", "-u", self.remote.as_str(), request.branch.as_str()]),
            create,
        ]
    }
}

impl PullRequestOpener for GhCliOpener {
    async fn open(&self, request: &PullRequest) -> Result<String, TapError> {
        if request.files.is_empty() {
            return Err(TapError::Other {
                message: "no changed files to propose".to_string(),
            });
        }

        let mut last = String::new();
        for command in self.commands(request) {
            debug!("Running {}", command.display());
            last = command.execute().await?.stdout;
        }

        let url = last.trim().to_string();
        info!("Opened pull request {url}");
        Ok(url)
    }
}

/// Append `updated`, `previous` and `version` to a GitHub Actions output file.
pub async fn write_github_output(path: &Path, summary: &RunSummary) -> Result<(), TapError> {
    let lines = format!(
        "updated={}\nprevious={}\nversion={}\n",
        summary.is_updated(),
        summary.previous.as_deref().unwrap_or_default(),
        summary.version,
    );

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|_| TapError::FileSystem {
            operation: "open GitHub output file".to_string(),
            path: path.display().to_string(),
        })?;
    file.write_all(lines.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
