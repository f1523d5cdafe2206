//! `tapbump update`: run the pipeline and report what it did.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::CommandContext;
use crate::pipeline::{Outcome, RunOptions, RunSummary};
use crate::publish::{GhCliOpener, PullRequest, PullRequestOpener, write_github_output};

#[derive(Args, Debug)]
pub struct UpdateCommand {
    /// Rewrite the manifests even if they already declare the latest build
    #[arg(long)]
    pub force: bool,

    /// Fetch and validate, show what would change, write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Open a pull request with the change after a verified update
    #[arg(long, conflicts_with = "dry_run")]
    pub open_pr: bool,

    /// Append `updated`, `previous` and `version` lines for GitHub Actions
    #[arg(long, value_name = "FILE", env = "GITHUB_OUTPUT")]
    pub github_output: Option<PathBuf>,
}

impl UpdateCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let pipeline = ctx.pipeline()?;
        ctx.progress("Checking for a new early-access build...".cyan());

        let summary = pipeline
            .run(RunOptions {
                force: self.force,
                dry_run: self.dry_run,
            })
            .await?;

        print_summary(ctx, &summary);

        if let Some(path) = &self.github_output {
            write_github_output(path, &summary)
                .await
                .with_context(|| format!("Failed to write GitHub output to {}", path.display()))?;
        }

        if self.open_pr && summary.is_updated() {
            let request = PullRequest::for_summary(&summary, &ctx.config.pull_request)?;
            let opener = GhCliOpener::new(&ctx.repo, &ctx.config.pull_request.remote);
            let url = opener.open(&request).await.context("Failed to open the pull request")?;
            ctx.progress(format!("{} {url}", "Opened".green()));
        }

        Ok(())
    }
}

fn print_summary(ctx: &CommandContext, summary: &RunSummary) {
    let previous = summary.previous.as_deref().unwrap_or("(none)");
    match summary.outcome {
        Outcome::UpToDate => {
            ctx.progress(format!(
                "{} already at latest version ({})",
                "✓".green(),
                summary.version.bold()
            ));
            return;
        }
        Outcome::Updated => ctx.progress(format!(
            "{} Updated {previous} → {}",
            "✓".green(),
            summary.version.bold()
        )),
        Outcome::Planned => ctx.progress(format!(
            "{} Would update {previous} → {} (dry run)",
            "•".yellow(),
            summary.version.bold()
        )),
    }

    for artifact in &summary.artifacts {
        ctx.progress(format!("  {:<12} {}", artifact.platform.name(), artifact.sha256));
    }
    for file in &summary.changed_files {
        ctx.progress(format!("  {} {}", "changed".dimmed(), file.display()));
    }
}
