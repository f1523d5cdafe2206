//! `tapbump verify`: syntax-check the manifests as they are on disk.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::CommandContext;

#[derive(Args, Debug)]
pub struct VerifyCommand {}

impl VerifyCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        ctx.pipeline()?.verify_manifests().await?;
        ctx.progress(format!("{} cask and formula are valid", "✓".green()));
        Ok(())
    }
}
