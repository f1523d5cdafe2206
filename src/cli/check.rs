//! `tapbump check`: compare the tap with the vendor without writing.

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;

use super::CommandContext;
use crate::pipeline::CheckReport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl CheckCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let report = ctx.pipeline()?.check().await?;

        match self.format {
            // JSON is the command's result, so it is printed even with --quiet.
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Text => {
                for line in render_text(&report) {
                    ctx.progress(line);
                }
            }
        }
        Ok(())
    }
}

fn render_text(report: &CheckReport) -> Vec<String> {
    let or_none = |v: &Option<String>| v.clone().unwrap_or_else(|| "(none)".to_string());
    let status = if report.up_to_date {
        "already at latest version".green()
    } else {
        "update available".yellow()
    };

    vec![
        format!("Latest build: {}", report.latest.version().bold()),
        format!("Cask:         {}", or_none(&report.cask)),
        format!("Formula:      {}", or_none(&report.formula)),
        format!("Status:       {status}"),
    ]
}
