//! Command-line surface: flags for scripted use, dialoguer prompts for the
//! interactive path. Every input can come from either; an explicit empty
//! string for the optional ones means "skip", matching the prompt
//! semantics.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input};

use crate::api::RestWorkspaceClient;
use crate::config::{CloudProvider, Settings};
use crate::sync::{self, SyncRequest};

#[derive(Parser, Debug)]
#[command(
    name = "nbsync",
    version,
    about = "Sync notebooks and their permissions between cloud workspaces"
)]
pub struct Cli {
    /// Source cloud provider (AWS, AZURE or GCP); prompted when omitted
    #[arg(long)]
    pub source: Option<String>,

    /// Target cloud provider (AWS, AZURE or GCP); prompted when omitted
    #[arg(long)]
    pub target: Option<String>,

    /// Git repository cloned into the notebook directory before syncing;
    /// empty to skip
    #[arg(long)]
    pub git_url: Option<String>,

    /// Cluster id for an additional CAN_ATTACH_TO grant; empty to skip
    #[arg(long)]
    pub cluster_id: Option<String>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env();
    let theme = ColorfulTheme::default();

    let source_name = required_input(cli.source, "Enter source cloud provider (AWS/AZURE/GCP)", &theme)?;
    let target_name = required_input(cli.target, "Enter target cloud provider (AWS/AZURE/GCP)", &theme)?;
    let git_url = optional_input(cli.git_url, "Enter Git repository URL (optional)", &theme)?;
    let cluster_id = optional_input(
        cli.cluster_id,
        "Enter cluster ID for attach permissions (optional)",
        &theme,
    )?;

    let (source, target) = match (parse_provider(&source_name), parse_provider(&target_name)) {
        (Ok(source), Ok(target)) => (source, target),
        (Err(err), _) | (_, Err(err)) => {
            println!("{}", "Invalid source or target cloud provider.".red());
            return Err(err.into());
        }
    };

    for provider in [source, target] {
        if !settings.workspace(provider).is_configured() {
            tracing::warn!(
                provider = %provider,
                "workspace URL or token not configured; its API calls will fail"
            );
        }
    }

    let source_api = RestWorkspaceClient::new(source.to_string(), settings.workspace(source))?;
    let target_api = RestWorkspaceClient::new(target.to_string(), settings.workspace(target))?;

    let request = SyncRequest {
        source,
        target,
        git_url,
        cluster_id,
    };
    let outcome = sync::run_sync(&source_api, &target_api, &settings.notebook_dir, &request)?;
    tracing::debug!(?outcome, "run complete");
    Ok(())
}

fn parse_provider(name: &str) -> Result<CloudProvider, crate::config::ConfigError> {
    name.parse()
}

/// Flag value if present, otherwise an interactive prompt.
fn required_input(value: Option<String>, prompt: &str, theme: &ColorfulTheme) -> Result<String> {
    match value {
        Some(value) => Ok(value),
        None => Input::with_theme(theme)
            .with_prompt(prompt)
            .interact_text()
            .with_context(|| format!("reading input: {prompt}")),
    }
}

/// Same as [`required_input`], with empty meaning "skip".
fn optional_input(
    value: Option<String>,
    prompt: &str,
    theme: &ColorfulTheme,
) -> Result<Option<String>> {
    let raw = match value {
        Some(value) => value,
        None => Input::<String>::with_theme(theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .with_context(|| format!("reading input: {prompt}"))?,
    };
    Ok(normalize_optional(raw))
}

fn normalize_optional(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
