//! Replace SCP - Command Line
//!
//! Replaces the DETACH SCP with the ATTACH SCP on one account or OU.
//!
//! # Usage
//! ```bash
//! # Preview the calls (dry run is the default)
//! replace-scp --target-id 111122223333 --attach-scp-id p-new12345 --detach-scp-id p-old12345
//!
//! # Apply, assuming a role in the target account
//! ATTACH_SCP_ID=p-new12345 DETACH_SCP_ID=p-old12345 \
//!   replace-scp --target-id 111122223333 --dry-run false \
//!   --assume-role-name OrganizationAccountAccessRole
//! ```

use anyhow::{Context, Result};
use clap::{ArgAction, ArgGroup, Parser, ValueEnum};
use tracing::info;

use scp_replacer::config::parse_bool;
use scp_replacer::credentials::{DEFAULT_ASSUME_ROLE_NAME, DEFAULT_SESSION_NAME};
use scp_replacer::logging::{init_logging, parse_log_level, LogFormat};
use scp_replacer::{
    NodeId, PolicyId, PolicyPair, ReplaceConfig, ReplaceOutcome, RoleSelection,
    ScpReplacementAgent,
};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser, Debug)]
#[command(name = "replace-scp", version)]
#[command(about = "Replace a service control policy on an AWS account or OU", long_about = None)]
#[command(group(
    ArgGroup::new("assume_role")
        .args(["assume_role_arn", "assume_role_name"])
        .multiple(false)
))]
struct Args {
    /// Account ID or OU ID where the SCP will be replaced
    #[arg(long, visible_alias = "target-account-id")]
    target_id: String,

    /// Id of the new policy to attach
    #[arg(long, env = "ATTACH_SCP_ID")]
    attach_scp_id: String,

    /// Id of the policy to detach
    #[arg(long, env = "DETACH_SCP_ID")]
    detach_scp_id: String,

    /// Log the attach/detach calls without sending them
    #[arg(long, env = "DRY_RUN", default_value = "true", value_parser = parse_flag, action = ArgAction::Set)]
    dry_run: bool,

    /// Log level: critical, error, warning, info or debug
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Fully qualified ARN of the role to assume
    #[arg(long)]
    assume_role_arn: Option<String>,

    /// Name of the role to assume in the target account (bare flag uses the
    /// Organizations default role)
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_ASSUME_ROLE_NAME)]
    assume_role_name: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
}

fn parse_flag(raw: &str) -> Result<bool, String> {
    parse_bool(raw).map_err(|e| e.to_string())
}

impl Args {
    fn role(&self) -> Option<RoleSelection> {
        match (&self.assume_role_arn, &self.assume_role_name) {
            (Some(arn), _) => Some(RoleSelection::Arn(arn.clone())),
            (None, Some(name)) => Some(RoleSelection::Name(name.clone())),
            (None, None) => None,
        }
    }

    fn config(&self) -> Result<ReplaceConfig> {
        let policies = PolicyPair::new(
            PolicyId::new(self.attach_scp_id.as_str())?,
            PolicyId::new(self.detach_scp_id.as_str())?,
        )?;

        Ok(ReplaceConfig::new(policies)
            .with_dry_run(self.dry_run)
            .with_assume_role(self.role())
            .with_session_name(DEFAULT_SESSION_NAME)
            .with_log_level(parse_log_level(Some(&self.log_level))))
    }
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.config().context("Invalid configuration")?;

    init_logging(config.log_level, LogFormat::Text)?;

    let target = NodeId::parse(&args.target_id)?;
    info!(node = %target, kind = %target.kind(), "🚀 Replacing SCP");

    let agent = ScpReplacementAgent::new(config).await;
    let outcome = agent
        .replace(&target)
        .await
        .with_context(|| format!("Failed to replace SCP on {}", target))?;

    match args.output {
        OutputFormat::Text => print_outcome(&outcome),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }

    Ok(())
}

fn print_outcome(outcome: &ReplaceOutcome) {
    let prefix = if outcome.dry_run { "[dry run] " } else { "" };

    println!("Target:  {}", outcome.target);
    println!("Before:  {}", outcome.policies_before.join(", "));
    for action in &outcome.actions {
        println!("{}✅ {}", prefix, action);
    }
}
