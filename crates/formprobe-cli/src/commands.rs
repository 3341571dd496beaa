//! CLI command definitions using clap

use crate::config::Verbosity;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Formprobe: validate dynamic registration forms in a real browser
#[derive(Parser, Debug)]
#[command(name = "formprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Verbosity selected by -v/-q
    #[must_use]
    pub const fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the form-logic checks (dropdowns, strength meter, confirm error, submit gating)
    Logic(RunArgs),

    /// Run the negative check (required last-name error)
    Negative(RunArgs),

    /// Run the positive check (valid submission, success message, reset)
    Positive(RunArgs),

    /// Show the effective configuration as YAML
    Config(ConfigArgs),
}

/// Options shared by every command that builds a configuration
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// YAML configuration file
    #[arg(short, long, env = "FORMPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Page URL or local HTML path
    #[arg(long)]
    pub page: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the browser sandbox (containers/CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Path to the chromium binary
    #[arg(long, env = "FORMPROBE_CHROMIUM")]
    pub chromium: Option<String>,

    /// Directory for screenshots and page source
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Skip screenshots and page source
    #[arg(long)]
    pub no_evidence: bool,

    /// Default wait timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Poll interval in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
}

/// Arguments for the scenario commands
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Configuration overrides
    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Print the run summary as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Configuration overrides
    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from([
            "formprobe",
            "-vv",
            "logic",
            "--page",
            "http://localhost:8080/",
            "--headed",
            "--timeout-ms",
            "2500",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Debug);
        let Commands::Logic(args) = cli.command else {
            panic!("expected logic");
        };
        assert!(args.json);
        assert!(args.overrides.headed);
        assert_eq!(args.overrides.timeout_ms, Some(2500));
        assert_eq!(args.overrides.page.as_deref(), Some("http://localhost:8080/"));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["formprobe", "-q", "-v", "negative"]).is_err());
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["formprobe"]).is_err());
    }

    #[test]
    fn test_config_subcommand() {
        let cli = Cli::try_parse_from(["formprobe", "config", "--no-evidence"]).unwrap();
        let Commands::Config(args) = cli.command else {
            panic!("expected config");
        };
        assert!(args.overrides.no_evidence);
    }
}
