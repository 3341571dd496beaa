//! Formprobe CLI: validate a dynamic registration form in a real browser
//!
//! ## Usage
//!
//! ```bash
//! formprobe logic --page index.html        # dropdowns, strength meter, gating
//! formprobe negative --page index.html     # required-field error
//! formprobe positive --config run.yaml     # submission, success, reset
//! formprobe config --timeout-ms 2000       # show effective configuration
//! ```
//!
//! Exit codes: 0 when every check passed, 1 when a check failed, 2 for
//! configuration and browser launch errors.

use clap::Parser;
use formprobe::form::FormScenario;
use formprobe_cli::{
    logging, run_scenario, write_report, Cli, CliError, CliResult, Commands, ConfigArgs,
    ReportFormat, RunArgs, EXIT_FAILED,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbosity(), cli.log_json);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILED),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> CliResult<bool> {
    match cli.command {
        Commands::Logic(args) => run_checks(FormScenario::Logic, &args),
        Commands::Negative(args) => run_checks(FormScenario::Negative, &args),
        Commands::Positive(args) => run_checks(FormScenario::Positive, &args),
        Commands::Config(args) => {
            show_config(&args)?;
            Ok(true)
        }
    }
}

fn show_config(args: &ConfigArgs) -> CliResult<()> {
    let config = args.overrides.load()?;
    let yaml = serde_yaml_ng::to_string(&config).map_err(|err| CliError::report(err.to_string()))?;
    print!("{yaml}");
    Ok(())
}

fn run_checks(scenario: FormScenario, args: &RunArgs) -> CliResult<bool> {
    let config = args.overrides.load()?;
    let format = if args.json {
        ReportFormat::Json
    } else {
        ReportFormat::Text
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let summary = runtime.block_on(run_scenario(scenario, &config))?;

    write_report(&summary, format, &mut std::io::stdout().lock())?;
    Ok(summary.passed())
}
