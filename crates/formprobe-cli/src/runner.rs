//! Scenario execution and report output

use crate::error::{CliError, CliResult};
use formprobe::form::FormScenario;
use formprobe::{CancelToken, RunConfig, RunSummary};
use std::io::Write;
use tracing::{info, warn};

/// Report format for stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Human-readable table
    #[default]
    Text,
    /// The serialized run summary
    Json,
}

/// Run one scenario against the configured page
///
/// Ctrl-C cancels the run: the current wait ends and remaining steps are
/// skipped, so a summary is still produced.
///
/// # Errors
///
/// Configuration, launch and navigation failures.
pub async fn run_scenario(scenario: FormScenario, config: &RunConfig) -> CliResult<RunSummary> {
    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });

    info!(?scenario, page = %config.page, "starting run");
    let result = launch(scenario, config, cancel).await;
    watcher.abort();
    result
}

#[cfg(feature = "browser")]
async fn launch(
    scenario: FormScenario,
    config: &RunConfig,
    cancel: CancelToken,
) -> CliResult<RunSummary> {
    Ok(formprobe::run_in_browser(config, scenario, cancel).await?)
}

#[cfg(not(feature = "browser"))]
async fn launch(
    _scenario: FormScenario,
    _config: &RunConfig,
    _cancel: CancelToken,
) -> CliResult<RunSummary> {
    Err(CliError::BrowserUnavailable)
}

/// Write the summary to `out`
///
/// # Errors
///
/// Serialization or write failures.
pub fn write_report(
    summary: &RunSummary,
    format: ReportFormat,
    out: &mut impl Write,
) -> CliResult<()> {
    let mut rendered = match format {
        ReportFormat::Text => summary.render_text(),
        ReportFormat::Json => summary
            .to_json()
            .map_err(|err| CliError::report(err.to_string()))?,
    };
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }
    out.write_all(rendered.as_bytes())?;
    Ok(())
}
