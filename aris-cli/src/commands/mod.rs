//! ABOUTME: Command dispatch and shared exit-code mapping
//! ABOUTME: Split by subcommand (cli.rs::Commands -> one module per variant)

pub mod cost;
pub mod research;
pub mod session;

use aris_core::ArisError;
use aris_orchestrator::SessionOutcome;

use crate::cli::{Cli, Commands, OutputFormat};
use crate::context::Context;

/// Exit codes: 0 success, 1 user/config error, 2 budget exceeded, 3
/// provider unavailable, 4 cancelled.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_USER_ERROR: i32 = 1;
pub const EXIT_BUDGET_EXCEEDED: i32 = 2;
pub const EXIT_PROVIDER_UNAVAILABLE: i32 = 3;
pub const EXIT_CANCELLED: i32 = 4;

/// Maps a directly-propagated `ArisError` (one that aborted the command
/// before or outside the hop loop, e.g. an empty query or a store I/O
/// failure) to an exit code.
#[must_use]
pub fn exit_code_for_error(err: &ArisError) -> i32 {
    match err {
        ArisError::BudgetExceeded { .. } => EXIT_BUDGET_EXCEEDED,
        ArisError::ProviderUnavailable { .. } | ArisError::ProviderRetriable { .. } | ArisError::ProviderFatal { .. } => {
            EXIT_PROVIDER_UNAVAILABLE
        }
        ArisError::Cancelled => EXIT_CANCELLED,
        _ => EXIT_USER_ERROR,
    }
}

/// Maps a completed session's terminal summary to an exit code.
/// `SessionOutcome::error` is a pre-rendered `ArisError::to_string()` (see
/// `aris_orchestrator::outcome`'s doc comment for why it's flattened to a
/// string rather than the typed error): classified back by the distinct
/// wording each variant's `#[error(...)]` produces.
#[must_use]
pub fn exit_code_for_outcome(outcome: &SessionOutcome) -> i32 {
    use aris_sessions::SessionStatus;

    match outcome.status {
        SessionStatus::Cancelled => EXIT_CANCELLED,
        SessionStatus::Complete => EXIT_SUCCESS,
        _ => match outcome.error.as_deref() {
            Some(message) if message.contains("budget exceeded") => EXIT_BUDGET_EXCEEDED,
            Some(message) if message.contains("provider") && message.contains("unavailable") => {
                EXIT_PROVIDER_UNAVAILABLE
            }
            _ => EXIT_USER_ERROR,
        },
    }
}

/// Runs the parsed command and returns the process exit code.
pub async fn execute_command(cli: Cli, context: Context) -> anyhow::Result<i32> {
    let output = cli.output;
    match cli.command {
        Commands::Research {
            query,
            depth,
            max_cost,
            topic,
        } => research::run(&context, &query, depth, max_cost, topic.as_deref(), output).await,
        Commands::Resume { session_id } => research::resume(&context, &session_id, output).await,
        Commands::Session { command } => session::handle(&context, command, output).await,
        Commands::Cost { command } => cost::handle(&context, command, output).await,
    }
}

pub(crate) fn print_json(value: &impl serde::Serialize, output: OutputFormat) -> anyhow::Result<bool> {
    if matches!(output, OutputFormat::Json) {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(true)
    } else {
        Ok(false)
    }
}
