//! ABOUTME: `research` and `resume` command handlers
//! ABOUTME: Subscribes to the event bus for a live progress stream, races the hop loop against Ctrl+C for cancellation

use aris_core::{ArisError, TopicId};
use aris_events::ResearchEventKind;
use aris_sessions::Depth;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::cli::{DepthArg, OutputFormat};
use crate::context::Context;

use super::{exit_code_for_error, exit_code_for_outcome, print_json, EXIT_USER_ERROR};

fn to_session_depth(depth: DepthArg) -> Depth {
    depth
        .as_str()
        .parse()
        .expect("DepthArg::as_str produces a string aris_sessions::Depth always parses")
}

fn spawn_progress_printer(events: &aris_events::EventBus, output: OutputFormat) -> tokio::task::JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if matches!(output, OutputFormat::Json) {
                continue;
            }
            match event.kind {
                ResearchEventKind::SessionCreated { query } => println!("Started research session: {query}"),
                ResearchEventKind::HopStarted { hop_number } => println!("  hop {hop_number}: planning and searching..."),
                ResearchEventKind::HopCompleted {
                    hop_number,
                    confidence_after,
                } => println!("  hop {hop_number}: confidence now {confidence_after:.2}"),
                ResearchEventKind::BudgetWarning { threshold, accumulated, limit } => {
                    println!("  budget warning: {accumulated:.4} of {limit:.4} ({:.0}%)", threshold * 100.0);
                }
                ResearchEventKind::GateDecision { decision, document_id } => {
                    println!("  gate decision: {decision} ({})", document_id.as_deref().unwrap_or("n/a"));
                }
                ResearchEventKind::Error { kind, message } => println!("  error ({kind}): {message}"),
                ResearchEventKind::StateTransition { .. } | ResearchEventKind::EmbeddingDegraded { .. } => {}
                ResearchEventKind::SessionCompleted { .. } => {}
            }
        }
    })
}

fn cancellation_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let child = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    cancel
}

pub async fn run(
    context: &Context,
    query: &str,
    depth: DepthArg,
    max_cost: Option<f64>,
    topic: Option<&str>,
    output: OutputFormat,
) -> anyhow::Result<i32> {
    let topic_hint = match topic.map(str::parse::<TopicId>).transpose() {
        Ok(hint) => hint,
        Err(e) => {
            error!(error = %e, "invalid --topic value");
            return Ok(EXIT_USER_ERROR);
        }
    };

    let budget_limit = max_cost.unwrap_or(context.config.default_budget);
    let progress = spawn_progress_printer(context.orchestrator.events(), output);
    let cancel = cancellation_token();

    let result = context
        .orchestrator
        .research(query, to_session_depth(depth), budget_limit, topic_hint, cancel)
        .await;
    progress.abort();

    render_outcome(result, output)
}

pub async fn resume(context: &Context, session_id: &str, output: OutputFormat) -> anyhow::Result<i32> {
    let session_id = match session_id.parse() {
        Ok(id) => id,
        Err(_) => {
            error!(session_id, "invalid session id");
            return Ok(EXIT_USER_ERROR);
        }
    };

    let progress = spawn_progress_printer(context.orchestrator.events(), output);
    let cancel = cancellation_token();
    let result = context.orchestrator.resume(session_id, cancel).await;
    progress.abort();

    render_outcome(result, output)
}

fn render_outcome(result: Result<aris_orchestrator::SessionOutcome, ArisError>, output: OutputFormat) -> anyhow::Result<i32> {
    match result {
        Ok(outcome) => {
            if !print_json(&outcome, output)? {
                println!();
                println!("session:              {}", outcome.session_id);
                println!("status:               {}", outcome.status.as_str());
                println!("hops completed:       {}", outcome.hops_completed);
                println!("total cost:           ${:.4}", outcome.total_cost);
                println!("confidence reached:   {:.2}", outcome.confidence_reached);
                println!(
                    "document action:      {}",
                    outcome
                        .document_action
                        .map(|a| a.as_str().to_string())
                        .unwrap_or_else(|| "none".to_string())
                );
                if let Some(document_id) = outcome.document_id {
                    println!("document id:          {document_id}");
                }
                if let Some(message) = &outcome.error {
                    println!("error:                {message}");
                }
            }
            Ok(exit_code_for_outcome(&outcome))
        }
        Err(e) => {
            error!(error = %e, "research session failed to start");
            Ok(exit_code_for_error(&e))
        }
    }
}
