//! ABOUTME: `session list|show|resume|export|delete|stats` handlers
//! ABOUTME: Thin translation layer over `aris_sessions::SessionStore`; `resume` delegates to the orchestrator's hop loop like `research::resume`

use std::path::PathBuf;

use aris_sessions::{SessionFilter, SessionStatus};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::cli::{OutputFormat, SessionCommands};
use crate::context::Context;

use super::{exit_code_for_error, exit_code_for_outcome, print_json, EXIT_SUCCESS, EXIT_USER_ERROR};

pub async fn handle(context: &Context, command: SessionCommands, output: OutputFormat) -> anyhow::Result<i32> {
    match command {
        SessionCommands::List { topic, status } => list(context, topic.as_deref(), status.as_deref(), output).await,
        SessionCommands::Show { session_id } => show(context, &session_id, output).await,
        SessionCommands::Resume { session_id } => resume(context, &session_id, output).await,
        SessionCommands::Export { session_id, out } => export(context, &session_id, out, output).await,
        SessionCommands::Delete { session_id, cascade } => delete(context, &session_id, cascade, output).await,
        SessionCommands::Stats { session_id } => stats(context, &session_id, output).await,
    }
}

async fn list(context: &Context, topic: Option<&str>, status: Option<&str>, output: OutputFormat) -> anyhow::Result<i32> {
    let topic_id = match topic.map(str::parse::<aris_core::TopicId>).transpose() {
        Ok(t) => t,
        Err(_) => {
            error!(topic, "invalid --topic value");
            return Ok(EXIT_USER_ERROR);
        }
    };
    let status = match status.map(str::parse::<SessionStatus>).transpose() {
        Ok(s) => s,
        Err(_) => {
            error!(status, "invalid --status value");
            return Ok(EXIT_USER_ERROR);
        }
    };

    let sessions = context
        .orchestrator
        .sessions()
        .list_sessions(SessionFilter { topic_id, status })
        .await?;

    if !print_json(&sessions, output)? {
        if sessions.is_empty() {
            println!("no sessions found");
        }
        for session in &sessions {
            println!(
                "{}  {:<11}  hop {}/{}  conf {:.2}  ${:.4}  {}",
                session.id,
                session.status.as_str(),
                session.current_hop,
                session.max_hops,
                session.current_confidence,
                session.accumulated_cost,
                session.query,
            );
        }
    }
    Ok(EXIT_SUCCESS)
}

async fn show(context: &Context, session_id: &str, output: OutputFormat) -> anyhow::Result<i32> {
    let Some(id) = parse_session_id(session_id) else {
        return Ok(EXIT_USER_ERROR);
    };

    match context.orchestrator.sessions().get_session(id).await {
        Ok(session) => {
            if !print_json(&session, output)? {
                println!("session:              {}", session.id);
                println!("topic:                {}", session.topic_id);
                println!("query:                {}", session.query);
                println!("depth:                {}", session.depth.as_str());
                println!("status:               {}", session.status.as_str());
                println!("hop:                  {}/{}", session.current_hop, session.max_hops);
                println!(
                    "confidence:           {:.2} -> {:.2}",
                    session.initial_confidence, session.current_confidence
                );
                println!("budget:               ${:.4} of ${:.4}", session.accumulated_cost, session.budget_limit);
                println!("created:              {}", session.created_at.to_rfc3339());
                println!("updated:              {}", session.updated_at.to_rfc3339());
                if let Some(completed_at) = session.completed_at {
                    println!("completed:            {}", completed_at.to_rfc3339());
                }
            }
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            error!(error = %e, session_id, "failed to load session");
            Ok(EXIT_USER_ERROR)
        }
    }
}

async fn resume(context: &Context, session_id: &str, output: OutputFormat) -> anyhow::Result<i32> {
    let Some(id) = parse_session_id(session_id) else {
        return Ok(EXIT_USER_ERROR);
    };

    let cancel = CancellationToken::new();
    match context.orchestrator.resume(id, cancel).await {
        Ok(outcome) => {
            if !print_json(&outcome, output)? {
                println!("status:               {}", outcome.status.as_str());
                println!("hops completed:       {}", outcome.hops_completed);
                println!("total cost:           ${:.4}", outcome.total_cost);
            }
            Ok(exit_code_for_outcome(&outcome))
        }
        Err(e) => {
            error!(error = %e, session_id, "failed to resume session");
            Ok(exit_code_for_error(&e))
        }
    }
}

async fn export(context: &Context, session_id: &str, out: Option<PathBuf>, output: OutputFormat) -> anyhow::Result<i32> {
    let Some(id) = parse_session_id(session_id) else {
        return Ok(EXIT_USER_ERROR);
    };

    // The Document Store indexes documents by topic/identifier, not by the
    // session that produced them (there's no session->document
    // back-pointer), so a standalone `session export`
    // cannot recover `final_document_id` after the fact. `research`/`resume`
    // print it directly from the freshly-computed `SessionOutcome` instead.
    match context.orchestrator.sessions().export(id, None).await {
        Ok(export) => {
            let json = serde_json::to_string_pretty(&export)?;
            if let Some(path) = out {
                std::fs::write(&path, &json)?;
                println!("wrote {}", path.display());
            } else if !print_json(&export, output)? {
                println!("{json}");
            }
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            error!(error = %e, session_id, "failed to export session");
            Ok(EXIT_USER_ERROR)
        }
    }
}

async fn delete(context: &Context, session_id: &str, cascade: bool, _output: OutputFormat) -> anyhow::Result<i32> {
    let Some(id) = parse_session_id(session_id) else {
        return Ok(EXIT_USER_ERROR);
    };

    match context.orchestrator.sessions().delete(id, cascade).await {
        Ok(()) => {
            println!("deleted session {id}");
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            error!(error = %e, session_id, "failed to delete session");
            Ok(EXIT_USER_ERROR)
        }
    }
}

async fn stats(context: &Context, session_id: &str, output: OutputFormat) -> anyhow::Result<i32> {
    let Some(id) = parse_session_id(session_id) else {
        return Ok(EXIT_USER_ERROR);
    };

    match context.orchestrator.sessions().get_statistics(id).await {
        Ok(stats) => {
            if !print_json(&stats, output)? {
                println!("hops completed:       {}", stats.hops_completed);
                println!("total cost:           ${:.4}", stats.total_cost);
                println!("confidence reached:   {:.2}", stats.confidence_reached);
                println!("avg cost per hop:     ${:.4}", stats.avg_cost_per_hop);
            }
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            error!(error = %e, session_id, "failed to load session statistics");
            Ok(EXIT_USER_ERROR)
        }
    }
}

fn parse_session_id(raw: &str) -> Option<aris_core::SessionId> {
    match raw.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            error!(session_id = raw, "invalid session id");
            None
        }
    }
}
