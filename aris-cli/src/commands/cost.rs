//! ABOUTME: `cost estimate` handler
//! ABOUTME: Pure read of `aris_cost::estimate` against the loaded config; never touches the stores or providers

use tracing::warn;

use crate::cli::{CostCommands, DepthArg, OutputFormat};
use crate::context::Context;

use super::{print_json, EXIT_SUCCESS};

pub async fn handle(context: &Context, command: CostCommands, output: OutputFormat) -> anyhow::Result<i32> {
    match command {
        CostCommands::Estimate { query, depth, budget } => estimate(context, &query, depth, budget, output).await,
    }
}

fn to_config_depth(depth: DepthArg) -> aris_config::Depth {
    depth
        .as_str()
        .parse()
        .expect("DepthArg::as_str produces a string aris_config::Depth always parses")
}

async fn estimate(
    context: &Context,
    query: &str,
    depth: DepthArg,
    budget: Option<f64>,
    output: OutputFormat,
) -> anyhow::Result<i32> {
    let estimate = aris_cost::estimate(&context.config, query, to_config_depth(depth));

    if !print_json(&estimate, output)? {
        println!("complexity:           {:.2}", estimate.complexity);
        println!("estimated searches:   {}", estimate.estimated_searches);
        println!("estimated tokens:     {}", estimate.estimated_tokens);
        println!("estimated cost:       ${:.4}", estimate.estimated_cost);
        println!("estimate confidence:  {:.2}", estimate.confidence);
    }

    if let Some(limit) = budget {
        if estimate.estimated_cost > limit {
            warn!(
                estimated = estimate.estimated_cost,
                limit, "estimated cost exceeds the given budget"
            );
            if !matches!(output, OutputFormat::Json) {
                println!("warning:              estimated cost ${:.4} exceeds budget ${:.4}", estimate.estimated_cost, limit);
            }
        }
    }

    Ok(EXIT_SUCCESS)
}
