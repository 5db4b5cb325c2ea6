//! ABOUTME: CLI argument parsing, the external interface to the research/resume/session/cost commands
//! ABOUTME: Hierarchical Parser/Subcommand split, one variant per command surface

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default).
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Research depth presets. Mirrors `aris_sessions::Depth`'s
/// variants; kept as its own `ValueEnum` since clap derives its parser from
/// this type directly rather than from the domain crate's `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DepthArg {
    Quick,
    Standard,
    Deep,
    Exhaustive,
}

impl DepthArg {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Deep => "deep",
            Self::Exhaustive => "exhaustive",
        }
    }
}

/// ARIS — Autonomous Research Intelligence System.
#[derive(Parser, Debug)]
#[command(name = "aris")]
#[command(version)]
#[command(about = "Autonomous multi-hop research over search and reasoning providers")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (GLOBAL).
    #[arg(short = 'c', long, global = true, env = "ARIS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Overrides the configured data directory (GLOBAL).
    #[arg(long, global = true, env = "ARIS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity; repeat for more (-v, -vv, -vvv) (GLOBAL).
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format (GLOBAL).
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one research session end to end.
    Research {
        /// The research question.
        query: String,

        /// How many hops to budget and what confidence to target.
        #[arg(long, value_enum, default_value = "standard")]
        depth: DepthArg,

        /// Maximum spend for this session in dollars.
        #[arg(long)]
        max_cost: Option<f64>,

        /// Attach to an existing topic instead of creating a new one.
        #[arg(long)]
        topic: Option<String>,
    },

    /// Resume a session left in a non-terminal state.
    Resume {
        /// The session id to resume.
        session_id: String,
    },

    /// Session Store inspection and maintenance.
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Cost estimation without executing a session.
    Cost {
        #[command(subcommand)]
        command: CostCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// List sessions, optionally filtered.
    List {
        /// Restrict to one topic.
        #[arg(long)]
        topic: Option<String>,
        /// Restrict to one status (planning|searching|analyzing|validating|complete|error|cancelled).
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one session's full detail.
    Show {
        session_id: String,
    },
    /// Resume a session left in a non-terminal state.
    Resume {
        session_id: String,
    },
    /// Export a session as JSON.
    Export {
        session_id: String,
        /// Write to a file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete a session.
    Delete {
        session_id: String,
        /// Also delete recorded hops and cost entries.
        #[arg(long)]
        cascade: bool,
    },
    /// Print a session's hop/cost/confidence statistics.
    Stats {
        session_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum CostCommands {
    /// Estimate searches, tokens, cost, and confidence for a query without running it.
    Estimate {
        query: String,
        #[arg(long, value_enum, default_value = "standard")]
        depth: DepthArg,
        /// Warn if the estimate would exceed this budget.
        #[arg(long)]
        budget: Option<f64>,
    },
}
