//! CLI surface: a minimal set of commands sufficient to initialize project
//! memory, drive the MCP server, and run bootstrap/repair.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "taskwing", about = "Project memory, planning pipeline, and MCP server for AI coding assistants")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Print structured JSON instead of human-readable output.
    #[arg(long, global = true)]
    pub json: bool,

    /// Print the underlying cause alongside error messages.
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Preview actions without writing anything (alias for repair --dry-run).
    #[arg(long, global = true)]
    pub preview: bool,

    /// Disable telemetry, regardless of environment auto-detection.
    #[arg(long, global = true)]
    pub no_telemetry: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the `.taskwing/` project layout and an empty, migrated database.
    Init {
        #[arg(long, short)]
        force: bool,
    },
    /// Run the MCP JSON-RPC stdio server.
    Serve,
    /// Scan the current repository once into an empty project memory.
    Bootstrap {
        /// Free-text description of what to look for; defaults to a generic scan.
        #[arg(long, default_value = "Document the architecture of this repository")]
        goal: String,
    },
    /// Evaluate and optionally apply external AI-tool integration repairs.
    Repair {
        /// Apply actions that require confirmation (adoption, global config).
        #[arg(long)]
        confirm: bool,
        #[arg(long)]
        dry_run: bool,
    },
}
