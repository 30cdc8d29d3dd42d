// src/cli/mod.rs
// CLI module for scribe commands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod install;

pub use install::{run_init, run_install_hook};

#[derive(Parser)]
#[command(name = "scribe")]
#[command(about = "Automated developer journal entries from git commits")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as MCP server (default)
    Serve {
        /// Repository path (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Git hook handlers
    Hook {
        #[command(subcommand)]
        action: HookAction,
    },

    /// Generate the journal entry for a commit
    Entry {
        /// Commit hash (default: HEAD)
        #[arg(index = 1)]
        commit: Option<String>,

        /// Repository path (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Generate the daily summary for a date
    Summary {
        /// Day to summarize (YYYY-MM-DD)
        #[arg(index = 1)]
        date: String,

        /// Repository path (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Append a timestamped reflection to today's journal
    Reflect {
        /// Reflection text
        #[arg(index = 1)]
        text: String,

        /// Journal date (YYYY-MM-DD, default: today)
        #[arg(short, long)]
        date: Option<String>,

        /// Repository path (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Write a starter .scribe.yml
    Init {
        /// Repository path (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Install the post-commit hook stub
    InstallHook {
        /// Repository path (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum HookAction {
    /// Invoked by the post-commit hook stub
    PostCommit {
        /// Repository path ($PWD from the hook)
        #[arg(index = 1)]
        path: Option<PathBuf>,
    },
}

/// Resolve an optional path argument against the current directory.
pub fn resolve_repo(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}
