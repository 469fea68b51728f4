//! Command-line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Keep a document tree and its entity store in step.
#[derive(Parser, Debug)]
#[command(name = "memsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Workspace holding `memory-bank/` and `logs/` (defaults to the current directory)
    #[arg(short, long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Mirror log output to stderr
    #[arg(long, global = true)]
    pub log_stderr: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Sync changed documents into the store
    Sync {
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report drift between documents and the last sync
    Status {
        /// Print every file and the full report as JSON
        #[arg(short, long)]
        verbose: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn parses_status_with_workspace() {
        let cli = Cli::parse_from(["memsync", "status", "--verbose", "--workspace", "/ws"]);
        assert_eq!(cli.command, Commands::Status { verbose: true });
        assert_eq!(cli.workspace.as_deref(), Some(std::path::Path::new("/ws")));
    }

    #[test]
    fn parses_sync_defaults() {
        let cli = Cli::parse_from(["memsync", "sync"]);
        assert_eq!(cli.command, Commands::Sync { json: false });
        assert!(cli.workspace.is_none());
        assert!(!cli.log_stderr);
    }
}
