// ===========================================================================
// cli - Command Line Interface
// ===========================================================================
//
// Exit codes are decided only here: 0 for success, 1 for any failure,
// including the terminal-but-unsynced AlreadyMerged outcome. Machine-readable
// reports go to stdout as JSON; progress and errors go to stderr.

mod commands;

use clap::{Parser, Subcommand};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] crate::config::Error),

    #[error("ticket config error: {0}")]
    Ticket(#[from] crate::ticket::Error),

    #[error("git error: {0}")]
    Git(#[from] crate::git::Error),

    #[error("{0}")]
    Worktree(#[from] crate::worktree::Error),

    #[error("{0}")]
    Sync(#[from] crate::sync::Error),

    #[error("{0}")]
    Commit(#[from] crate::commit::Error),

    #[error("{0}")]
    Other(String),
}

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(
    name = "gws",
    version,
    about = "Git workspace state engine: safe worktree and branch sync workflows"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebase a branch onto its base, resolved by name or ticket pattern
    Sync(commands::SyncArgs),

    /// Manage worktrees under the workspace directory
    #[command(subcommand)]
    Worktree(WorktreeCommand),

    /// Fold externally mutated files into history (amend when safe)
    Commit(commands::CommitArgs),
}

#[derive(Subcommand)]
enum WorktreeCommand {
    /// Create a worktree, resolving its branch by locality
    Create(commands::CreateArgs),

    /// Report the state of a named worktree (read-only)
    Validate(commands::ValidateArgs),
}

impl Cli {
    /// Run the selected command, returning the process exit code.
    pub fn run(self) -> Result<i32> {
        match self.command {
            Command::Sync(args) => commands::sync::run(args),
            Command::Worktree(WorktreeCommand::Create(args)) => commands::worktree::create(args),
            Command::Worktree(WorktreeCommand::Validate(args)) => {
                commands::worktree::validate(args)
            }
            Command::Commit(args) => commands::commit::run(args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_help() {
        let result = Cli::try_parse_from(["gws", "--help"]);
        assert!(result.is_err()); // --help causes early exit
    }

    #[test]
    fn test_cli_parse_version() {
        let result = Cli::try_parse_from(["gws", "--version"]);
        assert!(result.is_err()); // --version causes early exit
    }

    #[test]
    fn test_cli_parse_sync() {
        assert!(Cli::try_parse_from(["gws", "sync"]).is_ok());
    }

    #[test]
    fn test_cli_parse_sync_with_pattern() {
        let cli = Cli::try_parse_from(["gws", "sync", "--pattern", "PROJ-123", "--base", "main"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_sync_with_mode() {
        assert!(Cli::try_parse_from(["gws", "sync", "--mode", "agent"]).is_ok());
        assert!(Cli::try_parse_from(["gws", "sync", "--mode", "interactive"]).is_ok());
        assert!(Cli::try_parse_from(["gws", "sync", "--mode", "bogus"]).is_err());
    }

    #[test]
    fn test_cli_parse_sync_status() {
        assert!(Cli::try_parse_from(["gws", "sync", "--status"]).is_ok());
    }

    #[test]
    fn test_cli_parse_worktree_create() {
        let cli = Cli::try_parse_from(["gws", "worktree", "create", "PROJ-1"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_worktree_create_flags() {
        let cli = Cli::try_parse_from([
            "gws",
            "worktree",
            "create",
            "PROJ-1",
            "--branch",
            "feature/PROJ-1",
            "--base",
            "develop",
            "--skip-sync",
        ]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_worktree_validate() {
        let cli = Cli::try_parse_from(["gws", "worktree", "validate", "PROJ-1"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_worktree_create_requires_name() {
        assert!(Cli::try_parse_from(["gws", "worktree", "create"]).is_err());
    }

    #[test]
    fn test_cli_parse_commit() {
        assert!(Cli::try_parse_from(["gws", "commit"]).is_ok());
        assert!(Cli::try_parse_from(["gws", "commit", "--amend"]).is_ok());
    }

    #[test]
    fn test_error_display() {
        let err = Error::Other("custom error".to_string());
        assert_eq!(err.to_string(), "custom error");
    }
}
