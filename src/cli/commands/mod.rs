// ===========================================================================
// cli/commands - Command Implementations
// ===========================================================================

pub mod commit;
pub mod sync;
pub mod worktree;

// Re-export argument types
pub use commit::CommitArgs;
pub use sync::SyncArgs;
pub use worktree::{CreateArgs, ValidateArgs};

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{Error, Result};
use crate::config::Config;
use crate::git::Git;
use crate::ticket::{self, TicketPatterns};

/// Shared command context: repository handle plus merged configuration.
pub(crate) struct Context {
    pub git: Git,
    pub config: Config,
}

impl Context {
    /// Discover the repository from `path` (or the cwd) and load config.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let start = match path {
            Some(p) => p.to_path_buf(),
            None => std::env::current_dir().map_err(|e| Error::Other(e.to_string()))?,
        };
        let git = Git::discover(&start)?;
        let config = Config::load(git.root())?;
        let git = git.with_timeout(Duration::from_secs(config.command_timeout_secs));
        Ok(Self { git, config })
    }

    /// Ticket patterns, required: load failures propagate.
    pub fn require_patterns(&self) -> Result<TicketPatterns> {
        Ok(TicketPatterns::load(self.git.root(), &self.config.base_dir)?)
    }

    /// Ticket patterns where the config itself is optional. Only absence is
    /// tolerated; a present-but-malformed document is still an error.
    pub fn optional_patterns(&self) -> Result<Option<TicketPatterns>> {
        match TicketPatterns::load(self.git.root(), &self.config.base_dir) {
            Ok(patterns) => Ok(Some(patterns)),
            Err(ticket::Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Base branch from flag > project config > repository detection.
    pub fn base_branch(&self, flag: Option<&str>) -> Result<String> {
        if let Some(base) = flag {
            return Ok(base.to_string());
        }
        if let Some(trunk) = &self.config.trunk {
            return Ok(trunk.clone());
        }
        Ok(self.git.detect_trunk()?)
    }
}

pub(crate) fn print_report<T: serde::Serialize>(report: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(report).map_err(|e| Error::Other(e.to_string()))?;
    println!("{json}");
    Ok(())
}

pub(crate) fn display_path(path: &PathBuf) -> String {
    path.display().to_string()
}
