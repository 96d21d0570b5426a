// ===========================================================================
// sync - Branch Synchronization Engine
// ===========================================================================
//
// Resolves a target branch by name or ticket pattern, then fetches and
// rebases it onto a base branch. Conflict handling depends on the mode:
// agent mode aborts immediately and restores the pre-rebase tip, interactive
// mode leaves the conflict in place for manual resolution. The engine never
// pushes; that is always the caller's move.

use clap::ValueEnum;
use serde::Serialize;

use crate::git::{self, Git};
use crate::ticket::TicketPatterns;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("branch '{0}' not found locally or on the remote")]
    BranchNotFound(String),

    #[error("no branch matching '{0}' found locally or on the remote")]
    NoPatternMatch(String),

    #[error("a ticket pattern config is required to resolve '{0}'")]
    PatternConfigMissing(String),

    #[error("rebase of '{branch}' hit conflicts in {} file(s)", files.len())]
    RebaseConflict {
        branch: String,
        mode: SyncMode,
        files: Vec<String>,
    },

    #[error(transparent)]
    Git(#[from] git::Error),
}

/// Governs conflict handling. Always an explicit parameter, never an
/// ambient environment switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Interactive,
    Agent,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Interactive => f.write_str("interactive"),
            SyncMode::Agent => f.write_str("agent"),
        }
    }
}

/// Outcome of target-branch resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A branch with work remaining relative to the base.
    Branch(String),
    /// The pattern's branch is fully merged into the base; terminal,
    /// nothing to sync and nothing was mutated.
    AlreadyMerged { branch: String, base: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub branch: String,
    pub base: String,
    pub onto: String,
    pub mode: SyncMode,
}

pub struct Engine<'a> {
    git: &'a Git,
    remote: &'a str,
    patterns: Option<&'a TicketPatterns>,
}

impl<'a> Engine<'a> {
    pub fn new(git: &'a Git, remote: &'a str, patterns: Option<&'a TicketPatterns>) -> Self {
        Self {
            git,
            remote,
            patterns,
        }
    }

    /// Resolve the branch to sync, by explicit name or ticket pattern.
    pub fn resolve(
        &self,
        branch: Option<&str>,
        pattern: Option<&str>,
        base: &str,
    ) -> Result<Resolution> {
        if let Some(branch) = branch {
            if !self.git.branch_exists(branch)?
                && !self.git.remote_branch_exists(self.remote, branch)?
            {
                return Err(Error::BranchNotFound(branch.to_string()));
            }
            return Ok(Resolution::Branch(branch.to_string()));
        }

        let Some(pattern) = pattern else {
            // No branch and no pattern: sync whatever is checked out
            return Ok(Resolution::Branch(self.git.current_branch()?));
        };

        let Some(patterns) = self.patterns else {
            return Err(Error::PatternConfigMissing(pattern.to_string()));
        };

        let candidate = self.find_candidate(patterns, pattern)?;
        let Some((branch, merged_probe)) = candidate else {
            return Err(Error::NoPatternMatch(pattern.to_string()));
        };

        // Fully merged: no commits on the candidate absent from base
        if self.git.rev_list_count(&format!("{base}..{merged_probe}"))? == 0 {
            return Ok(Resolution::AlreadyMerged {
                branch,
                base: base.to_string(),
            });
        }

        Ok(Resolution::Branch(branch))
    }

    /// First local branch carrying the ticket, then first remote branch.
    /// Returns (branch name, ref to probe for mergedness).
    fn find_candidate(
        &self,
        patterns: &TicketPatterns,
        pattern: &str,
    ) -> Result<Option<(String, String)>> {
        for name in self.git.local_branches()? {
            if patterns.matches(&name, pattern) {
                let probe = name.clone();
                return Ok(Some((name, probe)));
            }
        }
        for name in self.git.remote_branches(self.remote)? {
            if patterns.matches(&name, pattern) {
                let probe = format!("{}/{}", self.remote, name);
                return Ok(Some((name, probe)));
            }
        }
        Ok(None)
    }

    /// Fetch the base, check out the branch, rebase onto the freshest base.
    pub fn sync(&self, branch: &str, base: &str, mode: SyncMode) -> Result<SyncReport> {
        if self.git.remote_url(self.remote)?.is_some() {
            self.git.fetch(self.remote, base)?;
        }

        if self.git.current_branch()? != branch {
            self.git.checkout(branch)?;
        }

        // Rebase onto the remote-tracking ref when one exists; it is the
        // freshest view of the base after the fetch above
        let onto = if self.git.remote_branch_exists(self.remote, base)? {
            format!("{}/{}", self.remote, base)
        } else {
            base.to_string()
        };

        if let Err(e) = self.git.rebase(&onto) {
            return Err(self.handle_rebase_failure(branch, mode, e));
        }

        Ok(SyncReport {
            branch: branch.to_string(),
            base: base.to_string(),
            onto,
            mode,
        })
    }

    fn handle_rebase_failure(&self, branch: &str, mode: SyncMode, err: git::Error) -> Error {
        if !self.git.is_rebase_in_progress() {
            return err.into();
        }

        let files = self.git.conflicted_files().unwrap_or_default();
        match mode {
            SyncMode::Agent => {
                // Restore the pre-rebase tip; leave no partial state behind
                if let Err(abort_err) = self.git.rebase_abort() {
                    return abort_err.into();
                }
                Error::RebaseConflict {
                    branch: branch.to_string(),
                    mode,
                    files,
                }
            }
            SyncMode::Interactive => Error::RebaseConflict {
                branch: branch.to_string(),
                mode,
                files,
            },
        }
    }
}
