// ===========================================================================
// commit - Commit Safety Policy
// ===========================================================================
//
// Decides amend-vs-new-commit after an external mutation (for instance a
// hook rewriting files). Amending is only safe when the last commit was
// authored by the active identity and has not reached the upstream; anything
// else gets a fresh commit so published or foreign history is never
// rewritten.

use serde::Serialize;

use crate::git::{self, Git};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("refusing to amend: {0}")]
    PushSafetyViolation(String),

    #[error(transparent)]
    Git(#[from] git::Error),
}

/// Whether the last commit has reached the upstream ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushStatus {
    Pushed,
    NotPushed,
    NoUpstream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    Amended,
    Committed,
    NoChanges,
}

const EXTERNAL_MUTATION_MESSAGE: &str = "Apply workspace file updates";

pub struct Policy<'a> {
    git: &'a Git,
}

impl<'a> Policy<'a> {
    pub fn new(git: &'a Git) -> Self {
        Self { git }
    }

    /// Push status of HEAD relative to the current branch's upstream.
    pub fn push_status(&self) -> Result<PushStatus> {
        let branch = self.git.current_branch()?;
        let Some(upstream) = self.git.upstream_of(&branch)? else {
            return Ok(PushStatus::NoUpstream);
        };

        if self.git.is_ancestor("HEAD", &upstream)? {
            Ok(PushStatus::Pushed)
        } else {
            Ok(PushStatus::NotPushed)
        }
    }

    /// True iff the last commit is ours and has not reached the upstream.
    /// False when there is no prior commit to compare against.
    pub fn should_amend(&self) -> Result<bool> {
        let Some(last) = self.git.last_commit_identity()? else {
            return Ok(false);
        };

        let active = self.git.active_identity()?;
        if last != active {
            return Ok(false);
        }

        Ok(self.push_status()? != PushStatus::Pushed)
    }

    /// Fold an external mutation into history: amend when safe, otherwise a
    /// new commit with a fixed message. Stages tracked modifications only.
    pub fn on_external_mutation(&self) -> Result<MutationOutcome> {
        let amend = self.should_amend()?;

        self.git.stage_tracked()?;
        if self.git.status_porcelain()?.lines().all(|l| {
            // Nothing staged: first column of porcelain is the index state
            l.chars().next().is_none_or(|c| c == ' ' || c == '?')
        }) {
            return Ok(MutationOutcome::NoChanges);
        }

        if amend {
            self.git.commit_amend()?;
            Ok(MutationOutcome::Amended)
        } else {
            self.git.commit(EXTERNAL_MUTATION_MESSAGE)?;
            Ok(MutationOutcome::Committed)
        }
    }

    /// An explicit amend request; fails rather than touching a pushed or
    /// foreign commit.
    pub fn amend(&self) -> Result<()> {
        if !self.should_amend()? {
            return Err(Error::PushSafetyViolation(
                "the last commit is pushed, foreign, or absent".to_string(),
            ));
        }
        self.git.stage_tracked()?;
        self.git.commit_amend()?;
        Ok(())
    }
}
