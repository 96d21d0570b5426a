// ===========================================================================
// inspect - Repository State Inspector
// ===========================================================================
//
// Pure reads over the backend: branch locality, ahead/behind divergence,
// protection and cleanliness. Every call re-reads ground truth; nothing is
// cached between invocations.

use crate::git::{self, Git};

pub type Result<T> = git::Result<T>;

/// Where a branch ref exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locality {
    None,
    Local,
    Remote,
    Both,
}

impl std::fmt::Display for Locality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Locality::None => "none",
            Locality::Local => "local",
            Locality::Remote => "remote",
            Locality::Both => "both",
        };
        f.write_str(s)
    }
}

/// Divergence from the upstream ref. Counts exist only when an upstream
/// does; "no upstream" is a distinct state, not (0, 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AheadBehind {
    NoUpstream,
    Counts { ahead: usize, behind: usize },
}

/// Conventional trunk names that must never be mutated by the engine.
const PROTECTED_BRANCHES: &[&str] = &["main", "master", "develop"];

pub struct Inspector<'a> {
    git: &'a Git,
    remote: &'a str,
}

impl<'a> Inspector<'a> {
    pub fn new(git: &'a Git, remote: &'a str) -> Self {
        Self { git, remote }
    }

    /// Locality from two independent ref-existence checks.
    pub fn locality(&self, branch: &str) -> Result<Locality> {
        let local = self.git.branch_exists(branch)?;
        let remote = self.git.remote_branch_exists(self.remote, branch)?;

        Ok(match (local, remote) {
            (true, true) => Locality::Both,
            (true, false) => Locality::Local,
            (false, true) => Locality::Remote,
            (false, false) => Locality::None,
        })
    }

    /// Ahead/behind via two directional ancestry counts against the
    /// upstream. Deliberately not derived from status text.
    pub fn ahead_behind(&self, branch: &str) -> Result<AheadBehind> {
        let Some(upstream) = self.git.upstream_of(branch)? else {
            return Ok(AheadBehind::NoUpstream);
        };

        let ahead = self.git.rev_list_count(&format!("{upstream}..{branch}"))?;
        let behind = self.git.rev_list_count(&format!("{branch}..{upstream}"))?;
        Ok(AheadBehind::Counts { ahead, behind })
    }

    pub fn is_protected(&self, branch: &str) -> bool {
        PROTECTED_BRANCHES.contains(&branch)
    }

    pub fn is_working_tree_clean(&self) -> Result<bool> {
        Ok(self.git.status_porcelain()?.trim().is_empty())
    }

    pub fn has_pre_commit_hook(&self) -> Result<bool> {
        let path = self.git.pre_commit_hook_path()?;
        Ok(path.is_file())
    }
}
