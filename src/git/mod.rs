// ===========================================================================
// git - Git Query Backend
// ===========================================================================
//
// Every repository fact and mutation goes through this module. All commands
// run with `-C <root>` so callers never depend on the process cwd. Fetch and
// rebase are bounded by an explicit timeout since git itself imposes none.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Command(String),

    #[error("not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("HEAD is detached; check out a branch first")]
    DetachedHead,

    #[error("'{0}' timed out after {1}s")]
    Timeout(String, u64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Identity of a commit author or the configured committer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct WorktreeEntry {
    pub path: PathBuf,
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub is_bare: bool,
}

/// Extract error message from git command output.
///
/// Some git commands (rebase, commit) put error info in stdout, not stderr.
/// Checks stderr first, falls back to stdout.
fn extract_error(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        clean_git_error(&stderr)
    }
}

/// Clean git stderr to a user-friendly message
fn clean_git_error(stderr: &str) -> String {
    let msg = stderr.trim();
    msg.strip_prefix("fatal: ")
        .or_else(|| msg.strip_prefix("error: "))
        .unwrap_or(msg)
        .to_string()
}

fn stdout_str(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Handle to a repository, anchored at the main working tree root.
#[derive(Debug, Clone)]
pub struct Git {
    root: PathBuf,
    timeout: Duration,
}

impl Git {
    /// Resolve the main repository root from anywhere inside it.
    ///
    /// Uses --git-common-dir so calls from inside a linked worktree still
    /// resolve to the primary working tree.
    pub fn discover(path: &Path) -> Result<Self> {
        let output = Command::new("git")
            .arg("-C")
            .arg(path)
            .args(["rev-parse", "--git-common-dir"])
            .output()?;

        if !output.status.success() {
            return Err(Error::NotARepository(path.to_path_buf()));
        }

        let git_dir = PathBuf::from(stdout_str(&output));
        let git_dir = if git_dir.is_absolute() {
            git_dir
        } else {
            path.join(&git_dir)
        };
        let git_dir = git_dir
            .canonicalize()
            .map_err(|_| Error::NotARepository(path.to_path_buf()))?;

        // e.g. /repo/.git/worktrees/branch -> walk up to /repo/.git
        let mut common = git_dir.as_path();
        while !common.ends_with(".git") {
            common = common
                .parent()
                .ok_or_else(|| Error::NotARepository(path.to_path_buf()))?;
        }

        let root = common
            .parent()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| Error::NotARepository(path.to_path_buf()))?;

        Ok(Self {
            root,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()?;
        Ok(output)
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(Error::Command(extract_error(&output)));
        }
        Ok(output)
    }

    /// Run a command that may stall on the network, killing it on timeout.
    fn run_bounded(&self, args: &[&str]) -> Result<Output> {
        let mut child = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let started = Instant::now();
        loop {
            if child.try_wait()?.is_some() {
                return Ok(child.wait_with_output()?);
            }
            if started.elapsed() >= self.timeout {
                child.kill().ok();
                child.wait().ok();
                return Err(Error::Timeout(
                    format!("git {}", args.join(" ")),
                    self.timeout.as_secs(),
                ));
            }
            std::thread::sleep(Duration::from_millis(25));
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Get the current branch name; detached HEAD is an error.
    pub fn current_branch(&self) -> Result<String> {
        let output = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        if !output.status.success() {
            return Err(Error::Command(extract_error(&output)));
        }
        let branch = stdout_str(&output);
        if branch == "HEAD" {
            return Err(Error::DetachedHead);
        }
        Ok(branch)
    }

    pub fn branch_exists(&self, name: &str) -> Result<bool> {
        let refname = format!("refs/heads/{name}");
        let output = self.run(&["show-ref", "--verify", "--quiet", &refname])?;
        Ok(output.status.success())
    }

    pub fn remote_branch_exists(&self, remote: &str, name: &str) -> Result<bool> {
        let refname = format!("refs/remotes/{remote}/{name}");
        let output = self.run(&["show-ref", "--verify", "--quiet", &refname])?;
        Ok(output.status.success())
    }

    /// The upstream tracking ref of a branch, if one is configured.
    pub fn upstream_of(&self, branch: &str) -> Result<Option<String>> {
        let refspec = format!("{branch}@{{upstream}}");
        let output = self.run(&[
            "rev-parse",
            "--abbrev-ref",
            "--symbolic-full-name",
            &refspec,
        ])?;
        if !output.status.success() {
            return Ok(None);
        }
        let upstream = stdout_str(&output);
        Ok((!upstream.is_empty()).then_some(upstream))
    }

    /// Count commits selected by a range expression, e.g. "main..feature".
    pub fn rev_list_count(&self, range: &str) -> Result<usize> {
        let output = self.run_checked(&["rev-list", "--count", range])?;
        stdout_str(&output)
            .parse()
            .map_err(|_| Error::Command(format!("unparseable rev-list count for '{range}'")))
    }

    /// True if `ancestor` is reachable from `descendant`.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let output = self.run(&["merge-base", "--is-ancestor", ancestor, descendant])?;
        Ok(output.status.success())
    }

    pub fn status_porcelain(&self) -> Result<String> {
        let output = self.run_checked(&["status", "--porcelain"])?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// True if the repository has at least one commit.
    pub fn has_commits(&self) -> Result<bool> {
        let output = self.run(&["rev-parse", "--verify", "--quiet", "HEAD"])?;
        Ok(output.status.success())
    }

    /// Author identity of the last commit, or None in an empty repository.
    pub fn last_commit_identity(&self) -> Result<Option<Identity>> {
        if !self.has_commits()? {
            return Ok(None);
        }
        let output = self.run_checked(&["log", "-1", "--format=%an%n%ae"])?;
        let text = stdout_str(&output);
        let mut lines = text.lines();
        let name = lines.next().unwrap_or_default().to_string();
        let email = lines.next().unwrap_or_default().to_string();
        Ok(Some(Identity { name, email }))
    }

    /// The identity git would stamp on a new commit, from config.
    pub fn active_identity(&self) -> Result<Identity> {
        let name = self.run_checked(&["config", "user.name"])?;
        let email = self.run_checked(&["config", "user.email"])?;
        Ok(Identity {
            name: stdout_str(&name),
            email: stdout_str(&email),
        })
    }

    pub fn remote_url(&self, remote: &str) -> Result<Option<String>> {
        let output = self.run(&["remote", "get-url", remote])?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(stdout_str(&output)))
    }

    /// Detect the trunk branch (main > master > remote default).
    pub fn detect_trunk(&self) -> Result<String> {
        for branch in ["main", "master"] {
            if self.branch_exists(branch)? {
                return Ok(branch.to_string());
            }
        }

        let output = self.run(&["symbolic-ref", "refs/remotes/origin/HEAD"])?;
        if output.status.success() {
            let full = stdout_str(&output);
            if let Some(branch) = full.strip_prefix("refs/remotes/origin/") {
                return Ok(branch.to_string());
            }
        }

        Ok("main".to_string())
    }

    /// Resolved path of the pre-commit hook, honoring core.hooksPath.
    pub fn pre_commit_hook_path(&self) -> Result<PathBuf> {
        let output = self.run_checked(&["rev-parse", "--git-path", "hooks/pre-commit"])?;
        let path = PathBuf::from(stdout_str(&output));
        if path.is_absolute() {
            Ok(path)
        } else {
            Ok(self.root.join(path))
        }
    }

    pub fn local_branches(&self) -> Result<Vec<String>> {
        let output = self.run_checked(&["branch", "--list", "--format=%(refname:short)"])?;
        Ok(stdout_str(&output)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    /// Remote branch names with the remote prefix stripped.
    pub fn remote_branches(&self, remote: &str) -> Result<Vec<String>> {
        let output = self.run_checked(&["branch", "-r", "--list", "--format=%(refname:short)"])?;
        let prefix = format!("{remote}/");
        Ok(stdout_str(&output)
            .lines()
            .filter_map(|l| l.trim().strip_prefix(&prefix))
            .filter(|l| *l != "HEAD")
            .map(|l| l.to_string())
            .collect())
    }

    pub fn list_worktrees(&self) -> Result<Vec<WorktreeEntry>> {
        let output = self.run_checked(&["worktree", "list", "--porcelain"])?;
        let content = String::from_utf8_lossy(&output.stdout);
        Ok(parse_worktree_list(&content))
    }

    /// Files currently in conflicted (unmerged) state.
    pub fn conflicted_files(&self) -> Result<Vec<String>> {
        let output = self.run_checked(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(stdout_str(&output)
            .lines()
            .map(|l| l.to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    pub fn head_commit(&self) -> Result<String> {
        let output = self.run_checked(&["rev-parse", "HEAD"])?;
        Ok(stdout_str(&output))
    }

    pub fn is_rebase_in_progress(&self) -> bool {
        let git_dir = self
            .run(&["rev-parse", "--absolute-git-dir"])
            .ok()
            .filter(|o| o.status.success())
            .map(|o| PathBuf::from(stdout_str(&o)));

        match git_dir {
            Some(dir) => dir.join("rebase-merge").exists() || dir.join("rebase-apply").exists(),
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Add a worktree checked out to an existing local branch.
    pub fn create_worktree(&self, path: &Path, branch: &str) -> Result<()> {
        let path = path.to_string_lossy();
        self.run_checked(&["worktree", "add", &path, branch])?;
        Ok(())
    }

    /// Add a worktree on a brand-new branch cut from `base`.
    pub fn create_worktree_from_base(&self, path: &Path, branch: &str, base: &str) -> Result<()> {
        let path = path.to_string_lossy();
        self.run_checked(&["worktree", "add", "-b", branch, &path, base])?;
        Ok(())
    }

    /// Add a worktree on a new local branch tracking a remote ref.
    pub fn create_worktree_tracking(
        &self,
        path: &Path,
        branch: &str,
        remote_ref: &str,
    ) -> Result<()> {
        let path = path.to_string_lossy();
        self.run_checked(&["worktree", "add", "--track", "-b", branch, &path, remote_ref])?;
        Ok(())
    }

    pub fn remove_worktree(&self, path: &Path, force: bool) -> Result<()> {
        let path = path.to_string_lossy();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path);
        self.run_checked(&args)?;
        Ok(())
    }

    /// Drop stale worktree registrations whose directories are gone.
    pub fn prune_worktrees(&self) -> Result<()> {
        self.run_checked(&["worktree", "prune"])?;
        Ok(())
    }

    pub fn checkout(&self, branch: &str) -> Result<()> {
        self.run_checked(&["checkout", branch])?;
        Ok(())
    }

    pub fn fetch(&self, remote: &str, branch: &str) -> Result<()> {
        let output = self.run_bounded(&["fetch", "--quiet", remote, branch])?;
        if !output.status.success() {
            return Err(Error::Command(extract_error(&output)));
        }
        Ok(())
    }

    pub fn rebase(&self, onto: &str) -> Result<()> {
        let output = self.run_bounded(&["rebase", onto])?;
        if !output.status.success() {
            return Err(Error::Command(extract_error(&output)));
        }
        Ok(())
    }

    pub fn rebase_abort(&self) -> Result<()> {
        self.run_checked(&["rebase", "--abort"])?;
        Ok(())
    }

    /// Stage modifications and deletions of tracked files only.
    pub fn stage_tracked(&self) -> Result<()> {
        self.run_checked(&["add", "-u"])?;
        Ok(())
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        let output = self.run(&["commit", "-m", message])?;
        if !output.status.success() {
            return Err(Error::Command(extract_error(&output)));
        }
        Ok(())
    }

    /// Amend the last commit keeping its message.
    pub fn commit_amend(&self) -> Result<()> {
        let output = self.run(&["commit", "--amend", "--no-edit"])?;
        if !output.status.success() {
            return Err(Error::Command(extract_error(&output)));
        }
        Ok(())
    }
}

/// Parse `git worktree list --porcelain` output
pub fn parse_worktree_list(content: &str) -> Vec<WorktreeEntry> {
    let mut worktrees = Vec::new();
    let mut current: Option<WorktreeEntry> = None;

    for line in content.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(wt) = current.take() {
                worktrees.push(wt);
            }
            current = Some(WorktreeEntry {
                path: PathBuf::from(path),
                branch: None,
                commit: None,
                is_bare: false,
            });
        } else if let Some(ref mut wt) = current {
            if let Some(branch) = line.strip_prefix("branch refs/heads/") {
                wt.branch = Some(branch.to_string());
            } else if let Some(commit) = line.strip_prefix("HEAD ") {
                wt.commit = Some(commit.to_string());
            } else if line == "bare" {
                wt.is_bare = true;
            }
        }
    }

    if let Some(wt) = current {
        worktrees.push(wt);
    }

    worktrees
}
