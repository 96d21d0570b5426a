// ===========================================================================
// worktree - Worktree Lifecycle Manager
// ===========================================================================
//
// Worktrees live under <worktrees_dir>/<workspace-id>/<name>. The status of
// a record is always re-derived from ground truth: path existence crossed
// with the registration list. Creation is an explicit error when the record
// is already Valid and self-heals when it is Invalid.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Config;
use crate::copysync::{self, SyncOutcome};
use crate::git::{self, Git};
use crate::inspect::{Inspector, Locality};
use crate::ticket::TicketPatterns;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("worktree '{0}' already exists; remove it first or pick another name")]
    AlreadyExists(String),

    #[error("cannot derive a branch for '{0}' without a ticket pattern config; pass an explicit branch")]
    NoBranchSource(String),

    #[error("auxiliary file sync failed: {0}")]
    SyncFailed(String),

    #[error(transparent)]
    Git(#[from] git::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorktreeStatus {
    Valid,
    Invalid,
    NotFound,
}

impl std::fmt::Display for WorktreeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorktreeStatus::Valid => "VALID",
            WorktreeStatus::Invalid => "INVALID",
            WorktreeStatus::NotFound => "NOT_FOUND",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct WorktreeRecord {
    pub name: String,
    pub path: PathBuf,
    pub branch: Option<String>,
    pub ticket: Option<String>,
    pub status: WorktreeStatus,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOptions {
    pub skip_sync: bool,
}

/// Unique directory id for a repository: {name}-{path-hash[0..6]}.
///
/// Disambiguates repos with the same directory name at different paths.
pub fn workspace_id(root: &Path) -> String {
    let name = root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("repo");

    let mut hasher = DefaultHasher::new();
    root.hash(&mut hasher);
    let hash = hasher.finish();

    format!("{}-{:06x}", name, hash & 0xFFFFFF)
}

pub struct Manager<'a> {
    git: &'a Git,
    config: &'a Config,
    patterns: Option<&'a TicketPatterns>,
}

impl<'a> Manager<'a> {
    pub fn new(git: &'a Git, config: &'a Config, patterns: Option<&'a TicketPatterns>) -> Self {
        Self {
            git,
            config,
            patterns,
        }
    }

    /// Target path for a named worktree under the configured base.
    pub fn target_path(&self, name: &str) -> PathBuf {
        self.config
            .worktrees_dir
            .join(workspace_id(self.git.root()))
            .join(name)
    }

    fn extract_ticket(&self, name: &str) -> Option<String> {
        self.patterns
            .and_then(|p| p.extract_ticket(name))
            .map(|t| t.0)
    }

    /// Pure read: derive the current record for a name. Never mutates.
    pub fn validate(&self, name: &str) -> Result<WorktreeRecord> {
        let path = self.target_path(name);
        let ticket = self.extract_ticket(name);

        if !path.exists() {
            return Ok(WorktreeRecord {
                name: name.to_string(),
                path,
                branch: None,
                ticket,
                status: WorktreeStatus::NotFound,
            });
        }

        let registered = self.registration_of(&path)?;
        match registered {
            // Registered with a resolvable branch: the only Valid shape
            Some(entry) if entry.branch.is_some() => Ok(WorktreeRecord {
                name: name.to_string(),
                path,
                branch: entry.branch,
                ticket,
                status: WorktreeStatus::Valid,
            }),
            // Present on disk but unregistered (or detached): needs repair
            _ => Ok(WorktreeRecord {
                name: name.to_string(),
                path,
                branch: None,
                ticket,
                status: WorktreeStatus::Invalid,
            }),
        }
    }

    fn registration_of(&self, path: &Path) -> Result<Option<git::WorktreeEntry>> {
        let canonical = path.canonicalize().ok();
        let entries = self.git.list_worktrees()?;
        Ok(entries.into_iter().find(|e| {
            e.path == path || canonical.as_deref().is_some_and(|c| e.path == c)
        }))
    }

    /// Create a worktree, resolving its branch by locality.
    ///
    /// Not idempotent when the record is Valid (explicit AlreadyExists);
    /// self-healing when Invalid (stale directory removed, then retried).
    pub fn create(
        &self,
        name: &str,
        branch: Option<&str>,
        base: &str,
        opts: CreateOptions,
    ) -> Result<WorktreeRecord> {
        let path = self.target_path(name);

        match self.validate(name)?.status {
            WorktreeStatus::Valid => return Err(Error::AlreadyExists(name.to_string())),
            WorktreeStatus::Invalid => self.repair(&path)?,
            WorktreeStatus::NotFound => {}
        }

        let branch = self.resolve_branch(name, branch)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let inspector = Inspector::new(self.git, &self.config.remote);
        match inspector.locality(&branch)? {
            Locality::Both | Locality::Local => {
                self.git.create_worktree(&path, &branch)?;
            }
            Locality::Remote => {
                let remote_ref = format!("{}/{}", self.config.remote, branch);
                self.git.create_worktree_tracking(&path, &branch, &remote_ref)?;
            }
            Locality::None => {
                self.git.create_worktree_from_base(&path, &branch, base)?;
            }
        }

        if !opts.skip_sync {
            self.sync_auxiliary_files(&path)?;
        }

        // Final record comes from ground truth, not assumed success
        self.validate(name)
    }

    /// Branch resolution: explicit name, else feature/{ticket}/new-work when
    /// a ticket is extractable, else feature/{name}.
    fn resolve_branch(&self, name: &str, branch: Option<&str>) -> Result<String> {
        if let Some(branch) = branch {
            return Ok(branch.to_string());
        }
        let Some(patterns) = self.patterns else {
            return Err(Error::NoBranchSource(name.to_string()));
        };
        Ok(match patterns.extract_ticket(name) {
            Some(ticket) => format!("feature/{ticket}/new-work"),
            None => format!("feature/{name}"),
        })
    }

    /// Destroy a stale directory (and any half-dead registration) so the
    /// path can be reused.
    fn repair(&self, path: &Path) -> Result<()> {
        eprintln!("Removing stale worktree directory: {}", path.display());
        if self.registration_of(path)?.is_some() {
            self.git.remove_worktree(path, true)?;
        }
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        self.git.prune_worktrees()?;
        Ok(())
    }

    /// All sync failures, bad patterns included, go through the same
    /// configurable fatality policy.
    fn sync_auxiliary_files(&self, worktree: &Path) -> Result<()> {
        let summary =
            match copysync::sync_files(self.git.root(), worktree, &self.config.copy_files) {
                Ok(SyncOutcome::Complete { .. }) => return Ok(()),
                Ok(SyncOutcome::Partial { failures, .. }) => failures.join("; "),
                Err(e) => e.to_string(),
            };

        if self.config.sync_failure_fatal {
            return Err(Error::SyncFailed(summary));
        }
        // Non-fatal policy: report, keep the worktree
        eprintln!("warning: auxiliary file sync incomplete: {summary}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testutil::{add_origin, init_repo, run};
    use tempfile::tempdir;

    struct Fixture {
        _repo: tempfile::TempDir,
        _base: tempfile::TempDir,
        git: Git,
        config: Config,
    }

    fn fixture() -> Fixture {
        let repo = tempdir().unwrap();
        init_repo(repo.path());
        let git = Git::discover(repo.path()).unwrap();

        let base = tempdir().unwrap();
        let config = Config::load_from(repo.path(), base.path().to_path_buf()).unwrap();

        Fixture {
            _repo: repo,
            _base: base,
            git,
            config,
        }
    }

    fn patterns() -> TicketPatterns {
        TicketPatterns::from_prefixes(&["PROJ".to_string()]).unwrap()
    }

    #[test]
    fn test_workspace_id_format() {
        let id = workspace_id(Path::new("/tmp/myrepo"));
        assert!(id.starts_with("myrepo-"));
        let suffix = id.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_workspace_id_distinguishes_paths() {
        let a = workspace_id(Path::new("/tmp/a/repo"));
        let b = workspace_id(Path::new("/tmp/b/repo"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_validate_not_found() {
        let f = fixture();
        let manager = Manager::new(&f.git, &f.config, None);
        let record = manager.validate("PROJ-1").unwrap();
        assert_eq!(record.status, WorktreeStatus::NotFound);
        assert!(record.branch.is_none());
    }

    #[test]
    fn test_validate_idempotent() {
        let f = fixture();
        let manager = Manager::new(&f.git, &f.config, None);
        let first = manager.validate("PROJ-1").unwrap();
        let second = manager.validate("PROJ-1").unwrap();
        assert_eq!(first.status, second.status);
    }

    #[test]
    fn test_validate_extracts_ticket() {
        let f = fixture();
        let p = patterns();
        let manager = Manager::new(&f.git, &f.config, Some(&p));
        let record = manager.validate("PROJ-42-login").unwrap();
        assert_eq!(record.ticket, Some("PROJ-42".to_string()));
    }

    #[test]
    fn test_create_new_branch_from_base() {
        let f = fixture();
        let p = patterns();
        let manager = Manager::new(&f.git, &f.config, Some(&p));

        let record = manager
            .create("PROJ-7", None, "main", CreateOptions::default())
            .unwrap();

        assert_eq!(record.status, WorktreeStatus::Valid);
        assert_eq!(record.branch, Some("feature/PROJ-7/new-work".to_string()));
        assert_eq!(record.ticket, Some("PROJ-7".to_string()));
        assert!(record.path.exists());
    }

    #[test]
    fn test_create_without_ticket_uses_name() {
        let f = fixture();
        let p = patterns();
        let manager = Manager::new(&f.git, &f.config, Some(&p));

        let record = manager
            .create("spike", None, "main", CreateOptions::default())
            .unwrap();
        assert_eq!(record.branch, Some("feature/spike".to_string()));
        assert!(record.ticket.is_none());
    }

    #[test]
    fn test_create_explicit_branch() {
        let f = fixture();
        let manager = Manager::new(&f.git, &f.config, None);

        let record = manager
            .create("x", Some("topic/custom"), "main", CreateOptions::default())
            .unwrap();
        assert_eq!(record.branch, Some("topic/custom".to_string()));
        assert_eq!(record.status, WorktreeStatus::Valid);
    }

    #[test]
    fn test_create_no_branch_source() {
        let f = fixture();
        let manager = Manager::new(&f.git, &f.config, None);
        let result = manager.create("x", None, "main", CreateOptions::default());
        assert!(matches!(result, Err(Error::NoBranchSource(_))));
    }

    #[test]
    fn test_create_existing_local_branch() {
        let f = fixture();
        run(f.git.root(), &["branch", "topic/existing"]);
        let manager = Manager::new(&f.git, &f.config, None);

        let record = manager
            .create("e", Some("topic/existing"), "main", CreateOptions::default())
            .unwrap();
        assert_eq!(record.branch, Some("topic/existing".to_string()));
        assert_eq!(record.status, WorktreeStatus::Valid);
    }

    #[test]
    fn test_create_remote_only_branch_tracks() {
        let f = fixture();
        let _remote = add_origin(f.git.root());
        run(f.git.root(), &["branch", "feature/X"]);
        run(f.git.root(), &["push", "origin", "feature/X"]);
        run(f.git.root(), &["branch", "-D", "feature/X"]);

        let manager = Manager::new(&f.git, &f.config, None);
        let record = manager
            .create("X", Some("feature/X"), "main", CreateOptions::default())
            .unwrap();

        assert_eq!(record.status, WorktreeStatus::Valid);
        assert_eq!(record.branch, Some("feature/X".to_string()));
        assert_eq!(
            f.git.upstream_of("feature/X").unwrap(),
            Some("origin/feature/X".to_string())
        );
    }

    #[test]
    fn test_create_already_exists() {
        let f = fixture();
        let manager = Manager::new(&f.git, &f.config, None);
        manager
            .create("dup", Some("topic/dup"), "main", CreateOptions::default())
            .unwrap();

        let head_before = f.git.head_commit().unwrap();
        let result = manager.create("dup", Some("topic/dup2"), "main", CreateOptions::default());
        assert!(matches!(result, Err(Error::AlreadyExists(_))));

        // Zero side effects: record still valid, repo untouched
        let record = manager.validate("dup").unwrap();
        assert_eq!(record.status, WorktreeStatus::Valid);
        assert_eq!(f.git.head_commit().unwrap(), head_before);
        assert!(!f.git.branch_exists("topic/dup2").unwrap());
    }

    #[test]
    fn test_create_repairs_invalid() {
        let f = fixture();
        let manager = Manager::new(&f.git, &f.config, None);

        // A plain directory at the target path, not a registered worktree
        let path = manager.target_path("stale");
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("junk.txt"), "x").unwrap();
        assert_eq!(
            manager.validate("stale").unwrap().status,
            WorktreeStatus::Invalid
        );

        let record = manager
            .create("stale", Some("topic/stale"), "main", CreateOptions::default())
            .unwrap();
        assert_eq!(record.status, WorktreeStatus::Valid);
        assert!(!record.path.join("junk.txt").exists());
    }

    #[test]
    fn test_create_syncs_copy_files() {
        let f = fixture();
        std::fs::write(f.git.root().join(".env"), "SECRET=1").unwrap();
        let mut config = f.config.clone();
        config.copy_files = vec![".env".to_string()];

        let manager = Manager::new(&f.git, &config, None);
        let record = manager
            .create("envy", Some("topic/envy"), "main", CreateOptions::default())
            .unwrap();
        assert!(record.path.join(".env").exists());
    }

    #[test]
    fn test_create_skip_sync() {
        let f = fixture();
        std::fs::write(f.git.root().join(".env"), "SECRET=1").unwrap();
        let mut config = f.config.clone();
        config.copy_files = vec![".env".to_string()];

        let manager = Manager::new(&f.git, &config, None);
        let record = manager
            .create(
                "nosync",
                Some("topic/nosync"),
                "main",
                CreateOptions { skip_sync: true },
            )
            .unwrap();
        assert!(!record.path.join(".env").exists());
    }

    #[test]
    fn test_create_invalid_copy_pattern_non_fatal() {
        let f = fixture();
        let mut config = f.config.clone();
        config.copy_files = vec!["{bad".to_string()];

        let manager = Manager::new(&f.git, &config, None);
        let record = manager
            .create("badpat", Some("topic/badpat"), "main", CreateOptions::default())
            .unwrap();
        assert_eq!(record.status, WorktreeStatus::Valid);
    }

    #[test]
    fn test_create_invalid_copy_pattern_fatal() {
        let f = fixture();
        let mut config = f.config.clone();
        config.copy_files = vec!["{bad".to_string()];
        config.sync_failure_fatal = true;

        let manager = Manager::new(&f.git, &config, None);
        let result = manager.create(
            "badpat",
            Some("topic/badpat"),
            "main",
            CreateOptions::default(),
        );
        assert!(matches!(result, Err(Error::SyncFailed(_))));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(WorktreeStatus::Valid.to_string(), "VALID");
        assert_eq!(WorktreeStatus::Invalid.to_string(), "INVALID");
        assert_eq!(WorktreeStatus::NotFound.to_string(), "NOT_FOUND");
    }

    #[test]
    fn test_error_display() {
        let err = Error::AlreadyExists("x".into());
        assert!(err.to_string().contains("already exists"));
    }
}
