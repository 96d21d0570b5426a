// ===========================================================================
// copysync - Auxiliary File Sync into Worktrees
// ===========================================================================
//
// Copies untracked-but-needed files (.env and friends) from the project root
// into a freshly created worktree. Patterns are gitignore-style; per-file
// failures are collected rather than aborting so callers can apply their own
// fatality policy.

use std::path::{Path, PathBuf};

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid copy pattern '{0}': {1}")]
    Pattern(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Complete { copied: usize },
    Partial { copied: usize, failures: Vec<String> },
}

impl SyncOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, SyncOutcome::Complete { .. })
    }
}

/// Copy files matching `patterns` from `from` into `to`.
///
/// Patterns work like .gitignore: "*.env" matches everywhere, "/.env"
/// matches only the root.
pub fn sync_files(from: &Path, to: &Path, patterns: &[String]) -> Result<SyncOutcome> {
    if patterns.is_empty() {
        return Ok(SyncOutcome::Complete { copied: 0 });
    }

    let mut builder = OverrideBuilder::new(from);
    for pattern in patterns {
        builder
            .add(pattern)
            .map_err(|e| Error::Pattern(pattern.clone(), e.to_string()))?;
    }
    let overrides = builder
        .build()
        .map_err(|e| Error::Pattern(patterns.join(","), e.to_string()))?;

    // Don't apply .gitignore: the point is copying ignored files
    let walker = WalkBuilder::new(from)
        .overrides(overrides)
        .standard_filters(false)
        .build();

    let mut copied = 0;
    let mut failures = Vec::new();

    for entry in walker.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let rel = match path.strip_prefix(from) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        // Never drag repository metadata across
        if rel.starts_with(".git") {
            continue;
        }

        match copy_one(path, rel, to) {
            Ok(()) => copied += 1,
            Err(e) => failures.push(format!("{}: {e}", rel.display())),
        }
    }

    if failures.is_empty() {
        Ok(SyncOutcome::Complete { copied })
    } else {
        Ok(SyncOutcome::Partial { copied, failures })
    }
}

fn copy_one(src: &Path, rel: &Path, to: &Path) -> std::io::Result<()> {
    let dest: PathBuf = to.join(rel);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(src, &dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sync_files_no_patterns() {
        let from = tempdir().unwrap();
        let to = tempdir().unwrap();
        let outcome = sync_files(from.path(), to.path(), &[]).unwrap();
        assert_eq!(outcome, SyncOutcome::Complete { copied: 0 });
    }

    #[test]
    fn test_sync_files_copies_matching() {
        let from = tempdir().unwrap();
        let to = tempdir().unwrap();
        std::fs::write(from.path().join(".env"), "SECRET=1").unwrap();
        std::fs::write(from.path().join("code.rs"), "fn main() {}").unwrap();

        let outcome = sync_files(from.path(), to.path(), &[".env".to_string()]).unwrap();
        assert_eq!(outcome, SyncOutcome::Complete { copied: 1 });
        assert!(to.path().join(".env").exists());
        assert!(!to.path().join("code.rs").exists());
    }

    #[test]
    fn test_sync_files_nested() {
        let from = tempdir().unwrap();
        let to = tempdir().unwrap();
        std::fs::create_dir_all(from.path().join("config")).unwrap();
        std::fs::write(from.path().join("config").join("local.env"), "X=1").unwrap();

        let outcome = sync_files(from.path(), to.path(), &["*.env".to_string()]).unwrap();
        assert_eq!(outcome, SyncOutcome::Complete { copied: 1 });
        assert!(to.path().join("config").join("local.env").exists());
    }

    #[test]
    fn test_sync_files_skips_git_dir() {
        let from = tempdir().unwrap();
        let to = tempdir().unwrap();
        std::fs::create_dir_all(from.path().join(".git")).unwrap();
        std::fs::write(from.path().join(".git").join("config"), "x").unwrap();

        let outcome = sync_files(from.path(), to.path(), &["*".to_string()]).unwrap();
        assert!(outcome.is_complete());
        assert!(!to.path().join(".git").exists());
    }

    #[test]
    fn test_sync_files_invalid_pattern() {
        let from = tempdir().unwrap();
        let to = tempdir().unwrap();
        let result = sync_files(from.path(), to.path(), &["{bad".to_string()]);
        assert!(matches!(result, Err(Error::Pattern(_, _))));
    }

    #[test]
    fn test_outcome_is_complete() {
        assert!(SyncOutcome::Complete { copied: 3 }.is_complete());
        assert!(!SyncOutcome::Partial {
            copied: 1,
            failures: vec!["x".into()]
        }
        .is_complete());
    }
}
