// ===========================================================================
// gws sync - Rebase a branch onto its base
// ===========================================================================

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::cli::{Result, EXIT_FAILURE, EXIT_SUCCESS};
use crate::inspect::{AheadBehind, Inspector};
use crate::sync::{Engine, Error as SyncError, Resolution, SyncMode};

use super::{print_report, Context};

#[derive(Args)]
pub struct SyncArgs {
    /// Repository path (default: current directory)
    #[arg(long, value_name = "DIR")]
    path: Option<PathBuf>,

    /// Branch to sync (default: resolve via --pattern, else current branch)
    #[arg(short, long)]
    branch: Option<String>,

    /// Ticket pattern to locate the branch, e.g. PROJ-123
    #[arg(short, long, conflicts_with = "branch")]
    pattern: Option<String>,

    /// Base branch to rebase onto (default: configured or detected trunk)
    #[arg(long, value_name = "BRANCH")]
    base: Option<String>,

    /// Conflict handling mode
    #[arg(long, value_enum, default_value_t = SyncMode::Interactive)]
    mode: SyncMode,

    /// Report branch state without mutating anything
    #[arg(long)]
    status: bool,
}

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum SyncOutput {
    Synced {
        branch: String,
        base: String,
        onto: String,
        mode: SyncMode,
    },
    AlreadyMerged {
        branch: String,
        base: String,
    },
    Conflict {
        branch: String,
        base: String,
        mode: SyncMode,
        files: Vec<String>,
    },
}

#[derive(Serialize)]
struct StatusOutput {
    branch: String,
    locality: String,
    upstream: Option<String>,
    ahead: Option<usize>,
    behind: Option<usize>,
    clean: bool,
}

pub fn run(args: SyncArgs) -> Result<i32> {
    let ctx = Context::load(args.path.as_deref())?;
    let base = ctx.base_branch(args.base.as_deref())?;

    if args.status {
        return status(&ctx, args.branch.as_deref());
    }

    // Patterns are mandatory only when resolving by pattern
    let patterns = if args.pattern.is_some() {
        Some(ctx.require_patterns()?)
    } else {
        ctx.optional_patterns()?
    };

    let engine = Engine::new(&ctx.git, &ctx.config.remote, patterns.as_ref());

    let branch = match engine.resolve(args.branch.as_deref(), args.pattern.as_deref(), &base)? {
        Resolution::AlreadyMerged { branch, base } => {
            eprintln!("Branch '{branch}' is already merged into '{base}'; nothing to sync.");
            print_report(&SyncOutput::AlreadyMerged { branch, base })?;
            return Ok(EXIT_FAILURE);
        }
        Resolution::Branch(branch) => branch,
    };

    eprintln!("Syncing '{branch}' onto '{base}' ({} mode)...", args.mode);

    match engine.sync(&branch, &base, args.mode) {
        Ok(report) => {
            eprintln!("Rebased '{}' onto '{}'.", report.branch, report.onto);
            print_report(&SyncOutput::Synced {
                branch: report.branch,
                base: report.base,
                onto: report.onto,
                mode: report.mode,
            })?;
            Ok(EXIT_SUCCESS)
        }
        Err(SyncError::RebaseConflict {
            branch,
            mode,
            files,
        }) => {
            match mode {
                SyncMode::Agent => {
                    eprintln!("Rebase conflicted; aborted, branch restored to its previous tip.");
                }
                SyncMode::Interactive => {
                    eprintln!("Rebase conflicted; resolve the files below, then run");
                    eprintln!("`git rebase --continue` (or `git rebase --abort`).");
                }
            }
            print_report(&SyncOutput::Conflict {
                branch,
                base,
                mode,
                files,
            })?;
            Ok(EXIT_FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

/// Non-mutating state summary for a branch (default: the current one).
fn status(ctx: &Context, branch: Option<&str>) -> Result<i32> {
    let branch = match branch {
        Some(b) => b.to_string(),
        None => ctx.git.current_branch()?,
    };

    let inspector = Inspector::new(&ctx.git, &ctx.config.remote);
    let locality = inspector.locality(&branch)?;
    let (ahead, behind) = match inspector.ahead_behind(&branch)? {
        AheadBehind::NoUpstream => (None, None),
        AheadBehind::Counts { ahead, behind } => (Some(ahead), Some(behind)),
    };

    print_report(&StatusOutput {
        locality: locality.to_string(),
        upstream: ctx.git.upstream_of(&branch)?,
        ahead,
        behind,
        clean: inspector.is_working_tree_clean()?,
        branch,
    })?;
    Ok(EXIT_SUCCESS)
}
