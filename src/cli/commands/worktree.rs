// ===========================================================================
// gws worktree - Create & Validate Worktrees
// ===========================================================================

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::cli::{Result, EXIT_FAILURE, EXIT_SUCCESS};
use crate::worktree::{CreateOptions, Manager, WorktreeRecord, WorktreeStatus};

use super::{display_path, print_report, Context};

#[derive(Args)]
pub struct CreateArgs {
    /// Worktree name, e.g. a ticket id like PROJ-123
    name: String,

    /// Branch to check out (default: derived from the ticket in NAME)
    #[arg(short, long)]
    branch: Option<String>,

    /// Project root (default: current directory)
    #[arg(long, value_name = "DIR")]
    project_root: Option<PathBuf>,

    /// Base branch for brand-new branches (default: configured or detected trunk)
    #[arg(long, value_name = "BRANCH")]
    base: Option<String>,

    /// Skip copying auxiliary config files into the worktree
    #[arg(long)]
    skip_sync: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Worktree name to inspect
    name: String,

    /// Project root (default: current directory)
    #[arg(long, value_name = "DIR")]
    project_root: Option<PathBuf>,
}

#[derive(Serialize)]
struct CreateReport {
    name: String,
    path: String,
    branch: Option<String>,
    ticket: Option<String>,
    project_root: String,
    status: WorktreeStatus,
}

#[derive(Serialize)]
struct ValidateReport {
    name: String,
    status: WorktreeStatus,
    path: String,
    branch: Option<String>,
    ticket: Option<String>,
    exists: bool,
    is_worktree: bool,
}

pub fn create(args: CreateArgs) -> Result<i32> {
    let ctx = Context::load(args.project_root.as_deref())?;
    let base = ctx.base_branch(args.base.as_deref())?;

    // Without an explicit branch the ticket config is the only branch
    // source, so its absence is a hard configuration error here
    let patterns = if args.branch.is_none() {
        Some(ctx.require_patterns()?)
    } else {
        ctx.optional_patterns()?
    };

    let manager = Manager::new(&ctx.git, &ctx.config, patterns.as_ref());
    let record = manager.create(
        &args.name,
        args.branch.as_deref(),
        &base,
        CreateOptions {
            skip_sync: args.skip_sync,
        },
    )?;

    eprintln!(
        "Created worktree '{}' at {} on branch {}",
        record.name,
        record.path.display(),
        record.branch.as_deref().unwrap_or("(unknown)")
    );

    print_report(&CreateReport {
        name: record.name.clone(),
        path: display_path(&record.path),
        branch: record.branch.clone(),
        ticket: record.ticket.clone(),
        project_root: display_path(&ctx.git.root().to_path_buf()),
        status: record.status,
    })?;

    Ok(match record.status {
        WorktreeStatus::Valid => EXIT_SUCCESS,
        _ => EXIT_FAILURE,
    })
}

pub fn validate(args: ValidateArgs) -> Result<i32> {
    let ctx = Context::load(args.project_root.as_deref())?;
    let patterns = ctx.optional_patterns()?;

    let manager = Manager::new(&ctx.git, &ctx.config, patterns.as_ref());
    let record = manager.validate(&args.name)?;

    print_report(&to_validate_report(&record))?;

    // Only a fully valid worktree counts as success for scripting
    Ok(match record.status {
        WorktreeStatus::Valid => EXIT_SUCCESS,
        _ => EXIT_FAILURE,
    })
}

fn to_validate_report(record: &WorktreeRecord) -> ValidateReport {
    ValidateReport {
        name: record.name.clone(),
        status: record.status,
        path: display_path(&record.path),
        branch: record.branch.clone(),
        ticket: record.ticket.clone(),
        exists: record.path.exists(),
        is_worktree: record.status == WorktreeStatus::Valid,
    }
}
