// ===========================================================================
// gws commit - Fold External Mutations into History
// ===========================================================================
//
// Intended to run after an external process (a hook, a formatter) rewrote
// tracked files: amend when the last commit is safely ours, otherwise add a
// new commit.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::cli::{Result, EXIT_SUCCESS};
use crate::commit::{MutationOutcome, Policy};

use super::{print_report, Context};

#[derive(Args)]
pub struct CommitArgs {
    /// Repository path (default: current directory)
    #[arg(long, value_name = "DIR")]
    path: Option<PathBuf>,

    /// Require an amend; fail instead of creating a new commit
    #[arg(long)]
    amend: bool,
}

#[derive(Serialize)]
struct CommitReport {
    outcome: MutationOutcome,
    amend_safe: bool,
}

pub fn run(args: CommitArgs) -> Result<i32> {
    let ctx = Context::load(args.path.as_deref())?;
    let policy = Policy::new(&ctx.git);

    let amend_safe = policy.should_amend()?;

    let outcome = if args.amend {
        policy.amend()?;
        MutationOutcome::Amended
    } else {
        policy.on_external_mutation()?
    };

    match outcome {
        MutationOutcome::Amended => eprintln!("Amended the last commit."),
        MutationOutcome::Committed => eprintln!("Created a new commit (amend not safe)."),
        MutationOutcome::NoChanges => eprintln!("No tracked modifications to record."),
    }

    print_report(&CommitReport {
        outcome,
        amend_safe,
    })?;
    Ok(EXIT_SUCCESS)
}
