// ===========================================================================
// git-workspace - Git Workspace State Engine
// ===========================================================================

pub mod cli;
pub mod commit;
pub mod config;
pub mod copysync;
pub mod git;
pub mod inspect;
pub mod sync;
pub mod ticket;
pub mod worktree;

pub use config::Config;
