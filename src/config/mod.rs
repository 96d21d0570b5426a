// ===========================================================================
// config - Configuration Loading & Merging
// ===========================================================================

use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("home directory not found")]
    NoHome,
}

pub const PROJECT_FILE: &str = ".gws.toml";

// ---------------------------------------------------------------------------
// Global Config (~/.gws/config.toml)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub general: GeneralConfig,
}

// ---------------------------------------------------------------------------
// Project Config (.gws.toml)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub general: ProjectGeneralConfig,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub copy_files: Vec<String>,

    #[serde(default)]
    pub sync_failure_fatal: bool,

    pub remote: Option<String>,

    pub command_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProjectGeneralConfig {
    pub trunk: Option<String>,

    pub remote: Option<String>,

    #[serde(default)]
    pub copy_files: Vec<String>,

    pub sync_failure_fatal: Option<bool>,
}

// ---------------------------------------------------------------------------
// Merged Config (runtime)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub base_dir: PathBuf,
    pub worktrees_dir: PathBuf,
    pub copy_files: Vec<String>,
    pub trunk: Option<String>,
    pub remote: String,
    /// Whether an auxiliary-file sync failure aborts worktree creation.
    pub sync_failure_fatal: bool,
    pub command_timeout_secs: u64,
}

const DEFAULT_REMOTE: &str = "origin";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

impl Config {
    /// Load and merge global + project config; project overrides global.
    pub fn load(project_root: &Path) -> Result<Self> {
        let base_dir = Self::base_dir()?;
        Self::load_from(project_root, base_dir)
    }

    pub fn load_from(project_root: &Path, base_dir: PathBuf) -> Result<Self> {
        let worktrees_dir = base_dir.join("worktrees");

        let global = Self::load_global(&base_dir)?;
        let project = Self::load_project(project_root)?;

        let mut copy_files = global.general.copy_files;
        copy_files.extend(project.general.copy_files);

        let remote = project
            .general
            .remote
            .or(global.general.remote)
            .unwrap_or_else(|| DEFAULT_REMOTE.to_string());

        let sync_failure_fatal = project
            .general
            .sync_failure_fatal
            .unwrap_or(global.general.sync_failure_fatal);

        Ok(Self {
            base_dir,
            worktrees_dir,
            copy_files,
            trunk: project.general.trunk,
            remote,
            sync_failure_fatal,
            command_timeout_secs: global
                .general
                .command_timeout_secs
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Base directory for global config and worktrees.
    ///
    /// GWS_HOME overrides the default for sandboxed or scripted setups.
    pub fn base_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os("GWS_HOME") {
            return Ok(PathBuf::from(dir));
        }
        let base = BaseDirs::new().ok_or(Error::NoHome)?;
        Ok(base.home_dir().join(".gws"))
    }

    fn load_global(base_dir: &Path) -> Result<GlobalConfig> {
        let path = base_dir.join("config.toml");
        if !path.exists() {
            return Ok(GlobalConfig::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    fn load_project(project_root: &Path) -> Result<ProjectConfig> {
        let path = project_root.join(PROJECT_FILE);
        if !path.exists() {
            return Ok(ProjectConfig::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}
