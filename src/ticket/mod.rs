// ===========================================================================
// ticket - Ticket Pattern Provider
// ===========================================================================
//
// Ticket prefixes come from a JSON document of shape
// {"instances":[{"prefixes":["PROJ", ...]}]}, looked up project-local first
// (.gws/tickets.json) and then globally (~/.gws/tickets.json). A missing or
// malformed document is a configuration error, never a silent default.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ticket pattern config not found (looked for {0}); create it with an \"instances\" list of prefix groups")]
    NotFound(PathBuf),

    #[error("invalid ticket pattern config at {0}: {1}")]
    Invalid(PathBuf, String),

    #[error("ticket pattern config at {0} defines no prefixes")]
    Empty(PathBuf),

    #[error("io error reading {0}: {1}")]
    Io(PathBuf, std::io::Error),
}

pub const CONFIG_FILE: &str = "tickets.json";

#[derive(Debug, Deserialize)]
struct PatternDoc {
    instances: Vec<PatternInstance>,
}

#[derive(Debug, Deserialize)]
struct PatternInstance {
    #[serde(default)]
    prefixes: Vec<String>,
}

/// An extracted ticket token, e.g. "PROJ-123".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket(pub String);

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Compiled ticket matcher, independent of any command output.
#[derive(Debug, Clone)]
pub struct TicketPatterns {
    regex: Regex,
}

impl TicketPatterns {
    /// Load patterns for a project, preferring the project-local document.
    pub fn load(project_root: &Path, global_dir: &Path) -> Result<Self> {
        let local = project_root.join(".gws").join(CONFIG_FILE);
        let global = global_dir.join(CONFIG_FILE);

        if local.exists() {
            Self::load_file(&local)
        } else if global.exists() {
            Self::load_file(&global)
        } else {
            Err(Error::NotFound(local))
        }
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::Io(path.to_path_buf(), e))?;
        let doc: PatternDoc = serde_json::from_str(&content)
            .map_err(|e| Error::Invalid(path.to_path_buf(), e.to_string()))?;

        let prefixes: Vec<String> = doc
            .instances
            .iter()
            .flat_map(|i| i.prefixes.iter())
            .filter(|p| !p.is_empty())
            .cloned()
            .collect();

        if prefixes.is_empty() {
            return Err(Error::Empty(path.to_path_buf()));
        }

        Self::from_prefixes(&prefixes)
            .map_err(|e| Error::Invalid(path.to_path_buf(), e.to_string()))
    }

    /// Compile prefixes into a single `(P1|P2|...)-<digits>` matcher.
    pub fn from_prefixes(prefixes: &[String]) -> std::result::Result<Self, regex::Error> {
        let escaped: Vec<String> = prefixes.iter().map(|p| regex::escape(p)).collect();
        let pattern = format!(r"\b({})-[0-9]+\b", escaped.join("|"));
        Ok(Self {
            regex: Regex::new(&pattern)?,
        })
    }

    /// Extract the first ticket token from a name, if any.
    pub fn extract_ticket(&self, name: &str) -> Option<Ticket> {
        self.regex.find(name).map(|m| Ticket(m.as_str().to_string()))
    }

    /// True if `text` contains a ticket token equal to `ticket`.
    pub fn matches(&self, text: &str, ticket: &str) -> bool {
        self.extract_ticket(text)
            .is_some_and(|t| t.0.eq_ignore_ascii_case(ticket))
    }
}
