use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Repository settings, stored as TOML next to the object directory.
///
/// Missing keys take their default, so a config file only needs the values
/// it changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Author recorded on commits that do not name one, including the
    /// commits created by conflict-free merges.
    pub author: String,
    /// Refuse to commit a conflicted merge until every conflicting node was
    /// edited, deleted, or explicitly resolved.
    pub require_resolution: bool,
    /// zstd level for the file-backed object store.
    pub compression_level: i32,
    /// Default number of entries shown by `log`.
    pub log_limit: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            author: "anonymous".into(),
            require_resolution: false,
            compression_level: 3,
            log_limit: 20,
        }
    }
}

impl RepositoryConfig {
    /// Read `path`, falling back to the defaults when the file is absent.
    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| SdkError::Config(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> SdkResult<()> {
        let text = toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))?;
        fs::write(path, text)?;
        Ok(())
    }
}
