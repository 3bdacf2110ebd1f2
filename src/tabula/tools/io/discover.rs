use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::tabula::tools::error::{Result, ToolError};

/// File-name filter used to find sources inside a directory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourcePattern {
    /// Required file-name prefix, e.g. `sales_`.
    pub prefix: String,
    /// Required extension without the dot, compared case-insensitively.
    pub extension: String,
}

impl SourcePattern {
    pub fn new(prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            extension: extension.into(),
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };
        let extension_matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension));
        // Lock files left behind by spreadsheet applications.
        let is_lock_file = name.starts_with("~$");
        name.starts_with(&self.prefix) && extension_matches && !is_lock_file
    }
}

/// Lists the regular files in `directory` matching `pattern`, sorted by file
/// name. An empty result is not an error; the caller decides how to report it.
pub fn discover_sources(directory: &Path, pattern: &SourcePattern) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(directory).map_err(|err| ToolError::SourceUnavailable {
        location: directory.display().to_string(),
        reason: err.to_string(),
    })?;

    let mut sources = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && pattern.matches(&path) {
            sources.push(path);
        }
    }
    sources.sort_by(|lhs, rhs| lhs.file_name().cmp(&rhs.file_name()));

    debug!(
        directory = %directory.display(),
        prefix = %pattern.prefix,
        extension = %pattern.extension,
        count = sources.len(),
        "sources discovered"
    );
    Ok(sources)
}
