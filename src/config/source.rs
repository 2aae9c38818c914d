//! Location of the CarReport database snapshots.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory holding snapshot files. The lexicographically last one is read.
    #[validate(custom(function = "validate_db_root"))]
    pub db_root: PathBuf,

    /// Only consider files with this extension (without the dot). Empty means any file.
    pub extension: String,
}

fn validate_db_root(path: &PathBuf) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::new("empty_db_root")
            .with_message("source.db_root must point to the snapshot directory".into()));
    }
    Ok(())
}

impl SourceConfig {
    pub fn extension_filter(&self) -> Option<&str> {
        let ext = self.extension.trim_start_matches('.');
        (!ext.is_empty()).then_some(ext)
    }
}
