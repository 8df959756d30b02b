use std::path::Path;

use serde::Deserialize;

use crate::transparency::reference::BackgroundSampling;

/// 32 MiB, the upload ceiling of the signing service.
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tolerance: u8,
    pub background_sampling: BackgroundSampling,
    pub compress: bool,
    pub prune_objects: bool,
    pub max_input_bytes: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            tolerance: 30,
            background_sampling: BackgroundSampling::Anchor,
            compress: true,
            prune_objects: true,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        serde_yml::from_str(yaml).map_err(|e| {
            crate::error::SignError::config(format!("Failed to parse settings YAML: {e}"))
        })
    }

    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}
