use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::cleaning::{CleaningThresholds, DefaultLocationCleaning};
use crate::error::{CResult, CaptureError};
use crate::metrics::AscendParameters;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Tunables for post-processing and export. Missing fields in a config file
/// fall back to [`Default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    // ── Location cleaning ──
    pub cleaning: CleaningThresholds,

    // ── Ascend ──
    pub ascend: AscendParameters,

    // ── Transfer ──
    pub compress: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            cleaning: CleaningThresholds::default(),
            ascend: AscendParameters::default(),
            compress: false,
        }
    }
}

impl CaptureConfig {
    pub fn load(path: &Path) -> CResult<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            CaptureError::InvalidArgument(format!("Invalid config {}: {}", path.display(), e))
        })
    }

    /// Defaults when no file is given
    pub fn load_or_default(path: Option<&Path>) -> CResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn cleaning_strategy(&self) -> DefaultLocationCleaning {
        DefaultLocationCleaning::new(self.cleaning)
    }
}
