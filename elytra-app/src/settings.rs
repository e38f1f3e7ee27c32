//! Caption table loading (JSON file, falling back to the built-in table).

use std::fs;
use std::path::Path;

use anyhow::Context;
use elytra_core::{PresentationConfig, Segment};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentFile {
    pub segments: Vec<Segment>,
}

/// Load the caption table from `path`, or the default table.
///
/// A missing or invalid file is logged and replaced by the default table:
/// the presentation always runs.
pub fn load_presentation(path: Option<&Path>) -> PresentationConfig {
    let Some(path) = path else {
        return PresentationConfig::default();
    };
    match read_segment_file(path) {
        Ok(config) => {
            info!(
                path = %path.display(),
                segments = config.segments().len(),
                "caption table loaded"
            );
            config
        }
        Err(e) => {
            warn!(path = %path.display(), "using the default caption table: {e:#}");
            PresentationConfig::default()
        }
    }
}

pub fn read_segment_file(path: &Path) -> anyhow::Result<PresentationConfig> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let file: SegmentFile = serde_json::from_str(&raw).context("parsing caption table")?;
    Ok(PresentationConfig::new(file.segments)?)
}
