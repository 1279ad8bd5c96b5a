pub mod check;
pub mod render;
pub mod resolve;
pub mod subtitles;
pub mod validate;

use std::path::Path;

use montage_project_model::Timeline;

/// Read and validate a timeline file.
pub fn load_timeline(path: &Path) -> anyhow::Result<Timeline> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    Timeline::from_json(&json).map_err(|e| anyhow::anyhow!("Failed to load timeline: {e}"))
}
