//! Write the subtitle track of a timeline as an ASS script.

use std::path::PathBuf;

use montage_common::config::AppConfig;
use montage_project_model::TrackKind;
use montage_subtitles::{AssStyle, SubtitleRenderer};
use montage_timeline_resolver::TimelineResolver;

use super::load_timeline;

pub async fn run(path: PathBuf, output: PathBuf, config: &AppConfig) -> anyhow::Result<()> {
    let timeline = load_timeline(&path)?;
    let resolved = TimelineResolver::new()
        .resolve(&timeline)
        .map_err(|e| anyhow::anyhow!("Failed to resolve timeline: {e}"))?;

    let clips = resolved.unique_clips(TrackKind::Subtitle);
    let renderer = SubtitleRenderer::new(AssStyle::from_config(&config.subtitles));
    match renderer.render_styled_subtitles(&clips, &output).await? {
        Some(artifact) => println!("Subtitles written: {}", artifact.path.display()),
        None => println!("No subtitle text in timeline; nothing written."),
    }

    Ok(())
}
