//! Validate a timeline document.

use std::path::PathBuf;

use montage_project_model::TrackKind;
use montage_timeline_resolver::AssetDependencies;

use super::load_timeline;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating timeline at: {}", path.display());

    let timeline = load_timeline(&path)?;

    println!("  Duration: {:.3}s", timeline.duration_secs);
    println!("  FPS: {}", timeline.fps);
    println!("  Frames: {}", timeline.total_frames());
    if let Some(format) = timeline.format {
        println!("  Format: {format}");
    }
    for kind in [TrackKind::Video, TrackKind::Audio, TrackKind::Subtitle] {
        let clips: usize = timeline.tracks_of(kind).map(|(_, t)| t.clips.len()).sum();
        println!("  {} clips: {clips}", kind.as_str());
    }

    let deps = AssetDependencies::collect(&timeline);
    if !deps.audio.is_empty() {
        println!("  Audio assets:");
        for pointer in &deps.audio {
            println!("    - {pointer}");
        }
    }

    if timeline.has_video() {
        println!("\nTimeline is valid.");
    } else {
        println!("\nTimeline is valid but has no video clips; it cannot be rendered.");
    }

    Ok(())
}
