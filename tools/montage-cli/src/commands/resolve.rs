//! Resolve a timeline into its frame plan.

use std::path::PathBuf;

use montage_project_model::TrackKind;
use montage_timeline_resolver::{ActiveClip, TimelineResolver};

use super::load_timeline;

pub fn run(path: PathBuf, frames: bool) -> anyhow::Result<()> {
    let timeline = load_timeline(&path)?;
    let resolved = TimelineResolver::new()
        .resolve(&timeline)
        .map_err(|e| anyhow::anyhow!("Failed to resolve timeline: {e}"))?;

    println!(
        "Resolved {} frames at {} fps",
        resolved.total_frames, resolved.fps
    );
    for kind in [TrackKind::Video, TrackKind::Audio, TrackKind::Subtitle] {
        let clips = resolved.unique_clips(kind);
        println!("  {} ({}):", kind.as_str(), clips.len());
        for active in &clips {
            println!(
                "    {} [{:.3}s, {:.3}s) track {}",
                active.clip.clip_id,
                active.clip.start_time,
                active.clip.end_time(),
                active.track_index
            );
        }
    }

    if frames {
        println!();
        for frame in &resolved.frames {
            println!(
                "{:>6} {:>9.3}s  video=[{}] audio=[{}] subtitle=[{}] transformations={}",
                frame.frame_number,
                frame.timestamp_secs,
                ids(&frame.active_video_clips),
                ids(&frame.active_audio_clips),
                ids(&frame.active_subtitle_clips),
                frame.active_transformations.len()
            );
        }
    }

    Ok(())
}

fn ids(clips: &[ActiveClip<'_>]) -> String {
    clips
        .iter()
        .map(|active| active.clip.clip_id.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
