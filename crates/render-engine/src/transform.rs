//! Per-clip transformations at render time.

use montage_common::error::MontageResult;
use montage_project_model::TransformationKind;
use montage_timeline_resolver::{ActiveTransformation, ResolvedFrame};

/// Turns completed transformations into video filters for the transcode.
pub trait TransformationApplier: Send + Sync {
    fn name(&self) -> &str;

    /// Filters appended after scale/pad/fps, in order.
    fn video_filters(&self, active: &[ActiveTransformation<'_>]) -> MontageResult<Vec<String>>;
}

/// Applies nothing. Transformation outputs are expected to be baked into the
/// source media by the services that produced them.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTransformations;

impl TransformationApplier for PassthroughTransformations {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn video_filters(&self, active: &[ActiveTransformation<'_>]) -> MontageResult<Vec<String>> {
        let mut kinds: Vec<TransformationKind> = Vec::new();
        for transformation in active {
            if !kinds.contains(&transformation.transformation.kind) {
                kinds.push(transformation.transformation.kind);
            }
        }
        if !kinds.is_empty() {
            tracing::info!(kinds = ?kinds, "Completed transformations are not applied at render time");
        }
        Ok(Vec::new())
    }
}

/// Unique transformations across a set of frames, keyed by clip and position.
pub fn unique_transformations<'t>(frames: &[ResolvedFrame<'t>]) -> Vec<ActiveTransformation<'t>> {
    let mut unique: Vec<ActiveTransformation<'t>> = Vec::new();
    for frame in frames {
        for active in &frame.active_transformations {
            let seen = unique.iter().any(|u| {
                std::ptr::eq(u.transformation, active.transformation)
                    && std::ptr::eq(u.clip, active.clip)
            });
            if !seen {
                unique.push(*active);
            }
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_project_model::{
        Clip, Timeline, Track, TrackKind, Transformation, TransformationStatus,
    };

    #[test]
    fn test_passthrough_contributes_no_filters() {
        let mut clip = Clip::new("v", 0.0, 1.0);
        clip.transformations.push(Transformation {
            kind: TransformationKind::FaceTransform,
            status: TransformationStatus::Completed,
            job_id: None,
            config: Default::default(),
        });
        let mut timeline = Timeline::new(1.0, 10.0);
        timeline.tracks.push(Track {
            id: None,
            kind: TrackKind::Video,
            volume: 1.0,
            muted: false,
            clips: vec![clip],
        });

        let resolved = montage_timeline_resolver::resolve(&timeline).unwrap();
        let active = unique_transformations(&resolved.frames);
        assert_eq!(active.len(), 1);
        assert!(PassthroughTransformations.video_filters(&active).unwrap().is_empty());
    }
}
