//! Frame-by-frame timeline resolution.
//!
//! Frame `f` samples the timeline at `t = f / fps`. A clip is active at `t`
//! when `startTime <= t < startTime + duration`. Clips are swept per track in
//! start order, so each frame only looks at the clips that are currently
//! active instead of every clip on the timeline.

use std::collections::HashSet;

use montage_common::error::{MontageError, MontageResult};
use montage_project_model::{Clip, Timeline, Track, TrackKind, Transformation};

/// A clip active at a frame instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveClip<'t> {
    pub clip: &'t Clip,
    pub track: &'t Track,
    /// Index of the owning track in the timeline.
    pub track_index: usize,
    /// Index of the clip within its track.
    pub clip_index: usize,
    /// Seconds elapsed since the clip started.
    pub local_time_secs: f64,
}

/// A completed transformation on an active video clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveTransformation<'t> {
    pub transformation: &'t Transformation,
    pub clip: &'t Clip,
}

/// Everything active at one frame instant.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFrame<'t> {
    pub frame_number: u64,
    pub timestamp_secs: f64,
    pub active_video_clips: Vec<ActiveClip<'t>>,
    pub active_audio_clips: Vec<ActiveClip<'t>>,
    pub active_subtitle_clips: Vec<ActiveClip<'t>>,
    pub active_transformations: Vec<ActiveTransformation<'t>>,
}

impl<'t> ResolvedFrame<'t> {
    fn empty(frame_number: u64, timestamp_secs: f64) -> Self {
        Self {
            frame_number,
            timestamp_secs,
            active_video_clips: Vec::new(),
            active_audio_clips: Vec::new(),
            active_subtitle_clips: Vec::new(),
            active_transformations: Vec::new(),
        }
    }

    /// Active clips of one track type.
    pub fn active(&self, kind: TrackKind) -> &[ActiveClip<'t>] {
        match kind {
            TrackKind::Video => &self.active_video_clips,
            TrackKind::Audio => &self.active_audio_clips,
            TrackKind::Subtitle => &self.active_subtitle_clips,
        }
    }

    fn bucket_mut(&mut self, kind: TrackKind) -> &mut Vec<ActiveClip<'t>> {
        match kind {
            TrackKind::Video => &mut self.active_video_clips,
            TrackKind::Audio => &mut self.active_audio_clips,
            TrackKind::Subtitle => &mut self.active_subtitle_clips,
        }
    }
}

/// The full frame plan of a timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTimeline<'t> {
    pub frames: Vec<ResolvedFrame<'t>>,
    pub total_frames: u64,
    pub fps: f64,
}

impl<'t> ResolvedTimeline<'t> {
    /// Every clip of `kind` that is active in at least one frame, once,
    /// ordered by start time. `local_time_secs` is taken from the first
    /// frame the clip is active in.
    pub fn unique_clips(&self, kind: TrackKind) -> Vec<ActiveClip<'t>> {
        let mut seen = HashSet::new();
        let mut clips: Vec<ActiveClip<'t>> = self
            .frames
            .iter()
            .flat_map(|frame| frame.active(kind).iter().copied())
            .filter(|active| seen.insert((active.track_index, active.clip_index)))
            .collect();

        clips.sort_by(|a, b| {
            a.clip
                .start_time
                .total_cmp(&b.clip.start_time)
                .then(a.track_index.cmp(&b.track_index))
                .then(a.clip_index.cmp(&b.clip_index))
        });
        clips
    }

    /// Source clips of the video tracks, in the order they should be played.
    pub fn video_sources(&self) -> Vec<ActiveClip<'t>> {
        self.unique_clips(TrackKind::Video)
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Resolves timelines into frame plans.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineResolver;

impl TimelineResolver {
    pub fn new() -> Self {
        Self
    }

    /// Build the frame plan. Fails when two clips of one video track are
    /// active in the same frame, or when the timeline exceeds the frame limit.
    pub fn resolve<'t>(&self, timeline: &'t Timeline) -> MontageResult<ResolvedTimeline<'t>> {
        let total_frames = timeline.bounded_total_frames()?;
        let fps = timeline.fps;

        let mut sweeps: Vec<TrackSweep<'t>> = timeline
            .tracks
            .iter()
            .enumerate()
            .map(|(index, track)| TrackSweep::new(index, track))
            .collect();

        let mut frames = Vec::with_capacity(total_frames as usize);
        for frame_number in 0..total_frames {
            let t = frame_number as f64 / fps;
            let mut frame = ResolvedFrame::empty(frame_number, t);

            for sweep in &mut sweeps {
                sweep.advance_to(t);
                if sweep.track.kind == TrackKind::Video {
                    sweep.check_exclusive(frame_number)?;
                }
                let track: &'t Track = sweep.track;
                let track_index = sweep.track_index;
                frame.bucket_mut(track.kind).extend(sweep.active.iter().map(|&clip_index| {
                    let clip = &track.clips[clip_index];
                    ActiveClip {
                        clip,
                        track,
                        track_index,
                        clip_index,
                        local_time_secs: t - clip.start_time,
                    }
                }));
            }

            frames.push(frame);
        }

        for frame in &mut frames {
            let transformations: Vec<ActiveTransformation<'t>> = frame
                .active_video_clips
                .iter()
                .flat_map(|active| {
                    active
                        .clip
                        .completed_transformations()
                        .map(move |transformation| ActiveTransformation {
                            transformation,
                            clip: active.clip,
                        })
                })
                .collect();
            frame.active_transformations = transformations;
        }

        tracing::debug!(
            frames = total_frames,
            fps,
            tracks = timeline.tracks.len(),
            "Resolved timeline"
        );

        Ok(ResolvedTimeline {
            frames,
            total_frames,
            fps,
        })
    }
}

/// Resolve with the default resolver.
pub fn resolve(timeline: &Timeline) -> MontageResult<ResolvedTimeline<'_>> {
    TimelineResolver::new().resolve(timeline)
}

/// Sweep state for one track: a frontier over clips sorted by start time and
/// the set of clips active at the last sampled instant.
struct TrackSweep<'t> {
    track_index: usize,
    track: &'t Track,
    order: Vec<usize>,
    frontier: usize,
    active: Vec<usize>,
}

impl<'t> TrackSweep<'t> {
    fn new(track_index: usize, track: &'t Track) -> Self {
        let mut order: Vec<usize> = (0..track.clips.len()).collect();
        order.sort_by(|&a, &b| {
            track.clips[a]
                .start_time
                .total_cmp(&track.clips[b].start_time)
                .then(a.cmp(&b))
        });
        Self {
            track_index,
            track,
            order,
            frontier: 0,
            active: Vec::new(),
        }
    }

    /// Admit clips that have started by `t` and retire those that ended.
    /// `t` must not decrease between calls.
    fn advance_to(&mut self, t: f64) {
        while let Some(&next) = self.order.get(self.frontier) {
            if self.track.clips[next].start_time > t {
                break;
            }
            self.active.push(next);
            self.frontier += 1;
        }
        let clips = &self.track.clips;
        self.active.retain(|&i| clips[i].is_active_at(t));
    }

    fn check_exclusive(&self, frame_number: u64) -> MontageResult<()> {
        if let [first, second, ..] = self.active[..] {
            return Err(MontageError::configuration(format!(
                "conflicting video clips '{}' and '{}' on track {} at frame {}",
                self.track.clips[first].clip_id,
                self.track.clips[second].clip_id,
                self.track_index,
                frame_number
            )));
        }
        Ok(())
    }
}
