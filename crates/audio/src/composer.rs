//! Audio mixing through ffmpeg.
//!
//! Every resolved clip becomes one input that is trimmed to the clip length,
//! delayed to the clip start and attenuated by its track's gain. Inputs are
//! summed with `amix` (`normalize=0`), so the mix lasts as long as the
//! latest-ending input.

use std::path::{Path, PathBuf};

use montage_common::config::RenderDefaults;
use montage_common::error::MontageResult;
use montage_common::media::{FfmpegInvocation, MediaBackend};
use montage_project_model::{ArtifactKind, CompositionArtifact};
use montage_timeline_resolver::ActiveClip;
use tokio_util::sync::CancellationToken;

use crate::source::AudioSourceResolver;

/// Gain in dB applied for a track volume.
///
/// Volumes below unity attenuate by `20 * (volume - 1)` dB; unity and above
/// are passed through at 0 dB. Tracks are never boosted.
pub fn gain_db(volume: f64) -> f64 {
    if volume < 1.0 {
        20.0 * (volume - 1.0)
    } else {
        0.0
    }
}

/// One clip that made it into the mix.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInput {
    pub clip_id: String,
    pub path: PathBuf,
    pub delay_ms: u64,
    pub gain_db: f64,
    pub duration_secs: f64,
}

impl AudioInput {
    /// Where the input ends on the timeline.
    pub fn end_secs(&self) -> f64 {
        self.delay_ms as f64 / 1000.0 + self.duration_secs
    }

    fn filter(&self, index: usize, label: &str) -> String {
        format!(
            "[{index}:a]atrim=duration={duration:.6},asetpts=PTS-STARTPTS,adelay={delay}|{delay},volume={gain:.2}dB[{label}]",
            duration = self.duration_secs,
            delay = self.delay_ms,
            gain = self.gain_db,
        )
    }
}

/// What the composer will run for a set of clips.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioMixPlan {
    /// Inputs in start order.
    pub inputs: Vec<AudioInput>,
    /// Clips left out of the mix.
    pub dropped: Vec<String>,
}

impl AudioMixPlan {
    /// True when nothing resolved and a silent placeholder is produced.
    pub fn is_silent(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Length of the mix: the latest end among the inputs.
    pub fn mix_duration_secs(&self) -> f64 {
        self.inputs
            .iter()
            .map(AudioInput::end_secs)
            .fold(0.0, f64::max)
    }

    /// The `-filter_complex` graph, ending in `[aout]`. `None` when silent.
    pub fn filter_graph(&self) -> Option<String> {
        match self.inputs.as_slice() {
            [] => None,
            [single] => Some(single.filter(0, "aout")),
            inputs => {
                let mut parts: Vec<String> = inputs
                    .iter()
                    .enumerate()
                    .map(|(index, input)| input.filter(index, &format!("a{index}")))
                    .collect();
                let labels: String = (0..inputs.len()).map(|i| format!("[a{i}]")).collect();
                parts.push(format!(
                    "{labels}amix=inputs={count}:duration=longest:normalize=0:dropout_transition=0[aout]",
                    count = inputs.len(),
                ));
                Some(parts.join(";"))
            }
        }
    }
}

/// Builds and runs audio mixes.
#[derive(Debug, Clone)]
pub struct AudioComposer {
    sample_rate: u32,
    bitrate_kbps: u32,
    silence_secs: f64,
}

impl Default for AudioComposer {
    fn default() -> Self {
        Self::from_defaults(&RenderDefaults::default())
    }
}

impl AudioComposer {
    pub fn new(sample_rate: u32, bitrate_kbps: u32, silence_secs: f64) -> Self {
        Self {
            sample_rate,
            bitrate_kbps,
            silence_secs,
        }
    }

    pub fn from_defaults(defaults: &RenderDefaults) -> Self {
        Self::new(
            defaults.audio_sample_rate,
            defaults.audio_bitrate_kbps,
            defaults.silence_secs,
        )
    }

    /// Resolve sources and compute timing and gain for every clip.
    ///
    /// Clips on muted tracks are left out. Clips whose audio cannot be
    /// resolved are dropped with a warning; they never fail the plan.
    pub fn plan(&self, clips: &[ActiveClip<'_>], resolver: &dyn AudioSourceResolver) -> AudioMixPlan {
        let mut ordered: Vec<&ActiveClip<'_>> = clips.iter().collect();
        ordered.sort_by(|a, b| a.clip.start_time.total_cmp(&b.clip.start_time));

        let mut plan = AudioMixPlan::default();
        for active in ordered {
            let clip = active.clip;
            if active.track.muted {
                tracing::debug!(clip_id = %clip.clip_id, "Skipping clip on muted track");
                plan.dropped.push(clip.clip_id.clone());
                continue;
            }

            let path = match resolver.resolve(clip) {
                Ok(Some(path)) => path,
                Ok(None) => {
                    tracing::warn!(clip_id = %clip.clip_id, "Audio clip has no audio source, dropping");
                    plan.dropped.push(clip.clip_id.clone());
                    continue;
                }
                Err(err) => {
                    tracing::warn!(clip_id = %clip.clip_id, error = %err, "Failed to resolve audio clip, dropping");
                    plan.dropped.push(clip.clip_id.clone());
                    continue;
                }
            };

            plan.inputs.push(AudioInput {
                clip_id: clip.clip_id.clone(),
                path,
                delay_ms: (clip.start_time * 1000.0).floor() as u64,
                gain_db: gain_db(active.track.volume),
                duration_secs: clip.duration,
            });
        }

        plan
    }

    /// ffmpeg invocation that renders `plan` to `output`.
    pub fn invocation(&self, plan: &AudioMixPlan, output: &Path) -> FfmpegInvocation {
        let mut args: Vec<String> = Vec::new();

        let expected = match plan.filter_graph() {
            None => {
                args.extend([
                    "-f".to_string(),
                    "lavfi".to_string(),
                    "-i".to_string(),
                    format!("anullsrc=r={}:cl=stereo", self.sample_rate),
                    "-t".to_string(),
                    format!("{:.6}", self.silence_secs),
                ]);
                self.silence_secs
            }
            Some(graph) => {
                for input in &plan.inputs {
                    args.push("-i".to_string());
                    args.push(input.path.to_string_lossy().into_owned());
                }
                args.extend([
                    "-filter_complex".to_string(),
                    graph,
                    "-map".to_string(),
                    "[aout]".to_string(),
                ]);
                plan.mix_duration_secs()
            }
        };

        args.extend([
            "-ac".to_string(),
            "2".to_string(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", self.bitrate_kbps),
            output.to_string_lossy().into_owned(),
        ]);

        FfmpegInvocation::new(args).with_expected_duration(expected)
    }

    /// Mix `clips` into `output`. An empty or fully dropped clip list yields
    /// a silent placeholder of the configured length.
    pub async fn compose(
        &self,
        clips: &[ActiveClip<'_>],
        resolver: &dyn AudioSourceResolver,
        output: &Path,
        backend: &dyn MediaBackend,
        cancel: &CancellationToken,
    ) -> MontageResult<CompositionArtifact> {
        let plan = self.plan(clips, resolver);
        let invocation = self.invocation(&plan, output);

        if plan.is_silent() {
            tracing::info!(
                silence_secs = self.silence_secs,
                dropped = plan.dropped.len(),
                "No audio clips resolved, generating silence"
            );
        } else {
            tracing::info!(
                inputs = plan.inputs.len(),
                dropped = plan.dropped.len(),
                duration_secs = plan.mix_duration_secs(),
                "Composing audio"
            );
        }

        backend.run(&invocation, cancel, None).await?;

        let duration = invocation
            .expected_duration_secs
            .unwrap_or(self.silence_secs);
        Ok(CompositionArtifact::new(output, ArtifactKind::Audio).with_duration(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_common::error::MontageError;
    use montage_project_model::{Clip, Track, TrackKind};

    struct FixedResolver;

    impl AudioSourceResolver for FixedResolver {
        fn resolve(&self, clip: &Clip) -> MontageResult<Option<PathBuf>> {
            match clip.clip_id.as_str() {
                "missing" => Ok(None),
                "broken" => Err(MontageError::asset_resolution("not fetched")),
                id => Ok(Some(PathBuf::from(format!("/work/{id}.wav")))),
            }
        }
    }

    fn audio_track(volume: f64, clips: Vec<Clip>) -> Track {
        Track {
            id: None,
            kind: TrackKind::Audio,
            volume,
            muted: false,
            clips,
        }
    }

    fn actives(track: &Track) -> Vec<ActiveClip<'_>> {
        track
            .clips
            .iter()
            .enumerate()
            .map(|(clip_index, clip)| ActiveClip {
                clip,
                track,
                track_index: 0,
                clip_index,
                local_time_secs: 0.0,
            })
            .collect()
    }

    #[test]
    fn test_gain_rule() {
        assert_eq!(gain_db(1.0), 0.0);
        assert_eq!(gain_db(2.0), 0.0);
        assert_eq!(gain_db(0.5), -10.0);
        assert_eq!(gain_db(0.0), -20.0);
    }

    #[test]
    fn test_unity_volume_single_clip_has_no_attenuation() {
        let track = audio_track(1.0, vec![Clip::new("voice", 0.0, 2.0)]);
        let plan = AudioComposer::default().plan(&actives(&track), &FixedResolver);

        assert_eq!(plan.inputs.len(), 1);
        assert_eq!(plan.inputs[0].gain_db, 0.0);
        assert_eq!(plan.inputs[0].delay_ms, 0);
        let graph = plan.filter_graph().unwrap();
        assert!(graph.contains("volume=0.00dB"), "{graph}");
        assert!(!graph.contains("amix"), "single input must not be mixed: {graph}");
        assert!(graph.ends_with("[aout]"));
    }

    #[test]
    fn test_half_volume_attenuates_ten_db() {
        let track = audio_track(0.5, vec![Clip::new("voice", 0.5, 0.5)]);
        let plan = AudioComposer::default().plan(&actives(&track), &FixedResolver);

        assert_eq!(plan.inputs[0].gain_db, -10.0);
        assert_eq!(plan.inputs[0].delay_ms, 500);
        let graph = plan.filter_graph().unwrap();
        assert!(graph.contains("adelay=500|500"), "{graph}");
        assert!(graph.contains("volume=-10.00dB"), "{graph}");
    }

    #[test]
    fn test_multiple_inputs_are_summed_in_start_order() {
        let track = audio_track(
            1.0,
            vec![Clip::new("late", 2.0, 1.5), Clip::new("early", 0.25, 1.0)],
        );
        let plan = AudioComposer::default().plan(&actives(&track), &FixedResolver);

        let ids: Vec<&str> = plan.inputs.iter().map(|i| i.clip_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert!((plan.mix_duration_secs() - 3.5).abs() < 1e-9);

        let graph = plan.filter_graph().unwrap();
        assert!(graph.contains(
            "[a0][a1]amix=inputs=2:duration=longest:normalize=0:dropout_transition=0[aout]"
        ));
        assert!(graph.starts_with("[0:a]atrim=duration=1.000000"));
    }

    #[test]
    fn test_unresolved_and_muted_clips_are_dropped() {
        let track = audio_track(
            1.0,
            vec![
                Clip::new("missing", 0.0, 1.0),
                Clip::new("broken", 0.5, 1.0),
                Clip::new("kept", 1.0, 1.0),
            ],
        );
        let plan = AudioComposer::default().plan(&actives(&track), &FixedResolver);
        assert_eq!(plan.inputs.len(), 1);
        assert_eq!(plan.dropped, vec!["missing", "broken"]);

        let mut muted = audio_track(1.0, vec![Clip::new("kept", 0.0, 1.0)]);
        muted.muted = true;
        let plan = AudioComposer::default().plan(&actives(&muted), &FixedResolver);
        assert!(plan.is_silent());
    }

    #[test]
    fn test_delay_is_floored_to_milliseconds() {
        let track = audio_track(1.0, vec![Clip::new("voice", 1.2345, 1.0)]);
        let plan = AudioComposer::default().plan(&actives(&track), &FixedResolver);
        assert_eq!(plan.inputs[0].delay_ms, 1234);
    }

    #[test]
    fn test_silence_invocation() {
        let composer = AudioComposer::new(48000, 128, 1.0);
        let invocation = composer.invocation(&AudioMixPlan::default(), Path::new("/work/audio.aac"));

        assert!(invocation.args.contains(&"anullsrc=r=48000:cl=stereo".to_string()));
        assert!(invocation.args.contains(&"128k".to_string()));
        assert_eq!(invocation.output(), Some("/work/audio.aac"));
        assert_eq!(invocation.expected_duration_secs, Some(1.0));
    }
}
