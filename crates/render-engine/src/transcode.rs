//! Final transcode and thumbnail invocations.

use std::path::{Path, PathBuf};

use montage_common::media::FfmpegInvocation;
use montage_project_model::Resolution;

use crate::sequencer::SequencedVideo;

/// Encoder settings for the final output.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub crf: u32,
    pub preset: String,
    pub audio_bitrate_kbps: u32,
    pub audio_sample_rate: u32,
}

/// Everything the final transcode consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodePlan {
    pub video: SequencedVideo,
    pub audio: PathBuf,
    pub subtitles: Option<PathBuf>,
    pub output: PathBuf,
    pub resolution: Resolution,
    pub fps: f64,
    /// Output length; the composed audio is padded or cut to it.
    pub duration_secs: f64,
    /// Filters contributed by transformation appliers, run before burn-in.
    pub extra_video_filters: Vec<String>,
    pub encode: EncodeSettings,
}

impl TranscodePlan {
    /// The `-filter_complex` graph, producing `[vout]` and `[aout]`.
    pub fn filter_graph(&self) -> String {
        let Resolution { width, height } = self.resolution;
        let video_in = match &self.video.graph {
            Some(_) => format!("[{}]", SequencedVideo::OUTPUT_LABEL),
            None => "[0:v]".to_string(),
        };

        let mut chain = vec![
            format!("scale={width}:{height}:force_original_aspect_ratio=decrease"),
            format!("pad={width}:{height}:(ow-iw)/2:(oh-ih)/2:color=black"),
            format!("fps={}", format_rate(self.fps)),
        ];
        chain.extend(self.extra_video_filters.iter().cloned());
        if let Some(subtitles) = &self.subtitles {
            chain.push(format!("subtitles='{}'", escape_filter_path(subtitles)));
        }
        chain.push("format=yuv420p".to_string());

        let mut graph = Vec::new();
        if let Some(sequence) = &self.video.graph {
            graph.push(sequence.clone());
        }
        graph.push(format!("{video_in}{}[vout]", chain.join(",")));
        graph.push(format!(
            "[{audio}:a]apad,atrim=duration={duration:.6}[aout]",
            audio = self.video.inputs.len(),
            duration = self.duration_secs,
        ));
        graph.join(";")
    }

    pub fn invocation(&self) -> FfmpegInvocation {
        let mut args = Vec::new();
        for input in &self.video.inputs {
            args.push("-i".to_string());
            args.push(path_arg(input));
        }
        args.push("-i".to_string());
        args.push(path_arg(&self.audio));

        args.extend([
            "-filter_complex".to_string(),
            self.filter_graph(),
            "-map".to_string(),
            "[vout]".to_string(),
            "-map".to_string(),
            "[aout]".to_string(),
            "-t".to_string(),
            format!("{:.6}", self.duration_secs),
        ]);
        args.extend(codec_args(&self.encode));
        args.push(path_arg(&self.output));

        FfmpegInvocation::new(args).with_expected_duration(self.duration_secs)
    }
}

fn codec_args(encode: &EncodeSettings) -> Vec<String> {
    vec![
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        encode.preset.clone(),
        "-crf".to_string(),
        encode.crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{}k", encode.audio_bitrate_kbps),
        "-ar".to_string(),
        encode.audio_sample_rate.to_string(),
        "-ac".to_string(),
        "2".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]
}

/// Single-frame JPEG grab from `video` at `offset_secs`.
pub fn thumbnail_invocation(video: &Path, output: &Path, offset_secs: f64) -> FfmpegInvocation {
    FfmpegInvocation::new(vec![
        "-ss".to_string(),
        format!("{:.3}", offset_secs.max(0.0)),
        "-i".to_string(),
        path_arg(video),
        "-frames:v".to_string(),
        "1".to_string(),
        "-q:v".to_string(),
        "2".to_string(),
        path_arg(output),
    ])
}

/// Offset to grab the thumbnail from: the configured offset, pulled back to
/// the middle of outputs shorter than it.
pub fn thumbnail_offset(configured_secs: f64, output_duration_secs: f64) -> f64 {
    if output_duration_secs > 0.0 && configured_secs >= output_duration_secs {
        output_duration_secs / 2.0
    } else {
        configured_secs.max(0.0)
    }
}

/// Quote a path for use inside a single-quoted filter argument.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "'\\''")
        .replace(':', "\\:")
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Frame rate as ffmpeg expects it: integral rates without a fraction.
fn format_rate(fps: f64) -> String {
    if fps.fract() == 0.0 {
        format!("{}", fps as u64)
    } else {
        format!("{fps:.3}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(subtitles: Option<&str>) -> TranscodePlan {
        TranscodePlan {
            video: SequencedVideo::single(PathBuf::from("/work/source.mp4")),
            audio: PathBuf::from("/work/audio.aac"),
            subtitles: subtitles.map(PathBuf::from),
            output: PathBuf::from("/work/output.mp4"),
            resolution: Resolution::new(1080, 1920),
            fps: 30.0,
            duration_secs: 2.0,
            extra_video_filters: vec![],
            encode: EncodeSettings {
                crf: 23,
                preset: "medium".to_string(),
                audio_bitrate_kbps: 192,
                audio_sample_rate: 44100,
            },
        }
    }

    #[test]
    fn test_scale_pad_fps_chain() {
        let graph = plan(None).filter_graph();
        assert!(graph.starts_with(
            "[0:v]scale=1080:1920:force_original_aspect_ratio=decrease,pad=1080:1920:(ow-iw)/2:(oh-ih)/2:color=black,fps=30,format=yuv420p[vout]"
        ), "{graph}");
        assert!(graph.ends_with("[1:a]apad,atrim=duration=2.000000[aout]"));
        assert!(!graph.contains("subtitles="));
    }

    #[test]
    fn test_subtitles_burned_in_after_transform_filters() {
        let mut plan = plan(Some("/work/job:1/subs.ass"));
        plan.extra_video_filters.push("hflip".to_string());
        let graph = plan.filter_graph();
        assert!(graph.contains(",hflip,subtitles='/work/job\\:1/subs.ass',"), "{graph}");
    }

    #[test]
    fn test_invocation_encodes_for_web() {
        let invocation = plan(None).invocation();
        let args = invocation.args.join(" ");
        assert!(args.starts_with("-i /work/source.mp4 -i /work/audio.aac -filter_complex"));
        assert!(args.contains("-map [vout] -map [aout] -t 2.000000"));
        assert!(args.contains("-c:v libx264 -preset medium -crf 23 -pix_fmt yuv420p"));
        assert!(args.contains("-movflags +faststart"));
        assert_eq!(invocation.output(), Some("/work/output.mp4"));
        assert_eq!(invocation.expected_duration_secs, Some(2.0));
    }

    #[test]
    fn test_sequenced_inputs_shift_audio_index() {
        let mut plan = plan(None);
        plan.video = SequencedVideo {
            inputs: vec![PathBuf::from("/a.mp4"), PathBuf::from("/b.mp4")],
            graph: Some("[0:v][1:v]concat=n=2:v=1:a=0[vseq]".to_string()),
        };
        let graph = plan.filter_graph();
        assert!(graph.starts_with("[0:v][1:v]concat=n=2:v=1:a=0[vseq];[vseq]scale="));
        assert!(graph.contains("[2:a]apad"));
    }

    #[test]
    fn test_fractional_fps() {
        let mut plan = plan(None);
        plan.fps = 29.97;
        assert!(plan.filter_graph().contains("fps=29.970"));
    }

    #[test]
    fn test_thumbnail_invocation_and_offset() {
        let invocation =
            thumbnail_invocation(Path::new("/work/out.mp4"), Path::new("/work/thumb.jpg"), 1.0);
        assert_eq!(
            invocation.args.join(" "),
            "-ss 1.000 -i /work/out.mp4 -frames:v 1 -q:v 2 /work/thumb.jpg"
        );
        assert_eq!(thumbnail_offset(1.0, 10.0), 1.0);
        assert_eq!(thumbnail_offset(1.0, 0.5), 0.25);
    }

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(
            escape_filter_path(Path::new("/path/with'quote/file.ass")),
            "/path/with'\\''quote/file.ass"
        );
    }
}
