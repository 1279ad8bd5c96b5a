//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Parent directory for per-job temporary workspaces.
    pub workspace_dir: PathBuf,

    /// Object store settings.
    pub store: StoreConfig,

    /// Render defaults.
    pub render: RenderDefaults,

    /// Global subtitle style.
    pub subtitles: SubtitleStyleConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Filesystem-backed object store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory that holds one sub-directory per bucket.
    pub root: PathBuf,

    /// Bucket that produced artifacts are published to.
    pub bucket: String,

    /// Retry policy for transient store failures.
    pub retry: RetryPolicy,
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retries.
    pub max_attempts: u32,

    /// Delay before the second attempt; doubled for each further attempt.
    pub initial_backoff_ms: u64,
}

/// Default render parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Sample rate of the composed audio stream.
    pub audio_sample_rate: u32,

    /// AAC bitrate in kbps.
    pub audio_bitrate_kbps: u32,

    /// x264 constant rate factor.
    pub crf: u32,

    /// x264 preset.
    pub preset: String,

    /// Where in the output the thumbnail frame is taken from.
    pub thumbnail_offset_secs: f64,

    /// Length of the silent placeholder emitted when there is no audio.
    pub silence_secs: f64,

    /// ffmpeg binary (name in PATH or absolute path).
    pub ffmpeg_path: String,

    /// ffprobe binary (name in PATH or absolute path).
    pub ffprobe_path: String,
}

/// The single style record applied to every subtitle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleStyleConfig {
    pub font_name: String,
    pub font_size: u32,
    /// ASS colour (`&HBBGGRR`).
    pub primary_color: String,
    pub secondary_color: String,
    pub outline_color: String,
    pub back_color: String,
    pub bold: bool,
    pub outline: u32,
    pub shadow: u32,
    /// Numpad layout: 1-3 bottom, 4-6 middle, 7-9 top.
    pub alignment: u8,
    pub margin_l: u32,
    pub margin_r: u32,
    pub margin_v: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "montage=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace_dir: std::env::temp_dir(),
            store: StoreConfig::default(),
            render: RenderDefaults::default(),
            subtitles: SubtitleStyleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: dirs_default_store(),
            bucket: "montage".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            audio_sample_rate: 44100,
            audio_bitrate_kbps: 192,
            crf: 23,
            preset: "medium".to_string(),
            thumbnail_offset_secs: 1.0,
            silence_secs: 1.0,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

impl Default for SubtitleStyleConfig {
    fn default() -> Self {
        Self {
            font_name: "Arial".to_string(),
            font_size: 24,
            primary_color: "&Hffffff".to_string(),
            secondary_color: "&Hffffff".to_string(),
            outline_color: "&H0".to_string(),
            back_color: "&H0".to_string(),
            bold: false,
            outline: 2,
            shadow: 0,
            alignment: 2,
            margin_l: 10,
            margin_r: 10,
            margin_v: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("montage").join("config.json")
}

/// Default object store root.
fn dirs_default_store() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("montage").join("store")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"render": {"crf": 18}, "store": {"bucket": "renders"}}"#)
                .unwrap();
        assert_eq!(config.render.crf, 18);
        assert_eq!(config.render.preset, "medium");
        assert_eq!(config.render.audio_sample_rate, 44100);
        assert_eq!(config.store.bucket, "renders");
        assert_eq!(config.store.retry.max_attempts, 3);
        assert_eq!(config.subtitles.font_name, "Arial");
    }

    #[test]
    fn test_malformed_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config.render.crf, 23);
        assert!((config.render.thumbnail_offset_secs - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.json"));
        assert_eq!(config.logging.level, "info");
    }
}
