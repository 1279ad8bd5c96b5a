//! Montage Common Utilities
//!
//! Shared infrastructure for all Montage crates:
//! - Error taxonomy and result aliases
//! - Tracing/logging initialization
//! - Configuration loading
//! - The media-tool backend (ffmpeg/ffprobe process runner)

pub mod config;
pub mod error;
pub mod logging;
pub mod media;

pub use config::*;
pub use error::*;
