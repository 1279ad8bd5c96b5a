//! Montage Subtitles
//!
//! Renders the subtitle clips of a resolved timeline into an ASS script for
//! burn-in: one global style, one dialogue event per clip.

pub mod ass;
pub mod renderer;

pub use ass::{escape_ass_text, format_ass_time, generate_ass, AssStyle, SubtitleEntry};
pub use renderer::{ClipTextResolver, SubtitleRenderer, SubtitleTextResolver};
