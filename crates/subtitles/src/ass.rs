//! ASS (Advanced SubStation Alpha) script generation.

use montage_common::config::SubtitleStyleConfig;

const STYLE_FORMAT: &str = "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding";
const EVENT_FORMAT: &str =
    "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

/// The style record applied to every event.
#[derive(Debug, Clone, PartialEq)]
pub struct AssStyle {
    pub name: String,
    pub config: SubtitleStyleConfig,
}

impl Default for AssStyle {
    fn default() -> Self {
        Self::from_config(&SubtitleStyleConfig::default())
    }
}

impl AssStyle {
    pub fn from_config(config: &SubtitleStyleConfig) -> Self {
        Self {
            name: "Default".to_string(),
            config: config.clone(),
        }
    }

    fn to_style_line(&self) -> String {
        let c = &self.config;
        format!(
            "Style: {name},{font},{size},{primary},{secondary},{outline},{back},{bold},0,0,0,100,100,0,0,1,{outline_w},{shadow},{align},{ml},{mr},{mv},1",
            name = self.name,
            font = c.font_name,
            size = c.font_size,
            primary = c.primary_color,
            secondary = c.secondary_color,
            outline = c.outline_color,
            back = c.back_color,
            bold = if c.bold { -1 } else { 0 },
            outline_w = c.outline,
            shadow = c.shadow,
            align = c.alignment,
            ml = c.margin_l,
            mr = c.margin_r,
            mv = c.margin_v,
        )
    }
}

/// One dialogue event on the timeline clock.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEntry {
    pub clip_id: String,
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

/// Format seconds as `H:MM:SS.CC`.
///
/// Sub-centisecond fractions are truncated. Negative input clamps to zero.
pub fn format_ass_time(secs: f64) -> String {
    // A couple of ULPs absorb representation error only: 0.29 * 100 == 28.999...
    let scaled = secs.max(0.0) * 100.0;
    let total_cs = (scaled + scaled.max(1.0) * 2.0 * f64::EPSILON).floor() as u64;
    let hours = total_cs / 360_000;
    let minutes = (total_cs / 6_000) % 60;
    let seconds = (total_cs / 100) % 60;
    let centis = total_cs % 100;
    format!("{hours}:{minutes:02}:{seconds:02}.{centis:02}")
}

/// Escape text so libass renders it literally.
pub fn escape_ass_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace("\r\n", "\\N")
        .replace('\n', "\\N")
}

/// Build a complete script: header, the style record, then one dialogue
/// event per entry in the given order.
pub fn generate_ass(entries: &[SubtitleEntry], style: &AssStyle) -> String {
    let mut lines = vec![
        "[Script Info]".to_string(),
        "Title: Montage Subtitles".to_string(),
        "ScriptType: v4.00+".to_string(),
        "WrapStyle: 0".to_string(),
        "ScaledBorderAndShadow: yes".to_string(),
        String::new(),
        "[V4+ Styles]".to_string(),
        STYLE_FORMAT.to_string(),
        style.to_style_line(),
        String::new(),
        "[Events]".to_string(),
        EVENT_FORMAT.to_string(),
    ];

    lines.extend(entries.iter().map(|entry| {
        format!(
            "Dialogue: 0,{start},{end},{style},,0,0,0,,{text}",
            start = format_ass_time(entry.start_secs),
            end = format_ass_time(entry.end_secs),
            style = style.name,
            text = escape_ass_text(&entry.text),
        )
    }));

    let mut script = lines.join("\n");
    script.push('\n');
    script
}
