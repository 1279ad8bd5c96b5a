//! Output formats and pixel resolutions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Aspect ratio preset of the rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoFormat {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    Square,
}

impl VideoFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            VideoFormat::Landscape => "16:9",
            VideoFormat::Portrait => "9:16",
            VideoFormat::Square => "1:1",
        }
    }

    /// Resolution used when a request does not carry one.
    pub fn default_resolution(self) -> Resolution {
        match self {
            VideoFormat::Landscape => Resolution::new(1920, 1080),
            VideoFormat::Portrait => Resolution::new(1080, 1920),
            VideoFormat::Square => Resolution::new(1080, 1080),
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoFormat {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "16:9" => Ok(VideoFormat::Landscape),
            "9:16" => Ok(VideoFormat::Portrait),
            "1:1" => Ok(VideoFormat::Square),
            other => Err(ModelError::invalid_field(
                "format",
                format!("unsupported aspect ratio '{other}', expected 16:9, 9:16 or 1:1"),
            )),
        }
    }
}

/// Output frame size in pixels. Serialized as `"<W>x<H>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse `"<W>x<H>"`. Both dimensions must be positive and even, as
    /// required by yuv420p chroma subsampling.
    pub fn parse(s: &str) -> Result<Self, ModelError> {
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(|| {
            ModelError::invalid_field("resolution", format!("expected WxH, got '{s}'"))
        })?;

        let width = parse_dimension(w, s)?;
        let height = parse_dimension(h, s)?;
        Ok(Self { width, height })
    }
}

fn parse_dimension(part: &str, whole: &str) -> Result<u32, ModelError> {
    let value: u32 = part.trim().parse().map_err(|_| {
        ModelError::invalid_field("resolution", format!("invalid dimension in '{whole}'"))
    })?;
    if value == 0 || value % 2 != 0 {
        return Err(ModelError::invalid_field(
            "resolution",
            format!("dimensions must be positive and even, got '{whole}'"),
        ));
    }
    Ok(value)
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Resolution {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Resolution {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_resolutions() {
        assert_eq!(VideoFormat::Landscape.default_resolution().to_string(), "1920x1080");
        assert_eq!(VideoFormat::Portrait.default_resolution().to_string(), "1080x1920");
        assert_eq!(VideoFormat::Square.default_resolution().to_string(), "1080x1080");
    }

    #[test]
    fn test_parse_resolution() {
        assert_eq!(Resolution::parse("1280x720").unwrap(), Resolution::new(1280, 720));
        assert_eq!(Resolution::parse(" 720X1280 ").unwrap(), Resolution::new(720, 1280));
    }

    #[test]
    fn test_rejects_odd_zero_and_malformed() {
        for bad in ["1281x720", "0x720", "1280", "axb", "1280x-2", ""] {
            let err = Resolution::parse(bad).unwrap_err();
            assert!(
                matches!(err, ModelError::InvalidField { field: "resolution", .. }),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_format_wire_names() {
        let json = serde_json::to_string(&VideoFormat::Portrait).unwrap();
        assert_eq!(json, "\"9:16\"");
        let parsed: VideoFormat = serde_json::from_str("\"1:1\"").unwrap();
        assert_eq!(parsed, VideoFormat::Square);
        assert!("4:3".parse::<VideoFormat>().is_err());
    }

    #[test]
    fn test_resolution_serde_as_string() {
        let json = serde_json::to_string(&Resolution::new(1920, 1080)).unwrap();
        assert_eq!(json, "\"1920x1080\"");
        assert!(serde_json::from_str::<Resolution>("\"3x3\"").is_err());
    }
}
