//! Asset addressing in the object store.
//!
//! Assets are referenced as `store://<bucket>/<key>`. Produced artifacts are
//! keyed under `users/<user>/projects/<project>/<category>/<name>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

const SCHEME: &str = "store://";

/// Pointer to an object in a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetRef {
    pub bucket: String,
    pub key: String,
}

impl AssetRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, ModelError> {
        let rest = s.trim().strip_prefix(SCHEME).ok_or_else(|| {
            ModelError::invalid_field("sourceRef", format!("'{s}' is not a {SCHEME} address"))
        })?;
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        let key = key.trim_start_matches('/');

        if bucket.is_empty() || key.is_empty() {
            return Err(ModelError::invalid_field(
                "sourceRef",
                format!("'{s}' must name both a bucket and a key"),
            ));
        }
        if key.split('/').any(|segment| segment == "..") {
            return Err(ModelError::invalid_field(
                "sourceRef",
                format!("'{s}' escapes its bucket"),
            ));
        }

        Ok(Self::new(bucket, key))
    }

    /// Last path segment of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.bucket, self.key)
    }
}

impl FromStr for AssetRef {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for AssetRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AssetRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Project segment used when a job is not attached to a saved project.
pub const TEMP_PROJECT: &str = "temp";

/// Category of a published artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactCategory {
    Renders,
    Thumbnails,
}

impl ArtifactCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactCategory::Renders => "renders",
            ArtifactCategory::Thumbnails => "thumbnails",
        }
    }
}

/// Object key under which an artifact is published.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    pub fn new(
        user_id: &str,
        project_id: Option<&str>,
        category: ArtifactCategory,
        name: &str,
    ) -> Self {
        let project = project_id
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(TEMP_PROJECT);
        Self(format!(
            "users/{}/projects/{}/{}/{}",
            sanitize_segment(user_id),
            sanitize_segment(project),
            category.as_str(),
            sanitize_segment(name)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_asset(self, bucket: impl Into<String>) -> AssetRef {
        AssetRef::new(bucket, self.0)
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keep ids from introducing extra path segments.
fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_asset_ref() {
        let asset = AssetRef::parse("store://media/users/u1/clip.mp4").unwrap();
        assert_eq!(asset.bucket, "media");
        assert_eq!(asset.key, "users/u1/clip.mp4");
        assert_eq!(asset.file_name(), "clip.mp4");
        assert_eq!(asset.to_string(), "store://media/users/u1/clip.mp4");
    }

    #[test]
    fn test_rejects_incomplete_refs() {
        for bad in [
            "media/clip.mp4",
            "store://",
            "store://media",
            "store://media/",
            "store:///clip.mp4",
            "store://media/../secret",
        ] {
            assert!(AssetRef::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_artifact_key_layout() {
        let key = ArtifactKey::new("u1", Some("p9"), ArtifactCategory::Renders, "job-1.mp4");
        assert_eq!(key.as_str(), "users/u1/projects/p9/renders/job-1.mp4");

        let temp = ArtifactKey::new("u1", None, ArtifactCategory::Thumbnails, "job-1.jpg");
        assert_eq!(temp.as_str(), "users/u1/projects/temp/thumbnails/job-1.jpg");
    }

    #[test]
    fn test_artifact_key_sanitizes_segments() {
        let key = ArtifactKey::new("../evil", Some("a/b"), ArtifactCategory::Renders, "x.mp4");
        assert_eq!(key.as_str(), "users/.._evil/projects/a_b/renders/x.mp4");
        assert_eq!(
            ArtifactKey::new("..", None, ArtifactCategory::Renders, "x").as_str(),
            "users/_/projects/temp/renders/x"
        );
    }
}
