#![forbid(unsafe_code)]

use std::{fmt, time::Duration, time::SystemTime};

/// Opaque stable identifier for one media item in the user's collection.
///
/// The underlying platform handle never crosses into the core; higher layers
/// mint an id string once (from whatever the platform provides) and the core
/// only ever compares, hashes and stores it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Broad media classification of an asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Photo,
    Video,
    /// Live/looping capture: a photo with an attached motion clip.
    Motion,
}

/// Narrow per-asset metadata, fetched once when the collection is enumerated.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetMetadata {
    pub kind: MediaKind,
    /// Playback duration for videos and motion clips.
    pub duration: Option<Duration>,
    pub created_at: Option<SystemTime>,
    /// Burst/group identifier shared by assets captured together.
    pub group_id: Option<String>,
}

impl AssetMetadata {
    pub fn photo() -> Self {
        Self {
            kind: MediaKind::Photo,
            duration: None,
            created_at: None,
            group_id: None,
        }
    }

    pub fn video(duration: Duration) -> Self {
        Self {
            kind: MediaKind::Video,
            duration: Some(duration),
            created_at: None,
            group_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_id_is_stable_and_comparable() {
        let a = AssetId::new("IMG_0001");
        let b = AssetId::from("IMG_0001");
        let c = AssetId::new("IMG_0002");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "IMG_0001");
        assert!(a < c);
    }

    #[test]
    fn metadata_constructors() {
        assert_eq!(AssetMetadata::photo().kind, MediaKind::Photo);

        let video = AssetMetadata::video(Duration::from_secs(12));
        assert_eq!(video.kind, MediaKind::Video);
        assert_eq!(video.duration, Some(Duration::from_secs(12)));
    }
}
