#![forbid(unsafe_code)]

use std::{fmt, time::Duration};

use bytes::Bytes;
use cull_core::AssetId;

/// Quality class of a fetched rendition.
///
/// Each class carries its own fetch deadline (see [`DeadlineConfig`]):
/// thumbnails are expected to be local and cheap, full-resolution and motion
/// renditions may have to come over the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenditionQuality {
    Thumbnail,
    Preview,
    Full,
    Motion,
}

impl RenditionQuality {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RenditionQuality::Thumbnail => "thumbnail",
            RenditionQuality::Preview => "preview",
            RenditionQuality::Full => "full",
            RenditionQuality::Motion => "motion",
        }
    }
}

impl fmt::Display for RenditionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fetched visual representation of an asset at some quality level.
#[derive(Clone, Debug, PartialEq)]
pub struct Rendition {
    pub asset: AssetId,
    pub quality: RenditionQuality,
    pub data: Bytes,
}

impl Rendition {
    pub fn new(asset: AssetId, quality: RenditionQuality, data: impl Into<Bytes>) -> Self {
        Self {
            asset,
            quality,
            data: data.into(),
        }
    }
}

/// Per-quality-class fetch deadlines.
#[derive(Clone, Copy, Debug)]
pub struct DeadlineConfig {
    pub thumbnail: Duration,
    pub preview: Duration,
    pub full: Duration,
    pub motion: Duration,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            thumbnail: Duration::from_millis(800),
            preview: Duration::from_secs(3),
            full: Duration::from_secs(8),
            motion: Duration::from_secs(12),
        }
    }
}

impl DeadlineConfig {
    #[must_use]
    pub fn deadline_for(&self, quality: RenditionQuality) -> Duration {
        match quality {
            RenditionQuality::Thumbnail => self.thumbnail,
            RenditionQuality::Preview => self.preview,
            RenditionQuality::Full => self.full,
            RenditionQuality::Motion => self.motion,
        }
    }
}
