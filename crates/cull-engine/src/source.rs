#![forbid(unsafe_code)]

//! Collaborator interface to the platform media library.
//!
//! The live platform handle never crosses this boundary: the core speaks
//! only [`AssetId`] and [`AssetMetadata`], fetched once via
//! [`AssetSource::fetch_all`].

use async_trait::async_trait;
use cull_core::{AssetId, AssetMetadata};
use thiserror::Error;

use crate::{
    race::ProgressSink,
    rendition::{Rendition, RenditionQuality},
};

/// Errors produced by an asset source.
///
/// Rendition-load failures never propagate past the engine (the caller sees
/// `None` and retries on next view); [`SourceError::DeletionRejected`] is
/// surfaced through the delete-queue commit so the user can re-prompt.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("asset source unavailable: {0}")]
    Unavailable(String),

    #[error("unknown asset: {0}")]
    UnknownAsset(AssetId),

    #[error("rendition not available: {0}")]
    RenditionUnavailable(String),

    #[error("bulk deletion rejected: {0}")]
    DeletionRejected(String),
}

/// One enumerated media item.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetEntry {
    pub id: AssetId,
    pub metadata: AssetMetadata,
}

impl AssetEntry {
    pub fn new(id: impl Into<AssetId>, metadata: AssetMetadata) -> Self {
        Self {
            id: id.into(),
            metadata,
        }
    }
}

/// The consumed collaborator: enumerate items, fetch renditions, warm/cool
/// caches, delete in bulk.
///
/// `load_rendition` may publish degraded intermediate results through the
/// [`ProgressSink`] while continuing to work toward the requested quality;
/// whatever was published last is what a deadline race hands back as the
/// partial result. Deletion is expected to be atomic at this boundary:
/// either the whole batch is gone or none of it is.
#[async_trait]
pub trait AssetSource: Send + Sync + 'static {
    async fn fetch_all(&self) -> Result<Vec<AssetEntry>, SourceError>;

    async fn load_rendition(
        &self,
        id: &AssetId,
        quality: RenditionQuality,
        progress: ProgressSink<Rendition>,
    ) -> Result<Rendition, SourceError>;

    /// Hint that these ids are about to be viewed; the source may start
    /// preparing renditions. Fire-and-forget.
    fn start_warming(&self, ids: &[AssetId]);

    /// Hint that these ids left the viewing window.
    fn stop_warming(&self, ids: &[AssetId]);

    async fn delete_many(&self, ids: &[AssetId]) -> Result<(), SourceError>;
}
