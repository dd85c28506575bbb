#![forbid(unsafe_code)]

//! # cull
//!
//! Facade crate for the media-triage core: one [`TriageSession`] combining
//! the decision store (`cull-store`) and the asset cache/load engine
//! (`cull-engine`) behind the small operation surface the UI layer calls.
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use cull::prelude::*;
//!
//! let source = Arc::new(MyAssetSource::connect()?);
//! let session = TriageSession::open(source, SessionOptions::persistent("triage.db"));
//! session.refresh().await?;
//!
//! session.assign(&id, Category::Keep);
//! session.stage(&other_id);
//! session.advance_to(1);
//! let rendition = session.load(&next_id, RenditionQuality::Preview).await;
//! ```

// ── Re-export sub-crates ────────────────────────────────────────────────

pub use cull_core::{AssetId, AssetMetadata, Category, Counts, MediaKind};

pub mod engine {
    pub use cull_engine::*;
}

pub mod store {
    pub use cull_store::*;
}

// ── Session ─────────────────────────────────────────────────────────────

mod session;

pub use session::{SessionOptions, TriageSession};

// ── Prelude ─────────────────────────────────────────────────────────────

pub mod prelude {
    pub use cull_core::{AssetId, AssetMetadata, Category, Counts, MediaKind};
    pub use cull_engine::{AssetSource, Rendition, RenditionQuality, SourceError};
    pub use cull_store::{Durability, StoreError};

    pub use crate::session::{SessionOptions, TriageSession};
}
