#![forbid(unsafe_code)]

//! # cull-engine
//!
//! The asset cache/load engine: fetches renditions of media items from a
//! slow, possibly network-backed [`AssetSource`], never hangs indefinitely,
//! tolerates mid-flight cancellation, and keeps a moving window of
//! likely-to-be-viewed-next items warm in a bounded in-memory cache.
//!
//! ## Pieces
//!
//! - [`LoadRace`] / [`LoadTicket`]: race a slow operation against a deadline
//!   and a cancellation token, delivering the best partial result exactly
//!   once.
//! - [`CacheWindow`]: which asset ids should currently be warm as the
//!   viewing position moves; recomputed wholesale and diffed.
//! - [`AssetCacheEngine`]: ties the two together over an [`AssetSource`],
//!   with bounded preloading of upcoming items.
//!
//! Fetch failures are not hard errors here: a timeout or cancellation
//! resolves to `None` (or a partial rendition) and the UI shows a
//! placeholder and retries on the next view.

mod engine;
mod race;
mod rendition;
mod source;
mod window;

pub use engine::{AssetCacheEngine, EngineOptions};
pub use race::{LoadRace, LoadTicket, ProgressSink, RaceOutcome};
pub use rendition::{DeadlineConfig, Rendition, RenditionQuality};
pub use source::{AssetEntry, AssetSource, SourceError};
pub use window::{CacheWindow, WindowDiff, DEFAULT_WINDOW_SIZE};
