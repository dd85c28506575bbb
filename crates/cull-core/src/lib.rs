#![forbid(unsafe_code)]

//! # cull-core
//!
//! Shared vocabulary types for the cull media-triage core.
//!
//! This crate is a leaf: no async, no I/O, no locking. It defines the
//! identifiers and classifications every other `cull-*` crate speaks in:
//! [`AssetId`], [`AssetMetadata`], [`Category`] and the derived [`Counts`]
//! aggregate.
//!
//! ## Unsorted is absence
//!
//! There is deliberately no `Unsorted` variant on [`Category`]. An asset the
//! user has not classified yet simply has no record, and every lookup in the
//! system returns `Option<Category>`. This keeps an invalid default state
//! out of the aggregate counts.

mod asset;
mod category;

pub use asset::{AssetId, AssetMetadata, MediaKind};
pub use category::{Category, Counts};
