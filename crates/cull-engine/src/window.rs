#![forbid(unsafe_code)]

//! Which asset ids should currently be warm as the viewing position moves.
//!
//! The window is `[position, position + size)` clipped to the list bounds,
//! recomputed wholesale on every move and diffed against the previous set.
//! The size is a small constant: large enough to hide fetch latency for the
//! next few swipes, small enough to bound memory.

use std::collections::HashSet;

use cull_core::AssetId;

/// Default number of upcoming items kept warm.
pub const DEFAULT_WINDOW_SIZE: usize = 6;

/// Start/stop sets produced by one window move.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WindowDiff {
    /// Entered the window: start warming.
    pub to_start: Vec<AssetId>,
    /// Left the window: stop warming, cancel preloads, evict renditions.
    pub to_stop: Vec<AssetId>,
}

/// Tracks the current warm set across window moves.
#[derive(Debug)]
pub struct CacheWindow {
    size: usize,
    warm: HashSet<AssetId>,
}

impl CacheWindow {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            warm: HashSet::new(),
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Current warm set.
    pub fn warm(&self) -> &HashSet<AssetId> {
        &self.warm
    }

    /// Move to `position` within `order`, replacing the warm set and
    /// returning the diff against the previous one.
    pub fn advance(&mut self, position: usize, order: &[AssetId]) -> WindowDiff {
        let end = position.saturating_add(self.size).min(order.len());
        let next: HashSet<AssetId> = order
            .get(position..end)
            .unwrap_or(&[])
            .iter()
            .cloned()
            .collect();

        let to_stop: Vec<AssetId> = self.warm.difference(&next).cloned().collect();
        let to_start: Vec<AssetId> = next.difference(&self.warm).cloned().collect();
        self.warm = next;

        WindowDiff { to_start, to_stop }
    }

    /// Drop everything from the window; returns the ids to stop warming.
    pub fn clear(&mut self) -> Vec<AssetId> {
        self.warm.drain().collect()
    }
}
