#![forbid(unsafe_code)]

use std::time::SystemTime;

use cull_core::{AssetId, Category};

/// One live category assignment. At most one record exists per asset id.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryRecord {
    pub asset: AssetId,
    pub category: Category,
    pub assigned_at: SystemTime,
}

impl CategoryRecord {
    pub fn new(asset: AssetId, category: Category) -> Self {
        Self {
            asset,
            category,
            assigned_at: SystemTime::now(),
        }
    }
}

/// A reversible record of one category transition.
///
/// `previous == None` means the asset was Unsorted before the transition;
/// undoing such an entry deletes the record instead of re-assigning.
#[derive(Clone, Debug, PartialEq)]
pub struct UndoEntry {
    pub asset: AssetId,
    pub previous: Option<Category>,
    pub new: Category,
    pub recorded_at: SystemTime,
}

impl UndoEntry {
    pub fn new(asset: AssetId, previous: Option<Category>, new: Category) -> Self {
        Self {
            asset,
            previous,
            new,
            recorded_at: SystemTime::now(),
        }
    }
}
