#![forbid(unsafe_code)]

use std::fmt;

/// The user's terminal classification of an asset.
///
/// Absence of a record means Unsorted; see the crate docs for why that is not
/// a fourth variant here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Keep,
    Delete,
    Favorite,
}

impl Category {
    /// Stable lowercase name, used as the persisted representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Keep => "keep",
            Category::Delete => "delete",
            Category::Favorite => "favorite",
        }
    }

    /// Inverse of [`Category::as_str`]. Returns `None` for unknown names.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "keep" => Some(Category::Keep),
            "delete" => Some(Category::Delete),
            "favorite" => Some(Category::Favorite),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate per-category record counts, derived from the record set.
///
/// Pending (staged, not yet committed) deletions are deliberately NOT folded
/// in here; the session façade exposes that number separately and lets the
/// caller decide how to combine the two.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    pub keep: u64,
    pub delete: u64,
    pub favorite: u64,
}

impl Counts {
    #[must_use]
    pub fn of(&self, category: Category) -> u64 {
        match category {
            Category::Keep => self.keep,
            Category::Delete => self.delete,
            Category::Favorite => self.favorite,
        }
    }

    pub fn record(&mut self, category: Category) {
        match category {
            Category::Keep => self.keep += 1,
            Category::Delete => self.delete += 1,
            Category::Favorite => self.favorite += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.keep + self.delete + self.favorite
    }
}
