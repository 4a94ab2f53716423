//! Category grouping and artifact statistics
//!
//! The Categories table and the header statistics both go through
//! [`group_by_category`], so they can never disagree.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{Collection, RawRecord, ResolvedEntry, ResolvedEntrySet};

/// Bucket for records without a category.
pub const DEFAULT_CATEGORY: &str = "Other";

/// The record's category, or [`DEFAULT_CATEGORY`] when absent or blank.
pub fn category_of(record: &RawRecord) -> &str {
    match record.category.as_deref().map(str::trim) {
        Some(category) if !category.is_empty() => category,
        _ => DEFAULT_CATEGORY,
    }
}

/// Group entries by category. Categories and the entries inside each are
/// ordered by name.
pub fn group_by_category<'a, I>(entries: I) -> BTreeMap<String, Vec<&'a ResolvedEntry>>
where
    I: IntoIterator<Item = &'a ResolvedEntry>,
{
    let mut groups: BTreeMap<String, Vec<&'a ResolvedEntry>> = BTreeMap::new();
    for entry in entries {
        groups
            .entry(category_of(&entry.record).to_string())
            .or_default()
            .push(entry);
    }
    for members in groups.values_mut() {
        members.sort_by(|a, b| a.final_name.cmp(&b.final_name));
    }
    groups
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub entries: usize,
    pub aliases: usize,
    pub collisions: usize,
    pub diagnostics: usize,
}

/// Counts reported in the artifact header and by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactStats {
    pub collections: BTreeMap<Collection, CollectionStats>,
    pub categories: usize,
}

impl ArtifactStats {
    pub fn from_sets(sets: &BTreeMap<Collection, ResolvedEntrySet>) -> Self {
        let collections = Collection::ALL
            .iter()
            .map(|c| {
                let stats = sets
                    .get(c)
                    .map(|set| CollectionStats {
                        entries: set.len(),
                        aliases: set.aliases().count(),
                        collisions: set.collisions.len(),
                        diagnostics: set.diagnostics.len(),
                    })
                    .unwrap_or_default();
                (*c, stats)
            })
            .collect();

        let categories = sets
            .get(&Collection::Operations)
            .map(|ops| group_by_category(&ops.entries).len())
            .unwrap_or(0);

        Self {
            collections,
            categories,
        }
    }

    pub fn get(&self, collection: Collection) -> CollectionStats {
        self.collections
            .get(&collection)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_collisions(&self) -> usize {
        self.collections.values().map(|s| s.collisions).sum()
    }

    pub fn total_diagnostics(&self) -> usize {
        self.collections.values().map(|s| s.diagnostics).sum()
    }
}
