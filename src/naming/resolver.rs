//! Collision resolver
//!
//! Two phases over one collection:
//!
//! 1. **Census** - sanitize every primary key and alias key. Both share one
//!    name space; the census records every candidate and how many primary
//!    keys want it.
//! 2. **Assignment** - walk records in the order given (never reordered
//!    here), give each primary and then each of its aliases a final name,
//!    and claim it before moving on. The first record to reach a name keeps
//!    it bare; later ones are suffixed.
//!
//! Both phases are plain functions over explicit state; nothing is shared
//! between calls.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::sanitize::sanitize;
use crate::model::{
    Collection, CollisionKind, CollisionRecord, NamingDiagnostic, RawRecord, ResolvedEntry,
    ResolvedEntrySet,
};

/// Stand-in candidate for keys that sanitize to nothing.
pub const DEGENERATE_NAME: &str = "_";

const PRIMARY_SUFFIX: &str = "_";
const ALIAS_SUFFIX: &str = "_ALIAS_";

/// Every candidate in the collection, mapped to how many primary keys
/// produce it. Candidates produced only by aliases map to zero.
type Census = BTreeMap<String, usize>;

/// Candidate name for a key, and whether the degenerate fallback was used.
fn candidate_for(key: &str) -> (String, bool) {
    let name = sanitize(key);
    if name.is_empty() {
        (DEGENERATE_NAME.to_string(), true)
    } else {
        (name, false)
    }
}

fn take_census(records: &[RawRecord]) -> Census {
    let mut census = Census::new();
    for record in records {
        *census.entry(candidate_for(&record.key).0).or_default() += 1;
        for alias in &record.alias_keys {
            census.entry(candidate_for(alias).0).or_default();
        }
    }
    census
}

/// Names already assigned in this collection.
#[derive(Debug, Default)]
struct Claims {
    names: BTreeSet<String>,
}

impl Claims {
    fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn claim(&mut self, name: &str) {
        self.names.insert(name.to_string());
    }

    /// Smallest `{base}{infix}{n}` (n >= 1) that is neither claimed nor the
    /// bare candidate of some record in the census.
    fn next_free(&self, base: &str, infix: &str, census: &Census) -> String {
        let mut n = 1usize;
        loop {
            let name = format!("{}{}{}", base, infix, n);
            if !self.contains(&name) && !census.contains_key(&name) {
                return name;
            }
            n += 1;
        }
    }
}

/// Resolve one collection into uniquely named entries.
///
/// Never fails. Every record and every alias key yields exactly one entry;
/// final names are unique within the returned set.
pub fn resolve(collection: Collection, records: &[RawRecord]) -> ResolvedEntrySet {
    let census = take_census(records);
    let mut claims = Claims::default();
    let mut set = ResolvedEntrySet::empty(collection);

    for record in records {
        let (candidate, degenerate) = candidate_for(&record.key);

        // Bare name when still free, otherwise the smallest free numeric suffix.
        let final_name = if claims.contains(&candidate) {
            claims.next_free(&candidate, PRIMARY_SUFFIX, &census)
        } else {
            candidate.clone()
        };
        claims.claim(&final_name);

        push_entry(
            &mut set,
            Assigned {
                final_name,
                source_key: record.key.clone(),
                candidate,
                degenerate,
                alias_of: None,
            },
            record,
        );

        for alias in &record.alias_keys {
            let (candidate, degenerate) = candidate_for(alias);
            let primaries = census.get(&candidate).copied().unwrap_or_default();

            // A bare name wanted by any primary stays reserved for it.
            let contested = claims.contains(&candidate) || primaries > 0;
            let final_name = if contested {
                claims.next_free(&candidate, ALIAS_SUFFIX, &census)
            } else {
                candidate.clone()
            };
            claims.claim(&final_name);

            push_entry(
                &mut set,
                Assigned {
                    final_name,
                    source_key: alias.clone(),
                    candidate,
                    degenerate,
                    alias_of: Some(record.key.clone()),
                },
                record,
            );
        }
    }

    debug!(
        collection = %collection,
        entries = set.entries.len(),
        collisions = set.collisions.len(),
        "Resolved collection names"
    );

    set
}

struct Assigned {
    final_name: String,
    source_key: String,
    candidate: String,
    degenerate: bool,
    alias_of: Option<String>,
}

fn push_entry(set: &mut ResolvedEntrySet, assigned: Assigned, record: &RawRecord) {
    let is_alias = assigned.alias_of.is_some();

    if assigned.degenerate {
        warn!(
            collection = %set.collection,
            source_key = %assigned.source_key,
            resolved_name = %assigned.final_name,
            "Key has no identifier characters, using degenerate name"
        );
        set.diagnostics.push(NamingDiagnostic::DegenerateName {
            collection: set.collection,
            source_key: assigned.source_key.clone(),
            resolved_name: assigned.final_name.clone(),
        });
    }

    if assigned.final_name != assigned.candidate {
        set.collisions.push(CollisionRecord {
            collection: set.collection,
            source_key: assigned.source_key.clone(),
            candidate_name: assigned.candidate.clone(),
            resolved_name: assigned.final_name.clone(),
            kind: if is_alias {
                CollisionKind::Alias
            } else {
                CollisionKind::Primary
            },
        });
    }

    set.entries.push(ResolvedEntry {
        final_name: assigned.final_name,
        source_key: assigned.source_key,
        record: record.clone(),
        original_candidate_name: assigned.candidate,
        is_alias,
        alias_of_key: assigned.alias_of,
    });
}
