//! Deterministic renderer
//!
//! Turns resolved entry sets into one TypeScript module. The output is a
//! pure function of its inputs; the only time-dependent text is the single
//! `// Generated at:` header line, so two renders of the same data differ
//! in that line at most.
//!
//! Section order:
//!
//! ```text
//! header comment (banner, timestamp, source, statistics)
//! export const <Collection> = { ... }   one per non-empty collection
//! export const Aliases = { ... }        always
//! export const Categories = { ... }     when operations span 2+ categories
//! collision report comment              always
//! ```

pub mod grouping;
pub mod typescript;

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::model::{Collection, CollisionRecord, ResolvedEntry, ResolvedEntrySet};
use grouping::{group_by_category, ArtifactStats};
use typescript::{comment_text, doc_comment, property_key, string_literal};

pub use grouping::{category_of, CollectionStats, DEFAULT_CATEGORY};

/// Prefix of the only line that varies between identical runs.
pub const TIMESTAMP_PREFIX: &str = "// Generated at: ";

const INDENT: &str = "  ";

/// Resolved sets keyed by collection; iteration order is render order.
pub type EntrySets = BTreeMap<Collection, ResolvedEntrySet>;

/// The rendered module text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    text: String,
    stats: ArtifactStats,
}

impl RenderedArtifact {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn stats(&self) -> &ArtifactStats {
        &self.stats
    }

    /// The artifact without its timestamp line; identical inputs give
    /// identical bodies.
    pub fn reproducible_body(&self) -> String {
        strip_timestamp(&self.text)
    }

    /// Whether `existing` holds the same artifact, ignoring the timestamp.
    pub fn matches(&self, existing: &str) -> bool {
        strip_timestamp(existing) == self.reproducible_body()
    }
}

/// Drop the timestamp line from artifact text.
pub fn strip_timestamp(text: &str) -> String {
    text.split_inclusive('\n')
        .filter(|line| !line.starts_with(TIMESTAMP_PREFIX))
        .collect()
}

/// Render all entry sets into one artifact. Total over well-formed sets.
pub fn render(
    sets: &EntrySets,
    generated_at: DateTime<Utc>,
    source_description: &str,
) -> RenderedArtifact {
    let stats = ArtifactStats::from_sets(sets);
    let mut sections = vec![render_header(&stats, generated_at, source_description)];

    for set in sets.values().filter(|s| !s.is_empty()) {
        sections.push(render_collection(set));
    }
    sections.push(render_aliases(sets));
    if let Some(categories) = sets
        .get(&Collection::Operations)
        .and_then(render_categories)
    {
        sections.push(categories);
    }
    sections.push(render_collisions(sets));

    RenderedArtifact {
        text: sections.join("\n"),
        stats,
    }
}

fn render_header(
    stats: &ArtifactStats,
    generated_at: DateTime<Utc>,
    source_description: &str,
) -> String {
    let mut out = String::new();
    out.push_str("// Repository metadata constants.\n");
    out.push_str("// This file is generated by metaconst. Do not edit by hand.\n");
    out.push_str(&format!(
        "{}{}\n",
        TIMESTAMP_PREFIX,
        generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    out.push_str(&format!("// Source: {}\n", comment_text(source_description)));
    out.push_str("//\n");

    for collection in Collection::ALL {
        let s = stats.get(collection);
        if s.aliases > 0 {
            out.push_str(&format!(
                "// {}: {} ({} aliases)\n",
                collection.label(),
                s.entries,
                s.aliases
            ));
        } else {
            out.push_str(&format!("// {}: {}\n", collection.label(), s.entries));
        }
    }
    out.push_str(&format!("// Operation categories: {}\n", stats.categories));
    out.push_str(&format!(
        "// Collisions resolved: {}\n",
        stats.total_collisions()
    ));
    if stats.total_diagnostics() > 0 {
        out.push_str(&format!(
            "// Naming diagnostics: {}\n",
            stats.total_diagnostics()
        ));
    }
    out
}

fn annotation(entry: &ResolvedEntry) -> Vec<String> {
    let record = &entry.record;
    let mut lines = Vec::new();

    let present = |value: &Option<String>| {
        value
            .as_deref()
            .map(comment_text)
            .filter(|text| !text.is_empty())
    };

    if let Some(owner) = &entry.alias_of_key {
        lines.push(format!("Alias of {}", comment_text(owner)));
    }
    let label = present(&record.label);
    if let Some(label) = &label {
        lines.push(label.clone());
    }
    if let Some(description) = present(&record.description) {
        if label.as_ref() != Some(&description) {
            lines.push(description);
        }
    }
    if let Some(parent) = present(&record.parent) {
        lines.push(format!("Extends {}", parent));
    }
    if let Some(prefix) = present(&record.prefix) {
        lines.push(format!("Prefix: {}", prefix));
    }
    if !record.facets.is_empty() {
        lines.push(format!("Facets: {}", comment_text(&record.facets.join(", "))));
    }
    if !record.schemas.is_empty() {
        lines.push(format!(
            "Schemas: {}",
            comment_text(&record.schemas.join(", "))
        ));
    }
    lines
}

fn render_collection(set: &ResolvedEntrySet) -> String {
    let mut out = format!("export const {} = {{\n", set.collection.title());
    for entry in set.sorted() {
        out.push_str(&doc_comment(&annotation(entry), INDENT));
        out.push_str(&format!(
            "{}{}: {},\n",
            INDENT,
            property_key(&entry.final_name),
            string_literal(&entry.source_key)
        ));
    }
    out.push_str("} as const;\n");
    out
}

fn render_aliases(sets: &EntrySets) -> String {
    let mut blocks = Vec::new();
    for set in sets.values() {
        let mut aliases: Vec<&ResolvedEntry> = set.aliases().collect();
        if aliases.is_empty() {
            continue;
        }
        aliases.sort_by(|a, b| a.final_name.cmp(&b.final_name));

        let mut block = format!("{}{}: {{\n", INDENT, set.collection.title());
        for entry in aliases {
            block.push_str(&format!(
                "{}{}{}: {},\n",
                INDENT,
                INDENT,
                property_key(&entry.final_name),
                string_literal(&entry.source_key)
            ));
        }
        block.push_str(&format!("{}}},\n", INDENT));
        blocks.push(block);
    }

    if blocks.is_empty() {
        return "export const Aliases = {} as const;\n".to_string();
    }
    format!("export const Aliases = {{\n{}}} as const;\n", blocks.concat())
}

fn render_categories(operations: &ResolvedEntrySet) -> Option<String> {
    let groups = group_by_category(&operations.entries);
    if groups.len() < 2 {
        return None;
    }

    let mut out = "export const Categories = {\n".to_string();
    for (category, members) in &groups {
        out.push_str(&format!("{}{}: [\n", INDENT, property_key(category)));
        for entry in members {
            out.push_str(&format!(
                "{}{}{},\n",
                INDENT,
                INDENT,
                string_literal(&entry.final_name)
            ));
        }
        out.push_str(&format!("{}],\n", INDENT));
    }
    out.push_str("} as const;\n");
    Some(out)
}

fn render_collisions(sets: &EntrySets) -> String {
    let mut collisions: Vec<&CollisionRecord> =
        sets.values().flat_map(|s| s.collisions.iter()).collect();
    if collisions.is_empty() {
        return "// Name collisions: none\n".to_string();
    }
    collisions.sort_by(|a, b| {
        a.source_key
            .cmp(&b.source_key)
            .then(a.collection.cmp(&b.collection))
            .then(a.resolved_name.cmp(&b.resolved_name))
    });

    let mut out = format!("// Name collisions ({}):\n", collisions.len());
    for c in collisions {
        out.push_str(&format!(
            "//   [{}] {}: {} -> {} ({})\n",
            c.collection,
            comment_text(&string_literal(&c.source_key)),
            c.candidate_name,
            c.resolved_name,
            c.kind
        ));
    }
    out
}
