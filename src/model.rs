//! Shared data model
//!
//! Records flow one way through the pipeline: a [`MetadataSource`] yields
//! [`RawRecord`]s per [`Collection`], the resolver turns them into a
//! [`ResolvedEntrySet`], and the renderer reads those sets.
//!
//! [`MetadataSource`]: crate::source::MetadataSource

use serde::{Deserialize, Serialize};

/// One of the four independent metadata namespaces.
///
/// Final names are unique per collection only; the same final name may
/// appear in two collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Operations,
    DocumentTypes,
    Schemas,
    Facets,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Operations,
        Collection::DocumentTypes,
        Collection::Schemas,
        Collection::Facets,
    ];

    /// Name of the exported table in the rendered artifact.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Operations => "Operations",
            Self::DocumentTypes => "DocumentTypes",
            Self::Schemas => "Schemas",
            Self::Facets => "Facets",
        }
    }

    /// Human-readable label used in statistics lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Operations => "Operations",
            Self::DocumentTypes => "Document types",
            Self::Schemas => "Schemas",
            Self::Facets => "Facets",
        }
    }

    /// Parse the CLI / config spelling (`operations`, `document-types`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "operations" | "ops" => Some(Self::Operations),
            "document_types" | "doctypes" | "types" => Some(Self::DocumentTypes),
            "schemas" => Some(Self::Schemas),
            "facets" => Some(Self::Facets),
            _ => None,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Operations => write!(f, "operations"),
            Self::DocumentTypes => write!(f, "document_types"),
            Self::Schemas => write!(f, "schemas"),
            Self::Facets => write!(f, "facets"),
        }
    }
}

impl std::str::FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!(
                "unknown collection '{}' (expected operations, document-types, schemas or facets)",
                s
            )
        })
    }
}

/// A metadata record as delivered by the source.
///
/// Only `key` is mandatory; every other field is carried when the source
/// provides it and is otherwise left empty.
///
/// Ordering compares `key` first, then every other field, so records that
/// share a key still sort the same way whatever order they arrived in.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RawRecord {
    /// Canonical identifier on the remote system (e.g. `Document.Create`)
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Parent document type (document types only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Field prefix (schemas only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemas: Vec<String>,
    /// Alternate canonical keys that need their own constant
    #[serde(default, rename = "aliasKeys", skip_serializing_if = "Vec::is_empty")]
    pub alias_keys: Vec<String>,
}

impl RawRecord {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_facets<I, S>(mut self, facets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.facets = facets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_schemas<I, S>(mut self, schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schemas = schemas.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alias_keys = aliases.into_iter().map(Into::into).collect();
        self
    }
}

/// A record (or one of its aliases) with its final, collection-unique name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEntry {
    pub final_name: String,
    /// `record.key` for primaries, the alias key for aliases
    pub source_key: String,
    pub record: RawRecord,
    /// Sanitized name before disambiguation (`_` when sanitization was empty)
    pub original_candidate_name: String,
    pub is_alias: bool,
    /// Owning record's key, set only for aliases
    pub alias_of_key: Option<String>,
}

impl ResolvedEntry {
    pub fn was_renamed(&self) -> bool {
        self.final_name != self.original_candidate_name
    }
}

/// Why an entry did not keep its candidate name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionKind {
    /// A primary key whose candidate was already claimed
    Primary,
    /// An alias whose candidate was claimed or reserved by a primary
    Alias,
}

impl std::fmt::Display for CollisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Alias => write!(f, "alias"),
        }
    }
}

/// One line of the collision log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollisionRecord {
    pub collection: Collection,
    pub source_key: String,
    pub candidate_name: String,
    pub resolved_name: String,
    pub kind: CollisionKind,
}

/// Non-fatal naming problem surfaced by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NamingDiagnostic {
    /// Sanitizing the key left nothing; the `_` fallback was used.
    DegenerateName {
        collection: Collection,
        source_key: String,
        resolved_name: String,
    },
}

impl std::fmt::Display for NamingDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DegenerateName {
                collection,
                source_key,
                resolved_name,
            } => write!(
                f,
                "{}: key {:?} has no identifier characters, named '{}'",
                collection, source_key, resolved_name
            ),
        }
    }
}

/// Resolver output for one collection. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEntrySet {
    pub collection: Collection,
    /// Entries in assignment order (source order, aliases after their owner)
    pub entries: Vec<ResolvedEntry>,
    /// Entries whose final name differs from their candidate, in assignment order
    pub collisions: Vec<CollisionRecord>,
    pub diagnostics: Vec<NamingDiagnostic>,
}

impl ResolvedEntrySet {
    pub fn empty(collection: Collection) -> Self {
        Self {
            collection,
            entries: Vec::new(),
            collisions: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by final name; the display order.
    pub fn sorted(&self) -> Vec<&ResolvedEntry> {
        let mut sorted: Vec<&ResolvedEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.final_name.cmp(&b.final_name));
        sorted
    }

    pub fn aliases(&self) -> impl Iterator<Item = &ResolvedEntry> {
        self.entries.iter().filter(|e| e.is_alias)
    }

    pub fn primaries(&self) -> impl Iterator<Item = &ResolvedEntry> {
        self.entries.iter().filter(|e| !e.is_alias)
    }

    pub fn get(&self, final_name: &str) -> Option<&ResolvedEntry> {
        self.entries.iter().find(|e| e.final_name == final_name)
    }
}
