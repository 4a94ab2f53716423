//! Generation pipeline
//!
//! fetch (concurrently per collection) → canonical order → resolve →
//! render → persist. A run either replaces the artifact wholesale or leaves
//! the previous one untouched.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{GeneratorError, SourceError};
use crate::model::{Collection, RawRecord};
use crate::naming::resolve;
use crate::render::{render, EntrySets, RenderedArtifact};
use crate::source::{MetadataSource, SnapshotSource};

/// What a run does with the rendered artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Replace the artifact unless it is already current
    Write,
    /// Render only
    DryRun,
    /// Compare against the existing artifact without writing
    Check,
}

/// What happened to the artifact on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    /// Created or replaced
    Written,
    /// Existing file already matched, left untouched
    Unchanged,
    /// Dry run, nothing touched
    Skipped,
    /// Check mode: existing file matches
    UpToDate,
    /// Check mode: file is missing or would change
    Stale,
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub output: PathBuf,
    pub collections: Vec<Collection>,
    pub canonical_order: bool,
    pub save_snapshot_dir: Option<PathBuf>,
    pub mode: RunMode,
}

impl GenerateOptions {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            collections: Collection::ALL.to_vec(),
            canonical_order: true,
            save_snapshot_dir: None,
            mode: RunMode::Write,
        }
    }

    pub fn with_collections(mut self, collections: Vec<Collection>) -> Self {
        self.collections = collections;
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_canonical_order(mut self, canonical_order: bool) -> Self {
        self.canonical_order = canonical_order;
        self
    }

    pub fn with_save_snapshot_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.save_snapshot_dir = dir;
        self
    }
}

/// Result of a run that produced an artifact.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub artifact: RenderedArtifact,
    pub sets: EntrySets,
    /// Collections treated as empty because their fetch failed
    pub unavailable: Vec<(Collection, String)>,
    pub status: ArtifactStatus,
    pub output: PathBuf,
}

/// Records per collection plus the collections that failed.
pub struct FetchResult {
    pub records: BTreeMap<Collection, Vec<RawRecord>>,
    pub failures: Vec<(Collection, SourceError)>,
}

pub struct Generator<S> {
    source: S,
    options: GenerateOptions,
}

impl<S: MetadataSource> Generator<S> {
    pub fn new(source: S, options: GenerateOptions) -> Self {
        Self { source, options }
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    /// Fetch every selected collection concurrently.
    pub async fn fetch_all(&self) -> FetchResult {
        let fetches = self.options.collections.iter().map(|&collection| async move {
            (collection, self.source.fetch_collection(collection).await)
        });

        let mut records = BTreeMap::new();
        let mut failures = Vec::new();
        for (collection, result) in join_all(fetches).await {
            match result {
                Ok(fetched) => {
                    records.insert(collection, fetched);
                }
                Err(e) => {
                    warn!(
                        collection = %collection,
                        error = %e,
                        "Metadata collection unavailable, treating as empty"
                    );
                    failures.push((collection, e));
                }
            }
        }
        FetchResult { records, failures }
    }

    /// Run the whole pipeline, stamping the artifact with the current time.
    pub async fn run(&self) -> Result<GenerationOutcome, GeneratorError> {
        self.run_at(Utc::now()).await
    }

    pub async fn run_at(&self, generated_at: DateTime<Utc>) -> Result<GenerationOutcome, GeneratorError> {
        if self.options.collections.is_empty() {
            return Err(GeneratorError::NothingSelected);
        }

        let source_description = self.source.describe();
        info!(source = %source_description, "Generating metadata constants");

        let FetchResult { records, failures } = self.fetch_all().await;
        if records.is_empty() {
            return Err(GeneratorError::AllSourcesUnavailable(
                failures.iter().map(|(c, _)| *c).collect(),
            ));
        }

        if let Some(dir) = &self.options.save_snapshot_dir {
            save_snapshots(dir, &records).await;
        }

        let mut records = records;
        for (collection, _) in &failures {
            records.insert(*collection, Vec::new());
        }

        let sets = resolve_collections(records, self.options.canonical_order);
        for collision in sets.values().flat_map(|s| s.collisions.iter()) {
            debug!(
                collection = %collision.collection,
                source_key = %collision.source_key,
                candidate = %collision.candidate_name,
                resolved = %collision.resolved_name,
                kind = %collision.kind,
                "Name collision resolved"
            );
        }

        let artifact = render(&sets, generated_at, &source_description);
        let output = self.options.output.clone();
        let status = match self.options.mode {
            RunMode::DryRun => ArtifactStatus::Skipped,
            RunMode::Check => match read_existing(&output)? {
                Some(existing) if artifact.matches(&existing) => ArtifactStatus::UpToDate,
                _ => ArtifactStatus::Stale,
            },
            RunMode::Write => match read_existing(&output)? {
                Some(existing) if artifact.matches(&existing) => {
                    info!(path = %output.display(), "Artifact already up to date");
                    ArtifactStatus::Unchanged
                }
                _ => {
                    persist_artifact(&output, artifact.as_str())?;
                    info!(
                        path = %output.display(),
                        bytes = artifact.as_str().len(),
                        "Wrote artifact"
                    );
                    ArtifactStatus::Written
                }
            },
        };

        Ok(GenerationOutcome {
            artifact,
            sets,
            unavailable: failures
                .into_iter()
                .map(|(c, e)| (c, e.to_string()))
                .collect(),
            status,
            output,
        })
    }
}

/// Put records (and each record's aliases) in key order, so the resolver
/// sees the same sequence whatever order the source returned. Records with
/// the same key are ordered by their remaining fields.
pub fn canonicalize(records: &mut [RawRecord]) {
    for record in records.iter_mut() {
        record.alias_keys.sort();
    }
    records.sort();
}

/// Resolve every collection independently.
pub fn resolve_collections(
    records: BTreeMap<Collection, Vec<RawRecord>>,
    canonical_order: bool,
) -> EntrySets {
    records
        .into_iter()
        .map(|(collection, mut records)| {
            if canonical_order {
                canonicalize(&mut records);
            }
            (collection, resolve(collection, &records))
        })
        .collect()
}

async fn save_snapshots(dir: &Path, records: &BTreeMap<Collection, Vec<RawRecord>>) {
    for (collection, records) in records {
        if let Err(e) = SnapshotSource::save(dir, *collection, records).await {
            warn!(collection = %collection, error = %e, "Failed to save snapshot");
        }
    }
}

fn read_existing(path: &Path) -> Result<Option<String>, GeneratorError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(GeneratorError::Io(e)),
    }
}

/// Replace `path` with `text` atomically: write a sibling temp file, then
/// rename it over the target.
pub fn persist_artifact(path: &Path, text: &str) -> Result<(), GeneratorError> {
    let persist_err = |source| GeneratorError::Persist {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(persist_err)?;

    let mut file = NamedTempFile::new_in(&dir).map_err(persist_err)?;
    file.write_all(text.as_bytes()).map_err(persist_err)?;
    file.as_file().sync_all().map_err(persist_err)?;
    file.persist(path).map_err(|e| persist_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_canonicalize_sorts_records_and_aliases() {
        let mut records = vec![
            RawRecord::new("b").with_aliases(["z", "y"]),
            RawRecord::new("a"),
        ];
        canonicalize(&mut records);

        assert_eq!(records[0].key, "a");
        assert_eq!(records[1].key, "b");
        assert_eq!(records[1].alias_keys, vec!["y", "z"]);
    }

    #[test]
    fn test_duplicate_keys_resolve_the_same_in_any_order() {
        let forward = vec![
            RawRecord::new("Document.Create").with_label("From operations"),
            RawRecord::new("Document.Create").with_label("From chains"),
        ];
        let backward: Vec<RawRecord> = forward.iter().rev().cloned().collect();

        let a = resolve_collections(BTreeMap::from([(Collection::Operations, forward)]), true);
        let b = resolve_collections(BTreeMap::from([(Collection::Operations, backward)]), true);
        assert_eq!(a, b);

        let at = DateTime::UNIX_EPOCH;
        assert_eq!(
            render(&a, at, "test").into_string(),
            render(&b, at, "test").into_string()
        );

        let ops = &a[&Collection::Operations];
        assert_eq!(
            ops.get("Document_Create").and_then(|e| e.record.label.as_deref()),
            Some("From chains")
        );
        assert_eq!(
            ops.get("Document_Create_1").and_then(|e| e.record.label.as_deref()),
            Some("From operations")
        );
    }

    #[test]
    fn test_resolve_collections_is_order_independent_when_canonical() {
        let forward = vec![
            RawRecord::new("Document.Create"),
            RawRecord::new("Document-Create"),
        ];
        let backward: Vec<RawRecord> = forward.iter().rev().cloned().collect();

        let a = resolve_collections(BTreeMap::from([(Collection::Operations, forward)]), true);
        let b = resolve_collections(BTreeMap::from([(Collection::Operations, backward)]), true);
        assert_eq!(a, b);

        // "Document-Create" sorts before "Document.Create"
        let ops = &a[&Collection::Operations];
        assert_eq!(ops.entries[0].source_key, "Document-Create");
        assert_eq!(ops.entries[0].final_name, "Document_Create");
    }

    #[test]
    fn test_persist_creates_parent_dirs_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/constants.ts");

        persist_artifact(&path, "first\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\n");

        persist_artifact(&path, "second\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");

        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    proptest! {
        #[test]
        fn canonical_order_ignores_source_order(
            rows in prop::collection::vec(
                (
                    "[A-Da-d.-]{1,3}",
                    prop::option::of("[xyz]"),
                    prop::collection::vec("[a-z._]{1,4}", 0..3),
                ),
                0..16,
            )
        ) {
            let records: Vec<RawRecord> = rows
                .into_iter()
                .map(|(key, label, aliases)| {
                    let record = RawRecord::new(key).with_aliases(aliases);
                    match label {
                        Some(label) => record.with_label(label),
                        None => record,
                    }
                })
                .collect();
            let mut shuffled = records.clone();
            shuffled.reverse();
            for record in shuffled.iter_mut() {
                record.alias_keys.reverse();
            }

            let a = resolve_collections(BTreeMap::from([(Collection::Schemas, records)]), true);
            let b = resolve_collections(BTreeMap::from([(Collection::Schemas, shuffled)]), true);
            prop_assert_eq!(a, b);
        }
    }
}
