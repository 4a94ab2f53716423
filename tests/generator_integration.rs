//! Generator integration tests
//!
//! Drive the whole pipeline (fetch, resolve, render, persist) against an
//! in-memory metadata source and a temporary output directory.
//!
//! Run with: cargo test --test generator_integration

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use metaconst::{
    ArtifactStatus, Collection, GenerateOptions, Generator, GeneratorError, MetadataSource,
    RawRecord, RunMode, SnapshotSource, SourceError, TIMESTAMP_PREFIX,
};

/// Serves fixed records; collections without an entry fail.
#[derive(Clone, Default)]
struct StaticSource {
    collections: BTreeMap<Collection, Vec<RawRecord>>,
}

impl StaticSource {
    fn with(mut self, collection: Collection, records: Vec<RawRecord>) -> Self {
        self.collections.insert(collection, records);
        self
    }

    fn reversed(&self) -> Self {
        Self {
            collections: self
                .collections
                .iter()
                .map(|(c, records)| {
                    let records = records
                        .iter()
                        .rev()
                        .cloned()
                        .map(|mut r| {
                            r.alias_keys.reverse();
                            r
                        })
                        .collect();
                    (*c, records)
                })
                .collect(),
        }
    }
}

#[async_trait]
impl MetadataSource for StaticSource {
    fn describe(&self) -> String {
        "static test source".to_string()
    }

    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<RawRecord>, SourceError> {
        self.collections
            .get(&collection)
            .cloned()
            .ok_or_else(|| SourceError::Payload(format!("{} unavailable", collection)))
    }
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
}

fn operations() -> Vec<RawRecord> {
    vec![
        RawRecord::new("Document.Create")
            .with_label("Create")
            .with_category("Document")
            .with_aliases(["Document.CreateDocument"]),
        RawRecord::new("Document-Create").with_category("Document"),
        RawRecord::new("Blob.Attach")
            .with_category("Files")
            .with_aliases(["Blob.AttachOnDocument", "Document.Create"]),
        RawRecord::new("Repository.Query").with_category("Fetch"),
    ]
}

fn document_types() -> Vec<RawRecord> {
    vec![
        RawRecord::new("File")
            .with_parent("Document")
            .with_facets(["Downloadable", "Versionable"])
            .with_schemas(["common", "file"]),
        RawRecord::new("Folder").with_parent("Document").with_facets(["Folderish"]),
        RawRecord::new("Workspace").with_parent("Folder"),
    ]
}

fn full_source() -> StaticSource {
    StaticSource::default()
        .with(Collection::Operations, operations())
        .with(Collection::DocumentTypes, document_types())
        .with(
            Collection::Schemas,
            vec![RawRecord::new("dublincore").with_prefix("dc"), RawRecord::new("file")],
        )
        .with(
            Collection::Facets,
            vec![RawRecord::new("Folderish"), RawRecord::new("Versionable")],
        )
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn test_full_run_writes_every_section() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("src/constants.ts");
    let generator = Generator::new(full_source(), GenerateOptions::new(&output));

    let outcome = generator.run_at(at(9)).await.unwrap();
    assert_eq!(outcome.status, ArtifactStatus::Written);
    assert!(outcome.unavailable.is_empty());

    let text = read(&output);
    assert_eq!(text, outcome.artifact.as_str());
    assert!(text.contains("// Generated at: 2024-03-01T09:00:00Z\n"));
    assert!(text.contains("// Source: static test source\n"));
    assert!(text.contains("export const Operations = {"));
    assert!(text.contains("export const DocumentTypes = {"));
    assert!(text.contains("export const Schemas = {"));
    assert!(text.contains("export const Facets = {"));
    assert!(text.contains("export const Aliases = {"));
    assert!(text.contains("export const Categories = {"));
    assert_eq!(
        text.lines().filter(|l| l.starts_with(TIMESTAMP_PREFIX)).count(),
        1
    );

    // "Document-Create" sorts first, so it owns the bare name
    let ops = &outcome.sets[&Collection::Operations];
    assert_eq!(ops.get("Document_Create").unwrap().source_key, "Document-Create");
    assert_eq!(ops.get("Document_Create_1").unwrap().source_key, "Document.Create");
    assert!(text.contains("  Document_Create_1: \"Document.Create\",\n"));

    // Alias equal to another primary's key yields an alias-suffixed name
    let alias = ops
        .aliases()
        .find(|e| e.source_key == "Document.Create")
        .unwrap();
    assert_eq!(alias.alias_of_key.as_deref(), Some("Blob.Attach"));
    assert!(alias.final_name.starts_with("Document_Create_ALIAS_"));
}

#[tokio::test]
async fn test_failed_collection_is_rendered_empty() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("constants.ts");
    let source = StaticSource::default().with(Collection::DocumentTypes, document_types());
    let options = GenerateOptions::new(&output)
        .with_collections(vec![Collection::Operations, Collection::DocumentTypes]);

    let outcome = Generator::new(source, options).run_at(at(9)).await.unwrap();

    assert_eq!(outcome.status, ArtifactStatus::Written);
    assert_eq!(outcome.unavailable.len(), 1);
    assert_eq!(outcome.unavailable[0].0, Collection::Operations);
    assert!(outcome.sets[&Collection::Operations].is_empty());

    let text = read(&output);
    assert!(!text.contains("export const Operations"));
    assert!(text.contains("export const DocumentTypes = {"));
    assert!(text.contains("// Operations: 0\n"));
    assert!(text.contains("// Document types: 3\n"));
}

#[tokio::test]
async fn test_all_sources_unavailable_keeps_previous_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("constants.ts");
    std::fs::write(&output, "// previous artifact\n").unwrap();

    let generator = Generator::new(StaticSource::default(), GenerateOptions::new(&output));
    let err = generator.run_at(at(9)).await.unwrap_err();

    match err {
        GeneratorError::AllSourcesUnavailable(collections) => {
            assert_eq!(collections, Collection::ALL.to_vec())
        }
        other => panic!("expected AllSourcesUnavailable, got {other:?}"),
    }
    assert_eq!(read(&output), "// previous artifact\n");
}

#[tokio::test]
async fn test_nothing_selected_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let options = GenerateOptions::new(dir.path().join("constants.ts")).with_collections(vec![]);

    let err = Generator::new(full_source(), options)
        .run_at(at(9))
        .await
        .unwrap_err();
    assert!(matches!(err, GeneratorError::NothingSelected));
}

#[tokio::test]
async fn test_rerun_with_same_data_leaves_file_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("constants.ts");
    let generator = Generator::new(full_source(), GenerateOptions::new(&output));

    let first = generator.run_at(at(9)).await.unwrap();
    assert_eq!(first.status, ArtifactStatus::Written);

    let second = generator.run_at(at(17)).await.unwrap();
    assert_eq!(second.status, ArtifactStatus::Unchanged);
    assert_eq!(
        first.artifact.reproducible_body(),
        second.artifact.reproducible_body()
    );

    // The file still carries the first timestamp
    assert!(read(&output).contains("// Generated at: 2024-03-01T09:00:00Z\n"));
}

#[tokio::test]
async fn test_changed_data_rewrites_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("constants.ts");

    Generator::new(full_source(), GenerateOptions::new(&output))
        .run_at(at(9))
        .await
        .unwrap();

    let changed = full_source().with(
        Collection::Facets,
        vec![RawRecord::new("Folderish"), RawRecord::new("HiddenInNavigation")],
    );
    let outcome = Generator::new(changed, GenerateOptions::new(&output))
        .run_at(at(10))
        .await
        .unwrap();

    assert_eq!(outcome.status, ArtifactStatus::Written);
    let text = read(&output);
    assert!(text.contains("HiddenInNavigation: \"HiddenInNavigation\","));
    assert!(!text.contains("Versionable: \"Versionable\","));
}

#[tokio::test]
async fn test_check_mode_reports_staleness_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("constants.ts");
    let check = GenerateOptions::new(&output).with_mode(RunMode::Check);

    let missing = Generator::new(full_source(), check.clone())
        .run_at(at(9))
        .await
        .unwrap();
    assert_eq!(missing.status, ArtifactStatus::Stale);
    assert!(!output.exists());

    Generator::new(full_source(), GenerateOptions::new(&output))
        .run_at(at(9))
        .await
        .unwrap();

    let current = Generator::new(full_source(), check.clone())
        .run_at(at(12))
        .await
        .unwrap();
    assert_eq!(current.status, ArtifactStatus::UpToDate);

    let changed = full_source().with(Collection::Facets, vec![RawRecord::new("Publishable")]);
    let before = read(&output);
    let stale = Generator::new(changed, check).run_at(at(12)).await.unwrap();
    assert_eq!(stale.status, ArtifactStatus::Stale);
    assert_eq!(read(&output), before);
}

#[tokio::test]
async fn test_dry_run_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("constants.ts");
    let options = GenerateOptions::new(&output).with_mode(RunMode::DryRun);

    let outcome = Generator::new(full_source(), options)
        .run_at(at(9))
        .await
        .unwrap();

    assert_eq!(outcome.status, ArtifactStatus::Skipped);
    assert!(outcome.artifact.as_str().contains("export const Operations = {"));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_source_order_does_not_change_output() {
    let dir = tempfile::tempdir().unwrap();
    let source = full_source();

    let a = Generator::new(source.clone(), GenerateOptions::new(dir.path().join("a.ts")))
        .run_at(at(9))
        .await
        .unwrap();
    let b = Generator::new(source.reversed(), GenerateOptions::new(dir.path().join("b.ts")))
        .run_at(at(9))
        .await
        .unwrap();

    assert_eq!(a.sets, b.sets);
    assert_eq!(a.artifact.as_str(), b.artifact.as_str());
}

#[tokio::test]
async fn test_source_order_matters_without_canonical_order() {
    let dir = tempfile::tempdir().unwrap();
    let source = StaticSource::default().with(
        Collection::Operations,
        vec![RawRecord::new("Document.Create"), RawRecord::new("Document-Create")],
    );
    let options = |name: &str| {
        GenerateOptions::new(dir.path().join(name))
            .with_collections(vec![Collection::Operations])
            .with_canonical_order(false)
    };

    let forward = Generator::new(source.clone(), options("a.ts"))
        .run_at(at(9))
        .await
        .unwrap();
    let backward = Generator::new(source.reversed(), options("b.ts"))
        .run_at(at(9))
        .await
        .unwrap();

    let owner = |outcome: &metaconst::GenerationOutcome| {
        outcome.sets[&Collection::Operations]
            .get("Document_Create")
            .map(|e| e.source_key.clone())
    };
    assert_eq!(owner(&forward).as_deref(), Some("Document.Create"));
    assert_eq!(owner(&backward).as_deref(), Some("Document-Create"));
}

#[tokio::test]
async fn test_empty_collection_only_aliases_and_collisions_remain() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("constants.ts");
    let source = StaticSource::default().with(Collection::Schemas, vec![]);
    let options = GenerateOptions::new(&output).with_collections(vec![Collection::Schemas]);

    let outcome = Generator::new(source, options).run_at(at(9)).await.unwrap();
    let text = outcome.artifact.as_str();

    assert!(!text.contains("export const Schemas"));
    assert!(text.contains("export const Aliases = {} as const;\n"));
    assert!(!text.contains("export const Categories"));
    assert!(text.contains("// Name collisions: none\n"));
}

#[tokio::test]
async fn test_saved_snapshot_regenerates_same_names() {
    let dir = tempfile::tempdir().unwrap();
    let snapshots = dir.path().join("snapshots");

    let live = Generator::new(
        full_source(),
        GenerateOptions::new(dir.path().join("live.ts"))
            .with_save_snapshot_dir(Some(snapshots.clone())),
    )
    .run_at(at(9))
    .await
    .unwrap();

    for collection in Collection::ALL {
        assert!(SnapshotSource::path_for(&snapshots, collection).exists());
    }

    let offline = Generator::new(
        SnapshotSource::new(&snapshots),
        GenerateOptions::new(dir.path().join("offline.ts")),
    )
    .run_at(at(9))
    .await
    .unwrap();

    assert_eq!(live.sets, offline.sets);
    assert!(offline
        .artifact
        .as_str()
        .contains(&format!("// Source: snapshot {}\n", snapshots.display())));
}

#[tokio::test]
async fn test_boxed_source_runs() {
    let dir = tempfile::tempdir().unwrap();
    let source: Box<dyn MetadataSource> = Box::new(full_source());

    let outcome = Generator::new(source, GenerateOptions::new(dir.path().join("c.ts")))
        .run_at(at(9))
        .await
        .unwrap();
    assert_eq!(outcome.status, ArtifactStatus::Written);
}
