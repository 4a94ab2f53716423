//! metaconst - repository metadata constants generator
//!
//! Discovers the operations, document types, schemas and facets exposed by
//! a content-repository server and renders them into one TypeScript module
//! of named constants.
//!
//! The core is synchronous and pure:
//!
//! - [`naming::sanitize`] maps a remote key to a candidate identifier
//! - [`naming::resolve`] gives every record and alias of a collection a
//!   unique final name, logging collisions
//! - [`render::render`] serializes resolved sets reproducibly
//!
//! [`generator::Generator`] wraps it with fetching (any
//! [`source::MetadataSource`]) and atomic persistence.
//!
//! ```
//! use std::collections::BTreeMap;
//! use chrono::Utc;
//! use metaconst::{naming, render, Collection, RawRecord};
//!
//! let records = vec![
//!     RawRecord::new("Document.Create"),
//!     RawRecord::new("Document-Create"),
//! ];
//! let set = naming::resolve(Collection::Operations, &records);
//! assert_eq!(set.entries[1].final_name, "Document_Create_1");
//!
//! let sets = BTreeMap::from([(Collection::Operations, set)]);
//! let artifact = render::render(&sets, Utc::now(), "example");
//! assert!(artifact.as_str().contains("Document_Create_1: \"Document-Create\","));
//! ```

pub mod config;
pub mod error;
pub mod generator;
pub mod model;
pub mod naming;
pub mod render;
pub mod source;

pub use config::GeneratorConfig;
pub use error::{GeneratorError, SourceError};
pub use generator::{ArtifactStatus, GenerateOptions, GenerationOutcome, Generator, RunMode};
pub use model::{
    Collection, CollisionKind, CollisionRecord, NamingDiagnostic, RawRecord, ResolvedEntry,
    ResolvedEntrySet,
};
pub use render::{RenderedArtifact, TIMESTAMP_PREFIX};
pub use source::{HttpMetadataSource, MetadataSource, RetryPolicy, SnapshotSource};
