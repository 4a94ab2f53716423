//! Metadata sources
//!
//! A [`MetadataSource`] hands out one complete, immutable snapshot of a
//! collection per call. The generator only depends on this trait, so the
//! naming and rendering core can be exercised with synthetic records and no
//! network.

pub mod http;
pub mod payload;
pub mod snapshot;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::model::{Collection, RawRecord};

pub use http::{HttpMetadataSource, RetryPolicy};
pub use payload::decode_records;
pub use snapshot::SnapshotSource;

/// Capability to fetch raw metadata records per collection.
///
/// # Implementation Notes
///
/// - Return `Ok(vec![])` for a collection that exists but is empty
/// - Retry transient failures internally; an `Err` means the collection is
///   unavailable for this run
/// - Calls for different collections may run concurrently
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Where the metadata comes from (URL, directory, ...), for the artifact header.
    fn describe(&self) -> String;

    /// Fetch every record of one collection.
    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<RawRecord>, SourceError>;
}

#[async_trait]
impl<T: MetadataSource + ?Sized> MetadataSource for Box<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<RawRecord>, SourceError> {
        (**self).fetch_collection(collection).await
    }
}
