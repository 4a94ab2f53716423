//! Error types for metadata fetching and artifact generation
//!
//! Naming problems are not errors: collisions are resolved and degenerate
//! names are reported as [`NamingDiagnostic`](crate::model::NamingDiagnostic)s.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::Collection;

/// Failure to obtain one collection from a metadata source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
        body: String,
    },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Unexpected payload: {0}")]
    Payload(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<SourceError>,
    },
}

impl SourceError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Self::Status { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            Self::Url(_)
            | Self::Payload(_)
            | Self::Json(_)
            | Self::Io { .. }
            | Self::Exhausted { .. } => false,
        }
    }
}

/// Failure of a whole generation run.
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("All metadata collections are unavailable ({}); keeping the existing artifact", format_collections(.0))]
    AllSourcesUnavailable(Vec<Collection>),

    #[error("No collections selected")]
    NothingSelected,

    #[error("Failed to write {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_collections(collections: &[Collection]) -> String {
    collections
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
