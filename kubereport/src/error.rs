use std::io;

use thiserror::Error;

use crate::quantity::UnitClass;

#[derive(Debug, Error)]
pub enum QuantityError {
    #[error("malformed quantity '{0}'")]
    Malformed(String),
    #[error("cannot combine {left} with {right}")]
    UnitClassMismatch { left: UnitClass, right: UnitClass },
    #[error("quantity '{0}' overflows the supported range")]
    Overflow(String),
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("row has {got} cells but the table has {expected} columns")]
    RowShape { expected: usize, got: usize },
}

/// Failures of the cluster data source itself.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("kubernetes api error: {0}")]
    Api(#[from] kube::Error),
    #[error("kubeconfig error: {0}")]
    Config(String),
    #[error("list call timed out after {0}s")]
    Timeout(u64),
    #[error("failed to decode api response: {0}")]
    Decode(#[from] k8s_openapi::serde_json::Error),
    #[error("{kind} '{name}' could not be decoded: {source}")]
    Undecodable {
        kind: String,
        name: String,
        #[source]
        source: k8s_openapi::serde_json::Error,
    },
    #[error("{kind} is not available: {reason}")]
    Unavailable { kind: String, reason: String },
    /// The API server does not serve the kind at all, e.g. no metrics-server.
    #[error("{kind} is not served by this cluster")]
    NotServed { kind: String },
    #[error("failed to read snapshot: {0}")]
    Snapshot(String),
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("{kind} collection unavailable: {cause}")]
    CollectionUnavailable {
        kind: &'static str,
        #[source]
        cause: SourceError,
    },
    #[error(transparent)]
    Quantity(#[from] QuantityError),
    #[error(transparent)]
    Table(#[from] TableError),
}

impl CollectError {
    pub fn unavailable(kind: &'static str) -> impl FnOnce(SourceError) -> Self {
        move |cause| CollectError::CollectionUnavailable { kind, cause }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("delimited writer error: {0}")]
    Csv(#[from] csv::Error),
}

/// Fatal outcomes of a report run. Every variant that happens inside a
/// section names it, so operators know which resource kind aborted the run.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cluster data source unavailable: {0}")]
    DataSourceUnavailable(#[source] SourceError),
    #[error("section '{title}' ({kind}) failed: {source}")]
    Section {
        title: String,
        kind: &'static str,
        #[source]
        source: CollectError,
    },
    #[error("failed to write report artifact{}: {source}", in_section(.section))]
    RenderIo {
        section: Option<String>,
        #[source]
        source: RenderError,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn in_section(section: &Option<String>) -> String {
    section
        .as_ref()
        .map(|s| format!(" in section '{s}'"))
        .unwrap_or_default()
}
