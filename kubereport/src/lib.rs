//! Kubernetes cluster inventory reports.
//!
//! Collectors turn listed objects into [`table::RecordTable`]s, the
//! [`orchestrator`] runs a profile's sections in order, and one of the
//! [`render`] sinks writes them out as a single CSV or PDF artifact.

pub mod collectors;
pub mod config;
pub mod error;
pub mod log;
pub mod orchestrator;
pub mod quantity;
pub mod render;
pub mod sections;
pub mod source;
pub mod table;
pub mod utils;

pub use error::ReportError;
pub use orchestrator::{Orchestrator, Report};
