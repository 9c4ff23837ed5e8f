//! Typed failure kinds at the pipeline's seams.
//!
//! Application plumbing uses `anyhow::Result`; the enums here exist where callers
//! branch on the kind of failure (adapter skip vs. transient, persist vs. config).

use std::path::PathBuf;

/// Ordinary adapter failure. Reported alongside an empty batch, never thrown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceFault {
    /// Missing or rejected credential. The adapter is skipped for the rest of the run.
    #[error("missing or rejected credential")]
    Unauthenticated,
    /// Network error, timeout or non-success HTTP status.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// One provider item that could not be mapped to a `NewsRecord`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed item: {0}")]
pub struct MalformedItem(pub String);

/// Writing the tabular output failed. Already written rows are untouched.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Run-level fault; the only kind that aborts the whole batch.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid ticker symbol {0:?} (expected 1-5 letters)")]
    InvalidTicker(String),
    #[error("no valid tickers to process")]
    NoTickers,
    #[error("output directory {path} is not writable: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("reading config {path}: {message}")]
    File { path: PathBuf, message: String },
}

/// Why a whole ticker was reported as failed by the batch runner.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickerError {
    #[error("pipeline error: {0}")]
    Pipeline(String),
    #[error("pipeline task panicked")]
    Panicked,
    /// The ticker's news rows could not be written.
    #[error("persisting news rows failed: {0}")]
    Persist(String),
}
