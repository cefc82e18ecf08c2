use crate::play::Column;
use itertools::Itertools;
use polars::error::PolarsError;
use std::io::Error as IoError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] IoError),

    #[error("Unreadable source {}: {source}", .path.display())]
    UnreadableSource { path: PathBuf, source: PolarsError },

    #[error("{} is missing required column `{column}`", .path.display())]
    MissingRequiredColumn { path: PathBuf, column: Column },

    #[error("Missing columns: {}", .0.iter().join(", "))]
    MissingColumns(Vec<Column>),

    #[error("No groups reached the minimum sample of {min_sample}")]
    EmptyAggregate { min_sample: usize },

    #[error("Invalid aggregate request: {0}")]
    InvalidRequest(String),

    #[error("No source files found for the requested seasons")]
    NoSources,
}
