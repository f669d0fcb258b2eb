//! Error taxonomy for the import pipeline.
//!
//! Every failure aborts the whole import; nothing here is recovered locally.
//! The three families mirror where a problem originates:
//!
//! - [`ConfigError`]: the mapping descriptor or transformation set is unusable.
//!   Detected before any row is read or any table is touched.
//! - [`DataError`]: a row value could not be carried through the pipeline.
//! - [`StoreError`]: the storage backend failed; propagated unmodified.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = ImportError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("storage error: {0}")]
    Backend(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed mapping file {path:?}: {message}")]
    MalformedMapping { path: PathBuf, message: String },
    #[error("mapping for table '{table}' does not declare any columns")]
    EmptyMapping { table: String },
    #[error("csv_index {index} is mapped more than once")]
    DuplicateSourceIndex { index: usize },
    /// `row` is the 1-based data row, or 0 for the header row.
    #[error("csv_index {index} is outside row {row} ({width} column(s))")]
    SourceIndexOutOfRange {
        index: usize,
        row: usize,
        width: usize,
    },
    #[error("transformation '{name}' for csv_index {index} is not registered")]
    UnknownTransform { index: usize, name: String },
    #[error("storage column '{name}' is produced by more than one mapping")]
    StorageNameCollision { name: String },
    #[error("foreign key lookup table '{name}' clashes with the destination table")]
    LookupTableCollision { name: String },
    #[error("cannot read transformations from {path:?}: {message}")]
    TransformationsUnreadable { path: PathBuf, message: String },
    #[error("transformation '{name}' has an invalid expression: {message}")]
    InvalidExpression { name: String, message: String },
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("row {row}: transformation '{transform}' failed on column '{column}' value {value:?}: {source}")]
    TransformFailed {
        row: usize,
        column: String,
        transform: String,
        value: String,
        #[source]
        source: TransformFailure,
    },
    #[error("row {row}: value {value:?} has no identifier in lookup table '{column}'")]
    UnresolvedForeignKey {
        row: usize,
        column: String,
        value: String,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("lookup table '{table}' returned an unexpected row: {detail}")]
    MalformedLookupRow { table: String, detail: String },
}

/// Failure raised by a single transformation call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TransformFailure(pub String);

impl TransformFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
