//! Storage backend boundary.
//!
//! The pipeline only needs the handful of capabilities on [`Store`]. Lookup
//! tables are always laid out as `(id, value)` with `value` unique, which is
//! what the foreign-key resolver reads back.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::{
    data::Value,
    error::StoreError,
    mapping::{DataKind, ResolvedMapping},
};

pub const LOOKUP_ID_COLUMN: &str = "id";
pub const LOOKUP_VALUE_COLUMN: &str = "value";

pub trait Store {
    /// Creates the destination table and one lookup table per foreign key.
    /// Existing tables are kept so repeated imports append.
    fn create_table(&mut self, mapping: &ResolvedMapping) -> Result<(), StoreError>;

    fn select_all(&self, table: &str, columns: &[&str]) -> Result<Vec<Vec<Value>>, StoreError>;

    fn insert(&mut self, table: &str, record: &[(&str, Value)]) -> Result<(), StoreError>;

    /// Writes `rows` in one batch and returns the number of rows written.
    fn insert_many(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<usize, StoreError>;

    /// Backend-native column type for a data kind.
    fn storage_type(&self, kind: DataKind) -> &'static str;
}
