//! Import orchestration.
//!
//! [`Importer::new`] does everything that can fail on configuration alone
//! (mapping validation, transform binding) so that a bad mapping is rejected
//! before any input is read. [`Importer::run`] then drives one import:
//! resolve the mapping against the rows, transform, create tables, reconcile
//! foreign keys, patch, and bulk insert. There is no rollback; lookup rows
//! added before a later failure stay in the store.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::{
    data::Row,
    error::{DataError, Result},
    foreign_keys::{patch_rows, resolve_foreign_keys},
    inference::DEFAULT_SAMPLE_ROWS,
    mapping::{MappingFile, ResolvedColumn, ResolvedMapping},
    store::Store,
    transform::{TransformPlan, TransformRegistry},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Rows sampled per column when inferring kinds; 0 samples every row.
    pub sample_rows: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }
}

/// Parsed input handed to the pipeline: an optional header row plus data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Option<Vec<String>>,
    pub rows: Vec<Row>,
}

impl RawTable {
    pub fn new(headers: Option<Vec<String>>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub table: String,
    pub columns: Vec<ResolvedColumn>,
    pub rows_inserted: usize,
    /// New lookup rows per foreign-key table.
    pub lookup_rows_inserted: BTreeMap<String, usize>,
}

#[derive(Debug)]
pub struct Importer {
    mapping: MappingFile,
    plan: TransformPlan,
    options: ImportOptions,
}

impl Importer {
    /// Validates the mapping and binds its transforms against `registry`.
    pub fn new(mapping: MappingFile, registry: &TransformRegistry) -> Result<Self> {
        mapping.validate()?;
        let plan = TransformPlan::bind(&mapping.mappings, registry)?;
        Ok(Self {
            mapping,
            plan,
            options: ImportOptions::default(),
        })
    }

    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    /// Infers missing kinds and names against the input.
    pub fn prepare(&self, input: &RawTable) -> Result<ResolvedMapping> {
        let resolved = self.mapping.resolve(
            input.headers.as_deref(),
            &input.rows,
            self.options.sample_rows,
        )?;
        for (rule, column) in self.mapping.mappings.iter().zip(resolved.columns()) {
            if rule.column_name.as_deref() != Some(column.name.as_str()) {
                debug!(
                    "csv_index {} stored as '{}' ({})",
                    column.source_index, column.name, column.kind
                );
            }
        }
        Ok(resolved)
    }

    pub fn run<S: Store + ?Sized>(&self, store: &mut S, input: RawTable) -> Result<ImportSummary> {
        info!(
            "Importing {} row(s) into '{}'",
            input.rows.len(),
            self.mapping.table_name
        );
        let resolved = self.prepare(&input)?;
        info!(
            "Resolved {} column(s): {}",
            resolved.columns().len(),
            resolved
                .columns()
                .iter()
                .map(|column| format!("{} {}", column.name, column.kind))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let rows = if self.plan.is_identity() {
            project(input.rows, &resolved)
        } else {
            self.plan.apply(&input.rows, resolved.columns())?
        };

        store.create_table(&resolved)?;

        let tables = resolve_foreign_keys(store, &resolved, &rows)?;
        let lookup_rows_inserted = tables
            .iter()
            .map(|table| (table.column().to_string(), table.inserted()))
            .collect::<BTreeMap<_, _>>();

        let patched = patch_rows(rows, &tables);
        if let Some(missing) = patched.unresolved.into_iter().next() {
            return Err(DataError::UnresolvedForeignKey {
                row: missing.row,
                column: missing.column,
                value: missing.value,
            }
            .into());
        }

        let rows_inserted =
            store.insert_many(resolved.table_name(), &resolved.storage_names(), &patched.rows)?;
        info!(
            "Inserted {rows_inserted} row(s) into '{}'",
            resolved.table_name()
        );

        Ok(ImportSummary {
            table: resolved.table_name().to_string(),
            columns: resolved.columns().to_vec(),
            rows_inserted,
            lookup_rows_inserted,
        })
    }
}

/// Reorders rows into mapping order when no column has a transform.
fn project(rows: Vec<Row>, mapping: &ResolvedMapping) -> Vec<Row> {
    rows.into_iter()
        .map(|mut row| {
            mapping
                .columns()
                .iter()
                .map(|column| {
                    row.get_mut(column.source_index)
                        .map(std::mem::take)
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ColumnRule;

    #[test]
    fn project_reorders_into_mapping_order() {
        let mapping = MappingFile::new("t", vec![ColumnRule::new(2), ColumnRule::new(0)])
            .resolve(None, &[vec!["a".into(), "b".into(), "c".into()]], 1000)
            .unwrap();
        let rows = vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]];
        assert_eq!(project(rows, &mapping), vec![vec!["c".to_string(), "a".to_string()]]);
    }
}
