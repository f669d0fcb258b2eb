//! Foreign-key normalization: reconcile categorical values with their lookup
//! tables, then swap every raw value for its identifier.
//!
//! Resolution runs against the transformed rows, whose layout is the mapping's
//! column order. Each foreign-key column gets a [`ResolutionTable`] seeded from
//! the lookup table's persisted rows; only values not yet present are
//! inserted, so resolving the same rows twice inserts nothing the second time.

use std::collections::{BTreeSet, HashMap};

use log::{debug, info};

use crate::{
    data::{Row, Value},
    error::StoreError,
    mapping::ResolvedMapping,
    store::{LOOKUP_ID_COLUMN, LOOKUP_VALUE_COLUMN, Store},
};

/// Value → identifier map for one foreign-key column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionTable {
    column: String,
    position: usize,
    ids: HashMap<String, i64>,
    inserted: usize,
}

impl ResolutionTable {
    /// Lookup table (and foreign-key column) name.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Position of the column in the transformed row.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn id_for(&self, value: &str) -> Option<i64> {
        self.ids.get(value).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of lookup rows this run added.
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    pub fn contains_id(&self, id: i64) -> bool {
        self.ids.values().any(|known| *known == id)
    }
}

/// Distinct values observed at `position` across all rows.
pub fn collect_distinct(rows: &[Row], position: usize) -> BTreeSet<&str> {
    rows.iter()
        .filter_map(|row| row.get(position).map(String::as_str))
        .collect()
}

fn read_lookup<S: Store + ?Sized>(
    store: &S,
    table: &str,
) -> Result<HashMap<String, i64>, StoreError> {
    store
        .select_all(table, &[LOOKUP_ID_COLUMN, LOOKUP_VALUE_COLUMN])?
        .into_iter()
        .map(|record| match record.as_slice() {
            [Value::Integer(id), Value::Text(value)] => Ok((value.clone(), *id)),
            [Value::Integer(id), other] => Ok((other.as_display(), *id)),
            _ => Err(StoreError::MalformedLookupRow {
                table: table.to_string(),
                detail: format!("{record:?}"),
            }),
        })
        .collect()
}

/// Builds one resolution table per foreign-key column, inserting only the
/// values the lookup table does not hold yet.
pub fn resolve_foreign_keys<S: Store + ?Sized>(
    store: &mut S,
    mapping: &ResolvedMapping,
    rows: &[Row],
) -> Result<Vec<ResolutionTable>, StoreError> {
    let mut tables = Vec::new();
    for (position, column) in mapping.foreign_keys() {
        let observed = collect_distinct(rows, position);
        let existing = read_lookup(store, &column.name)?;
        let novel = observed
            .into_iter()
            .filter(|value| !existing.contains_key(*value))
            .collect::<Vec<_>>();
        debug!(
            "Lookup '{}' holds {} value(s); {} new",
            column.name,
            existing.len(),
            novel.len()
        );

        for value in &novel {
            store.insert(&column.name, &[(LOOKUP_VALUE_COLUMN, Value::from(*value))])?;
        }

        let ids = if novel.is_empty() {
            existing
        } else {
            read_lookup(store, &column.name)?
        };
        if !novel.is_empty() {
            info!("Added {} value(s) to lookup table '{}'", novel.len(), column.name);
        }
        tables.push(ResolutionTable {
            column: column.name.clone(),
            position,
            ids,
            inserted: novel.len(),
        });
    }
    Ok(tables)
}

/// A foreign-key cell whose value had no identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedKey {
    /// 1-based data row number.
    pub row: usize,
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchedRows {
    pub rows: Vec<Vec<Value>>,
    pub unresolved: Vec<UnresolvedKey>,
}

/// Replaces every foreign-key cell with its identifier. A value missing from
/// its table is written as [`Value::Null`] and reported in `unresolved`.
pub fn patch_rows(rows: Vec<Row>, tables: &[ResolutionTable]) -> PatchedRows {
    let mut unresolved = Vec::new();
    let patched = rows
        .into_iter()
        .enumerate()
        .map(|(row_idx, row)| {
            let mut cells = row.into_iter().map(Value::Text).collect::<Vec<_>>();
            for table in tables {
                let Some(cell) = cells.get_mut(table.position) else {
                    continue;
                };
                let raw = std::mem::replace(cell, Value::Null);
                let raw = match raw {
                    Value::Text(text) => text,
                    other => other.as_display(),
                };
                match table.id_for(&raw) {
                    Some(id) => *cell = Value::Integer(id),
                    None => unresolved.push(UnresolvedKey {
                        row: row_idx + 1,
                        column: table.column.clone(),
                        value: raw,
                    }),
                }
            }
            cells
        })
        .collect();
    PatchedRows {
        rows: patched,
        unresolved,
    }
}
