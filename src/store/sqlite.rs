use std::{collections::HashMap, path::Path};

use itertools::Itertools;
use log::debug;
use rusqlite::{
    Connection, params_from_iter,
    types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef},
};

use super::{LOOKUP_ID_COLUMN, LOOKUP_VALUE_COLUMN, Store};
use crate::{
    data::Value,
    error::StoreError,
    mapping::{DataKind, ResolvedMapping},
};

/// SQLite-backed [`Store`].
///
/// Column kinds declared through [`Store::create_table`] are remembered so
/// that text cells can be coerced to integers/reals before they are bound.
pub struct SqliteStore {
    conn: Connection,
    kinds: HashMap<String, HashMap<String, DataKind>>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        debug!("Opened SQLite database {path:?}");
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn,
            kinds: HashMap::new(),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn row_count(&self, table: &str) -> Result<usize, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn remember_kinds(
        &mut self,
        table: &str,
        columns: impl IntoIterator<Item = (String, DataKind)>,
    ) {
        self.kinds
            .entry(table.to_string())
            .or_default()
            .extend(columns);
    }

    fn column_kinds(&self, table: &str, columns: &[String]) -> Vec<Option<DataKind>> {
        let known = self.kinds.get(table);
        columns
            .iter()
            .map(|column| known.and_then(|kinds| kinds.get(column)).copied())
            .collect()
    }
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn lookup_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({} INTEGER PRIMARY KEY AUTOINCREMENT, {} TEXT NOT NULL UNIQUE)",
        quote_ident(table),
        quote_ident(LOOKUP_ID_COLUMN),
        quote_ident(LOOKUP_VALUE_COLUMN)
    )
}

impl Store for SqliteStore {
    fn create_table(&mut self, mapping: &ResolvedMapping) -> Result<(), StoreError> {
        for (_, column) in mapping.foreign_keys() {
            let sql = lookup_table_sql(&column.name);
            debug!("{sql}");
            self.conn.execute(&sql, [])?;
            self.remember_kinds(
                &column.name,
                [
                    (LOOKUP_ID_COLUMN.to_string(), DataKind::Integer),
                    (LOOKUP_VALUE_COLUMN.to_string(), DataKind::Text),
                ],
            );
        }

        let mut definitions = mapping
            .columns()
            .iter()
            .map(|column| {
                let name = quote_ident(&column.storage_name());
                if column.is_foreign_key() {
                    format!(
                        "{name} INTEGER REFERENCES {}({})",
                        quote_ident(&column.name),
                        quote_ident(LOOKUP_ID_COLUMN)
                    )
                } else {
                    format!("{name} {}", self.storage_type(column.kind))
                }
            })
            .collect::<Vec<_>>();
        let primary_keys = mapping
            .columns()
            .iter()
            .filter(|column| column.is_primary_key())
            .map(|column| quote_ident(&column.storage_name()))
            .collect::<Vec<_>>();
        if !primary_keys.is_empty() {
            definitions.push(format!("PRIMARY KEY ({})", primary_keys.join(", ")));
        }

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(mapping.table_name()),
            definitions.join(", ")
        );
        debug!("{sql}");
        self.conn.execute(&sql, [])?;

        let kinds = mapping
            .columns()
            .iter()
            .map(|column| {
                let kind = if column.is_foreign_key() {
                    DataKind::Integer
                } else {
                    column.kind
                };
                (column.storage_name().into_owned(), kind)
            })
            .collect::<Vec<_>>();
        self.remember_kinds(mapping.table_name(), kinds);
        Ok(())
    }

    fn select_all(&self, table: &str, columns: &[&str]) -> Result<Vec<Vec<Value>>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {}",
            columns.iter().map(|column| quote_ident(column)).join(", "),
            quote_ident(table)
        );
        let mut statement = self.conn.prepare(&sql)?;
        let width = columns.len();
        let rows = statement
            .query_map([], |row| {
                (0..width)
                    .map(|idx| row.get_ref(idx).map(value_from_ref))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn insert(&mut self, table: &str, record: &[(&str, Value)]) -> Result<(), StoreError> {
        let names = record.iter().map(|(name, _)| name.to_string()).collect::<Vec<_>>();
        let kinds = self.column_kinds(table, &names);
        let sql = insert_sql(table, &names);
        let values = record
            .iter()
            .zip(kinds)
            .map(|((_, value), kind)| coerce(value.clone(), kind))
            .collect::<Vec<_>>();
        self.conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(())
    }

    fn insert_many(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<usize, StoreError> {
        let kinds = self.column_kinds(table, columns);
        let sql = insert_sql(table, columns);
        let tx = self.conn.transaction()?;
        let mut written = 0usize;
        {
            let mut statement = tx.prepare(&sql)?;
            for row in rows {
                let values = row
                    .iter()
                    .zip(&kinds)
                    .map(|(value, kind)| coerce(value.clone(), *kind))
                    .collect::<Vec<_>>();
                written += statement.execute(params_from_iter(values.iter()))?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn storage_type(&self, kind: DataKind) -> &'static str {
        match kind {
            DataKind::Integer => "INTEGER",
            DataKind::Real => "REAL",
            DataKind::Text => "TEXT",
        }
    }
}

fn insert_sql(table: &str, columns: &[String]) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.iter().map(|column| quote_ident(column)).join(", "),
        (1..=columns.len()).map(|idx| format!("?{idx}")).join(", ")
    )
}

fn coerce(value: Value, kind: Option<DataKind>) -> Value {
    match kind {
        Some(kind) => value.coerce(kind),
        None => value,
    }
}

fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}
