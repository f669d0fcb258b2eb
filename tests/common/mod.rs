#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv2sqlite::data::Row;
use rusqlite::Connection;
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn database(&self) -> PathBuf {
        self.temp_dir.path().join("out.sqlite")
    }
}

pub fn rows(values: &[&[&str]]) -> Vec<Row> {
    values
        .iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

pub fn table_exists(conn: &Connection, table: &str) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .expect("query sqlite_master")
        > 0
}

/// Declared SQLite type per column, in table order.
pub fn column_types(conn: &Connection, table: &str) -> Vec<(String, String)> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info(\"{table}\")"))
        .expect("prepare table_info");
    stmt.query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))
        .expect("query table_info")
        .collect::<Result<Vec<_>, _>>()
        .expect("collect table_info")
}

pub fn lookup_rows(conn: &Connection, table: &str) -> Vec<(i64, String)> {
    let mut stmt = conn
        .prepare(&format!("SELECT id, value FROM \"{table}\" ORDER BY id"))
        .expect("prepare lookup select");
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .expect("query lookup")
        .collect::<Result<Vec<_>, _>>()
        .expect("collect lookup")
}
