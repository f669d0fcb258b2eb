//! Mapping descriptor: the declared form read from disk and the resolved form
//! the pipeline works with.
//!
//! A [`MappingFile`] mirrors the JSON/YAML document a user writes. Column names
//! and data kinds are optional there. [`MappingFile::resolve`] fills both in
//! (sampling rows for kinds, headers for names), makes every name unique, and
//! hands back a [`ResolvedMapping`] whose columns always carry a name and a
//! kind. Only the resolved form can reach the storage backend.

use std::{
    borrow::Cow,
    collections::HashSet,
    fmt,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result as AnyResult};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{
    data::Row,
    error::ConfigError,
    inference, naming,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Integer,
    Real,
    Text,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Integer => "integer",
            DataKind::Real => "real",
            DataKind::Text => "text",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" => Ok(DataKind::Integer),
            "real" | "float" => Ok(DataKind::Real),
            "text" | "string" | "str" => Ok(DataKind::Text),
            other => Err(format!(
                "unknown data_type '{other}' (expected integer, real or text)"
            )),
        }
    }
}

impl Serialize for DataKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DataKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyRole {
    Pk,
    Fk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Plain,
    PrimaryKey,
    ForeignKey,
}

impl From<Option<KeyRole>> for Role {
    fn from(key: Option<KeyRole>) -> Self {
        match key {
            None => Role::Plain,
            Some(KeyRole::Pk) => Role::PrimaryKey,
            Some(KeyRole::Fk) => Role::ForeignKey,
        }
    }
}

/// One column rule as written in the mapping file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRule {
    pub csv_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<KeyRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
}

impl ColumnRule {
    pub fn new(csv_index: usize) -> Self {
        Self {
            csv_index,
            column_name: None,
            data_type: None,
            key: None,
            transform: None,
        }
    }

    pub fn role(&self) -> Role {
        Role::from(self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingFile {
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformations: Option<String>,
    pub mappings: Vec<ColumnRule>,
    #[serde(skip)]
    source: Option<PathBuf>,
}

impl MappingFile {
    pub fn new(table_name: impl Into<String>, mappings: Vec<ColumnRule>) -> Self {
        Self {
            table_name: table_name.into(),
            transformations: None,
            mappings,
            source: None,
        }
    }

    /// Loads a mapping from JSON, or from YAML when the extension says so.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let malformed = |message: String| ConfigError::MalformedMapping {
            path: path.to_path_buf(),
            message,
        };
        let raw = fs::read_to_string(path).map_err(|err| malformed(err.to_string()))?;
        let mut mapping: MappingFile = if is_yaml_path(path) {
            serde_yaml::from_str(&raw).map_err(|err| malformed(err.to_string()))?
        } else {
            serde_json::from_str(&raw).map_err(|err| malformed(err.to_string()))?
        };
        mapping.source = Some(path.to_path_buf());
        mapping.validate()?;
        Ok(mapping)
    }

    pub fn save(&self, path: &Path) -> AnyResult<()> {
        let rendered = self.render(is_yaml_path(path))?;
        fs::write(path, rendered).with_context(|| format!("Writing mapping file {path:?}"))
    }

    pub fn render(&self, yaml: bool) -> AnyResult<String> {
        if yaml {
            serde_yaml::to_string(self).context("Serializing mapping YAML")
        } else {
            serde_json::to_string_pretty(self).context("Serializing mapping JSON")
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mappings.is_empty() {
            return Err(ConfigError::EmptyMapping {
                table: self.table_name.clone(),
            });
        }
        let mut seen = HashSet::new();
        for rule in &self.mappings {
            if !seen.insert(rule.csv_index) {
                return Err(ConfigError::DuplicateSourceIndex {
                    index: rule.csv_index,
                });
            }
        }
        Ok(())
    }

    /// Path of the custom transformations unit, relative to the mapping file.
    pub fn transformations_path(&self) -> Option<PathBuf> {
        let name = self.transformations.as_deref()?;
        let base = self
            .source
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""));
        Some(base.join(name))
    }

    /// Fills in missing kinds and names and makes the names unique.
    ///
    /// `headers` is the stripped header row, if the input had one. Kinds are
    /// inferred from at most `sample_rows` rows (0 samples every row).
    pub fn resolve(
        &self,
        headers: Option<&[String]>,
        rows: &[Row],
        sample_rows: usize,
    ) -> Result<ResolvedMapping, ConfigError> {
        self.validate()?;
        if let Some(widest) = self.mappings.iter().max_by_key(|rule| rule.csv_index) {
            let index = widest.csv_index;
            if let Some((row_idx, row)) = rows
                .iter()
                .enumerate()
                .find(|(_, row)| row.len() <= index)
            {
                return Err(ConfigError::SourceIndexOutOfRange {
                    index,
                    row: row_idx + 1,
                    width: row.len(),
                });
            }
            if let Some(headers) = headers.filter(|_| rows.is_empty()) {
                if headers.len() <= index {
                    return Err(ConfigError::SourceIndexOutOfRange {
                        index,
                        row: 0,
                        width: headers.len(),
                    });
                }
            }
        }

        let declared_names = self
            .mappings
            .iter()
            .map(|rule| {
                rule.column_name
                    .clone()
                    .unwrap_or_else(|| naming::derive_name(headers, rule.csv_index))
            })
            .collect::<Vec<_>>();
        let names = naming::uniquify_names(&declared_names);

        let columns = self
            .mappings
            .iter()
            .zip(names)
            .map(|(rule, name)| {
                let kind = match rule.data_type {
                    Some(kind) => kind,
                    None => {
                        let inferred = inference::infer_kind(rows, rule.csv_index, sample_rows);
                        debug!("Inferred {inferred} for csv_index {}", rule.csv_index);
                        inferred
                    }
                };
                ResolvedColumn {
                    source_index: rule.csv_index,
                    name,
                    kind,
                    role: rule.role(),
                    transform: rule.transform.clone(),
                }
            })
            .collect();

        ResolvedMapping::new(self.table_name.clone(), columns)
    }
}

fn is_yaml_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml")
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub source_index: usize,
    pub name: String,
    pub kind: DataKind,
    pub role: Role,
    pub transform: Option<String>,
}

impl ResolvedColumn {
    pub fn is_foreign_key(&self) -> bool {
        self.role == Role::ForeignKey
    }

    pub fn is_primary_key(&self) -> bool {
        self.role == Role::PrimaryKey
    }

    /// Column name in the destination table. Foreign keys point at their
    /// lookup table through `<name>_id`.
    pub fn storage_name(&self) -> Cow<'_, str> {
        if self.is_foreign_key() {
            Cow::Owned(format!("{}_id", self.name))
        } else {
            Cow::Borrowed(&self.name)
        }
    }
}

/// A mapping whose columns all carry a unique name and a data kind.
///
/// Column order is the declared order and doubles as the layout of
/// transformed rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMapping {
    table_name: String,
    columns: Vec<ResolvedColumn>,
}

impl ResolvedMapping {
    pub(crate) fn new(
        table_name: String,
        columns: Vec<ResolvedColumn>,
    ) -> Result<Self, ConfigError> {
        // SQLite folds identifier case, so `Name` and `name` are one column.
        let mut storage_names = HashSet::new();
        for column in &columns {
            let storage = column.storage_name().into_owned();
            if !storage_names.insert(storage.to_ascii_lowercase()) {
                return Err(ConfigError::StorageNameCollision { name: storage });
            }
            if column.is_foreign_key() && column.name.eq_ignore_ascii_case(&table_name) {
                return Err(ConfigError::LookupTableCollision {
                    name: column.name.clone(),
                });
            }
        }
        Ok(Self {
            table_name,
            columns,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[ResolvedColumn] {
        &self.columns
    }

    /// Foreign-key columns paired with their position in the transformed row.
    pub fn foreign_keys(&self) -> impl Iterator<Item = (usize, &ResolvedColumn)> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.is_foreign_key())
    }

    pub fn storage_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| column.storage_name().into_owned())
            .collect()
    }

    /// Writes the resolved columns back out as an explicit mapping file.
    pub fn to_mapping_file(&self) -> MappingFile {
        let mappings = self
            .columns
            .iter()
            .map(|column| ColumnRule {
                csv_index: column.source_index,
                column_name: Some(column.name.clone()),
                data_type: Some(column.kind),
                key: match column.role {
                    Role::Plain => None,
                    Role::PrimaryKey => Some(KeyRole::Pk),
                    Role::ForeignKey => Some(KeyRole::Fk),
                },
                transform: column.transform.clone(),
            })
            .collect();
        MappingFile::new(self.table_name.clone(), mappings)
    }
}
