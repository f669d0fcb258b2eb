//! Named value transformations and the step that applies them to rows.
//!
//! The [`TransformRegistry`] is an explicit name → function table that the
//! caller builds up front (built-ins plus any expression file the mapping
//! points at) and passes into the pipeline. Binding a mapping against the
//! registry happens before any row is read, so a misspelled transform name
//! fails fast.

pub mod expression;
pub mod string_ops;

use std::{collections::BTreeMap, fmt, path::Path, sync::Arc};

use log::{debug, info};

use crate::{
    data::Row,
    error::{ConfigError, DataError, TransformFailure},
    mapping::{ColumnRule, ResolvedColumn},
};

pub type TransformFn = dyn Fn(&str) -> Result<String, TransformFailure> + Send + Sync;

#[derive(Clone, Default)]
pub struct TransformRegistry {
    functions: BTreeMap<String, Arc<TransformFn>>,
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.functions.keys()).finish()
    }
}

impl TransformRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_infallible("lowercase", string_ops::lowercase);
        registry.register_infallible("uppercase", string_ops::uppercase);
        registry.register_infallible("trim", string_ops::trim);
        registry.register_infallible("collapse_whitespace", string_ops::collapse_whitespace);
        registry.register_infallible("snake_case", string_ops::snake_case);
        registry.register_infallible("camel_case", string_ops::camel_case);
        registry.register_infallible("pascal_case", string_ops::pascal_case);
        registry.register_infallible("digits_only", string_ops::digits_only);
        registry.register_infallible("strip_thousands", string_ops::strip_thousands);
        registry.register("iso_date", string_ops::iso_date);
        registry.register("boolean_01", string_ops::boolean_01);
        registry
    }

    /// Adds or replaces the function bound to `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&str) -> Result<String, TransformFailure> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    fn register_infallible(&mut self, name: &str, op: fn(&str) -> std::borrow::Cow<'_, str>) {
        self.register(name, move |value| Ok(op(value).into_owned()));
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<TransformFn>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Binds every expression in a transformations file under its own name,
    /// shadowing built-ins of the same name. Returns how many were bound.
    pub fn load_expressions(&mut self, path: &Path) -> Result<usize, ConfigError> {
        let transforms = expression::load_expression_file(path)?;
        let count = transforms.len();
        for transform in transforms {
            let name = transform.name().to_string();
            if self.contains(&name) {
                debug!("Custom transformation '{name}' shadows an existing one");
            }
            self.register(name, move |value| transform.evaluate(value));
        }
        info!("Bound {count} custom transformation(s) from {path:?}");
        Ok(count)
    }
}

#[derive(Clone)]
struct BoundTransform {
    name: String,
    function: Arc<TransformFn>,
}

/// Transform functions bound per column, in mapping order.
#[derive(Clone, Default)]
pub struct TransformPlan {
    steps: Vec<Option<BoundTransform>>,
}

impl fmt::Debug for TransformPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|step| step.as_ref().map(|s| &s.name)))
            .finish()
    }
}

impl TransformPlan {
    /// Resolves each rule's `transform` against the registry.
    pub fn bind(rules: &[ColumnRule], registry: &TransformRegistry) -> Result<Self, ConfigError> {
        let steps = rules
            .iter()
            .map(|rule| match rule.transform.as_deref() {
                None => Ok(None),
                Some(name) => registry
                    .resolve(name)
                    .map(|function| {
                        Some(BoundTransform {
                            name: name.to_string(),
                            function,
                        })
                    })
                    .ok_or_else(|| ConfigError::UnknownTransform {
                        index: rule.csv_index,
                        name: name.to_string(),
                    }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { steps })
    }

    pub fn is_identity(&self) -> bool {
        self.steps.iter().all(Option::is_none)
    }

    /// Projects every row onto the mapped columns, in mapping order, running
    /// each cell through its bound transform. The first failing value aborts.
    pub fn apply(&self, rows: &[Row], columns: &[ResolvedColumn]) -> Result<Vec<Row>, DataError> {
        debug_assert_eq!(self.steps.len(), columns.len());
        rows.iter()
            .enumerate()
            .map(|(row_idx, row)| {
                columns
                    .iter()
                    .zip(&self.steps)
                    .map(|(column, step)| {
                        let raw = row.get(column.source_index).map(String::as_str).unwrap_or("");
                        match step {
                            None => Ok(raw.to_string()),
                            Some(bound) => (bound.function)(raw).map_err(|source| {
                                DataError::TransformFailed {
                                    row: row_idx + 1,
                                    column: column.name.clone(),
                                    transform: bound.name.clone(),
                                    value: raw.to_string(),
                                    source,
                                }
                            }),
                        }
                    })
                    .collect::<Result<Row, DataError>>()
            })
            .collect()
    }
}
