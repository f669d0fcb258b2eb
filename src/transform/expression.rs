//! Custom transformations defined as `evalexpr` expressions.
//!
//! A transformations file is a flat YAML or JSON map from function name to
//! expression. Each expression sees the cell as the string variable `value`
//! and may call the string helpers registered below, e.g.
//!
//! ```yaml
//! city_code: uppercase(substring(trim(value), 0, 3))
//! slug: '"c-" + snake_case(value)'
//! ```

use std::{collections::BTreeMap, fs, path::Path};

use evalexpr::{
    ContextWithMutableFunctions, ContextWithMutableVariables, EvalexprError, Function,
    HashMapContext, Node, Value as EvalValue, build_operator_tree,
};
use log::debug;
use regex::Regex;

use crate::{
    error::{ConfigError, TransformFailure},
    transform::string_ops,
};

#[derive(Debug)]
pub struct ExpressionTransform {
    name: String,
    node: Node,
}

impl ExpressionTransform {
    pub fn compile(name: &str, expression: &str) -> Result<Self, ConfigError> {
        let node: Node = build_operator_tree(expression).map_err(|err| {
            ConfigError::InvalidExpression {
                name: name.to_string(),
                message: err.to_string(),
            }
        })?;
        Ok(Self {
            name: name.to_string(),
            node,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, value: &str) -> Result<String, TransformFailure> {
        let context = build_context(value).map_err(|err| TransformFailure::new(err.to_string()))?;
        let result = self
            .node
            .eval_with_context(&context)
            .map_err(|err| TransformFailure::new(format!("{}: {err}", self.name)))?;
        Ok(render(result))
    }
}

/// Reads every expression from a transformations file, compiling each one.
/// Names starting with `__` are treated as private and skipped.
pub fn load_expression_file(path: &Path) -> Result<Vec<ExpressionTransform>, ConfigError> {
    let unreadable = |message: String| ConfigError::TransformationsUnreadable {
        path: path.to_path_buf(),
        message,
    };
    let raw = fs::read_to_string(path).map_err(|err| unreadable(err.to_string()))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let entries: BTreeMap<String, String> = if is_json {
        serde_json::from_str(&raw).map_err(|err| unreadable(err.to_string()))?
    } else {
        serde_yaml::from_str(&raw).map_err(|err| unreadable(err.to_string()))?
    };
    entries
        .iter()
        .filter(|(name, _)| !name.starts_with("__"))
        .map(|(name, expression)| {
            debug!("Compiling transformation '{name}' = {expression}");
            ExpressionTransform::compile(name, expression)
        })
        .collect()
}

fn render(result: EvalValue) -> String {
    match result {
        EvalValue::String(s) => s,
        EvalValue::Int(i) => i.to_string(),
        EvalValue::Float(f) => f.to_string(),
        EvalValue::Boolean(b) => b.to_string(),
        EvalValue::Tuple(values) => values
            .into_iter()
            .map(render)
            .collect::<Vec<_>>()
            .join("|"),
        EvalValue::Empty => String::new(),
    }
}

fn build_context(value: &str) -> Result<HashMapContext, EvalexprError> {
    let mut context = HashMapContext::new();
    register_string_functions(&mut context)?;
    context.set_value("value".into(), EvalValue::String(value.to_string()))?;
    Ok(context)
}

fn unary(
    context: &mut HashMapContext,
    name: &'static str,
    op: fn(&str) -> std::borrow::Cow<'_, str>,
) -> Result<(), EvalexprError> {
    context.set_function(
        name.into(),
        Function::new(move |arguments| {
            let args = expect_args(arguments, 1, name)?;
            let value = expect_string(&args[0], "value")?;
            Ok(EvalValue::String(op(value).into_owned()))
        }),
    )
}

fn register_string_functions(context: &mut HashMapContext) -> Result<(), EvalexprError> {
    unary(context, "lowercase", string_ops::lowercase)?;
    unary(context, "uppercase", string_ops::uppercase)?;
    unary(context, "trim", string_ops::trim)?;
    unary(context, "snake_case", string_ops::snake_case)?;
    unary(context, "camel_case", string_ops::camel_case)?;
    unary(context, "pascal_case", string_ops::pascal_case)?;

    context.set_function(
        "substring".into(),
        Function::new(|arguments| {
            let args = expect_args(arguments, 3, "substring")?;
            let value = expect_string(&args[0], "value")?;
            let start = parse_i64_arg(&args[1], "start")?.max(0) as usize;
            let length = parse_i64_arg(&args[2], "length")?.max(0) as usize;
            Ok(EvalValue::String(
                string_ops::substring(value, start, length).into_owned(),
            ))
        }),
    )?;

    context.set_function(
        "regex_replace".into(),
        Function::new(|arguments| {
            let args = expect_args(arguments, 3, "regex_replace")?;
            let value = expect_string(&args[0], "value")?;
            let pattern = expect_string(&args[1], "pattern")?;
            let replacement = expect_string(&args[2], "replacement")?;
            let regex =
                Regex::new(pattern).map_err(|err| eval_error(&format!("Invalid regex: {err}")))?;
            Ok(EvalValue::String(
                string_ops::regex_replace(value, &regex, replacement).into_owned(),
            ))
        }),
    )?;

    Ok(())
}

fn expect_args(
    arguments: &EvalValue,
    expected: usize,
    name: &str,
) -> Result<Vec<EvalValue>, EvalexprError> {
    match arguments {
        value if expected == 1 && !matches!(value, EvalValue::Tuple(_)) => Ok(vec![value.clone()]),
        EvalValue::Tuple(values) => {
            if values.len() != expected {
                return Err(EvalexprError::wrong_function_argument_amount(
                    values.len(),
                    expected,
                ));
            }
            Ok(values.clone())
        }
        _ => Err(eval_error(&format!(
            "{name} expects {expected} arguments provided as a tuple"
        ))),
    }
}

fn eval_error(message: &str) -> EvalexprError {
    EvalexprError::CustomMessage(message.to_string())
}

fn parse_i64_arg(value: &EvalValue, name: &str) -> Result<i64, EvalexprError> {
    match value {
        EvalValue::Int(i) => Ok(*i),
        EvalValue::Float(f) => Ok(*f as i64),
        other => Err(eval_error(&format!(
            "Expected integer for {name}, got {other:?}"
        ))),
    }
}

fn expect_string<'a>(value: &'a EvalValue, name: &str) -> Result<&'a str, EvalexprError> {
    if let EvalValue::String(s) = value {
        Ok(s)
    } else {
        Err(eval_error(&format!("Expected string for {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_against_value_variable() {
        let transform = ExpressionTransform::compile("shout", "uppercase(trim(value))").unwrap();
        assert_eq!(transform.evaluate("  nyc ").unwrap(), "NYC");
    }

    #[test]
    fn substring_and_regex_are_available() {
        let code = ExpressionTransform::compile("code", "substring(value, 0, 3)").unwrap();
        assert_eq!(code.evaluate("Boston").unwrap(), "Bos");

        let digits =
            ExpressionTransform::compile("digits", r#"regex_replace(value, "[^0-9]", "")"#)
                .unwrap();
        assert_eq!(digits.evaluate("a1b2").unwrap(), "12");
    }

    #[test]
    fn non_string_results_are_rendered() {
        let length = ExpressionTransform::compile("len", "len(value)").unwrap();
        assert_eq!(length.evaluate("abcd").unwrap(), "4");
    }

    #[test]
    fn invalid_expression_is_a_config_error() {
        let err = ExpressionTransform::compile("broken", "uppercase(value").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidExpression { .. }));
    }

    #[test]
    fn evaluation_errors_surface_as_failures() {
        let transform = ExpressionTransform::compile("bad", "value + 1").unwrap();
        assert!(transform.evaluate("x").is_err());
    }
}
