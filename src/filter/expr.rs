//! Filter grammar and structural parsing
//!
//! A filter is a JSON object whose keys are logical operators (`$and`,
//! `$or`, `$not`), comparison operators (`$eq`, `$in`, ...) or field names.
//! Parsing checks shape, operand types and the configured size bounds;
//! whether keys make sense where they appear is left to
//! [`validate_filter_fields`](super::validate_filter_fields).

use serde_json::{Map, Value};

use crate::config::FilterConfig;
use crate::predicate::{ComparisonOperator, Operand};
use crate::{ConnectionError, Result};

/// One JSON object of a filter; its clauses are implicitly AND-ed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterExpr {
    pub clauses: Vec<Clause>,
}

/// A single key of a filter object
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
    Compare(ComparisonOperator, Operand),
    Field(String, FieldCondition),
}

/// What a field key maps to
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCondition {
    /// `{ field: value }`, shorthand for `$eq`
    Value(Value),
    /// `{ field: [values] }`, shorthand for `$in`
    List(Vec<Value>),
    /// `{ field: { $op: ... } }`
    Expr(FilterExpr),
}

/// Parse a raw filter, enforcing depth, array length and disabled operators
pub fn parse_filter(value: &Value, config: &FilterConfig) -> Result<FilterExpr> {
    Parser { config }.expr(value, "filter", 1)
}

struct Parser<'a> {
    config: &'a FilterConfig,
}

impl Parser<'_> {
    fn expr(&self, value: &Value, path: &str, depth: usize) -> Result<FilterExpr> {
        if depth > self.config.max_depth {
            return Err(invalid(format!(
                "{path} exceeds the maximum depth of {}",
                self.config.max_depth
            )));
        }
        let Value::Object(map) = value else {
            return Err(invalid(format!("{path} must be an object, got {}", kind(value))));
        };
        self.object(map, path, depth)
    }

    fn object(&self, map: &Map<String, Value>, path: &str, depth: usize) -> Result<FilterExpr> {
        let mut clauses = Vec::with_capacity(map.len());

        for (key, value) in map {
            let path = format!("{path}.{key}");
            if key.starts_with('$') && self.config.is_disabled(key) {
                return Err(invalid(format!("operator {key} is disabled ({path})")));
            }

            let clause = match key.as_str() {
                "$and" => Clause::And(self.branches(value, &path, depth)?),
                "$or" => Clause::Or(self.branches(value, &path, depth)?),
                "$not" => Clause::Not(Box::new(self.expr(value, &path, depth + 1)?)),
                op if op.starts_with('$') => {
                    let op = ComparisonOperator::parse(op)
                        .ok_or_else(|| invalid(format!("unknown operator {key} ({path})")))?;
                    Clause::Compare(op, self.operand(op, value, &path)?)
                }
                field => Clause::Field(field.to_string(), self.field(value, &path, depth)?),
            };
            clauses.push(clause);
        }

        Ok(FilterExpr { clauses })
    }

    fn branches(&self, value: &Value, path: &str, depth: usize) -> Result<Vec<FilterExpr>> {
        let Value::Array(items) = value else {
            return Err(invalid(format!("{path} must be an array, got {}", kind(value))));
        };
        if items.is_empty() {
            return Err(invalid(format!("{path} must contain at least one condition")));
        }
        self.check_length(items, path)?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.expr(item, &format!("{path}[{i}]"), depth + 1))
            .collect()
    }

    fn field(&self, value: &Value, path: &str, depth: usize) -> Result<FieldCondition> {
        match value {
            Value::Object(_) => Ok(FieldCondition::Expr(self.expr(value, path, depth + 1)?)),
            Value::Array(items) => Ok(FieldCondition::List(self.primitives(items, path)?)),
            primitive => Ok(FieldCondition::Value(primitive.clone())),
        }
    }

    fn operand(&self, op: ComparisonOperator, value: &Value, path: &str) -> Result<Operand> {
        if op.takes_list() {
            let Value::Array(items) = value else {
                return Err(invalid(format!("{path} must be an array, got {}", kind(value))));
            };
            return Ok(Operand::List(self.primitives(items, path)?));
        }

        if op.takes_string() {
            let Value::String(s) = value else {
                return Err(invalid(format!("{path} must be a string, got {}", kind(value))));
            };
            if op == ComparisonOperator::Re {
                regex::Regex::new(s)
                    .map_err(|e| invalid(format!("{path} is not a valid regular expression: {e}")))?;
            }
            return Ok(Operand::Scalar(value.clone()));
        }

        if !is_primitive(value) {
            return Err(invalid(format!(
                "{path} must be a string, number, boolean or null, got {}",
                kind(value)
            )));
        }
        Ok(Operand::Scalar(value.clone()))
    }

    fn primitives(&self, items: &[Value], path: &str) -> Result<Vec<Value>> {
        self.check_length(items, path)?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                if is_primitive(item) {
                    Ok(item.clone())
                } else {
                    Err(invalid(format!(
                        "{path}[{i}] must be a string, number, boolean or null, got {}",
                        kind(item)
                    )))
                }
            })
            .collect()
    }

    fn check_length(&self, items: &[Value], path: &str) -> Result<()> {
        if items.len() > self.config.max_array_length {
            return Err(invalid(format!(
                "{path} has {} items, more than the maximum of {}",
                items.len(),
                self.config.max_array_length
            )));
        }
        Ok(())
    }
}

fn is_primitive(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn invalid(message: String) -> ConnectionError {
    ConnectionError::FilterValidation(message)
}
