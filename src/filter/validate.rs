//! Semantic validation of parsed filters against declared fields

use crate::config::FilterConfig;
use crate::fields::FieldOptionsMap;
use crate::{ConnectionError, Result};

use super::expr::{Clause, FieldCondition, FilterExpr};

/// Check every key of a parsed filter against the field-options map
///
/// Comparison operators are only legal inside a field; field names only
/// outside one. Fields must be declared and filterable. Also enforces the
/// condition and `$or` branch budgets.
pub fn validate_filter_fields(
    expr: &FilterExpr,
    fields: &FieldOptionsMap,
    config: &FilterConfig,
) -> Result<()> {
    FieldValidator {
        fields,
        config,
        conditions: 0,
        or_branches: 0,
    }
    .visit(expr, None, "filter")
}

struct FieldValidator<'a> {
    fields: &'a FieldOptionsMap,
    config: &'a FilterConfig,
    conditions: usize,
    or_branches: usize,
}

impl FieldValidator<'_> {
    /// `field` is the enclosing field comparison, if any.
    fn visit(&mut self, expr: &FilterExpr, field: Option<&str>, path: &str) -> Result<()> {
        for clause in &expr.clauses {
            match clause {
                Clause::And(branches) => self.visit_all(branches, field, &format!("{path}.$and"))?,
                Clause::Or(branches) => {
                    self.or_branches += branches.len();
                    if self.or_branches > self.config.max_or_branches {
                        return Err(ConnectionError::FilterValidation(format!(
                            "filter has more than {} $or branches",
                            self.config.max_or_branches
                        )));
                    }
                    self.visit_all(branches, field, &format!("{path}.$or"))?;
                }
                Clause::Not(inner) => self.visit(inner, field, &format!("{path}.$not"))?,
                Clause::Compare(op, _) => {
                    if field.is_none() {
                        return Err(ConnectionError::FilterValidation(format!(
                            "operator {op} must be applied to a field ({path}.{op})"
                        )));
                    }
                    self.count_condition()?;
                }
                Clause::Field(name, condition) => {
                    if let Some(outer) = field {
                        return Err(ConnectionError::FilterValidation(format!(
                            "field {name} cannot be nested inside field {outer} ({path}.{name})"
                        )));
                    }
                    self.check_field(name)?;
                    match condition {
                        FieldCondition::Value(_) | FieldCondition::List(_) => self.count_condition()?,
                        FieldCondition::Expr(inner) => {
                            self.visit(inner, Some(name.as_str()), &format!("{path}.{name}"))?
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn visit_all(&mut self, branches: &[FilterExpr], field: Option<&str>, path: &str) -> Result<()> {
        for (i, branch) in branches.iter().enumerate() {
            self.visit(branch, field, &format!("{path}[{i}]"))?;
        }
        Ok(())
    }

    fn check_field(&self, name: &str) -> Result<()> {
        match self.fields.get(name) {
            None => Err(ConnectionError::UnknownField(name.to_string())),
            Some(options) if !options.filterable => {
                Err(ConnectionError::FieldNotFilterable(name.to_string()))
            }
            Some(_) => Ok(()),
        }
    }

    fn count_condition(&mut self) -> Result<()> {
        self.conditions += 1;
        if self.conditions > self.config.max_conditions {
            return Err(ConnectionError::FilterValidation(format!(
                "filter has more than {} conditions",
                self.config.max_conditions
            )));
        }
        Ok(())
    }
}
