//! Rewriting validated filters onto physical field paths

use crate::fields::FieldOptionsMap;
use crate::predicate::{ComparisonOperator, Operand, Predicate};
use crate::{ConnectionError, Result};

use super::expr::{Clause, FieldCondition, FilterExpr};

/// Lower a validated filter into a [`Predicate`] over physical paths
///
/// Field keys are replaced by their declared replacement (or field path);
/// logical nesting is kept, and logic inside a field is pushed down onto
/// that field's comparisons.
pub fn apply_replacement(expr: &FilterExpr, fields: &FieldOptionsMap) -> Result<Predicate> {
    lower(expr, fields, None)
}

fn lower(expr: &FilterExpr, fields: &FieldOptionsMap, path: Option<&str>) -> Result<Predicate> {
    let parts = expr
        .clauses
        .iter()
        .map(|clause| lower_clause(clause, fields, path))
        .collect::<Result<Vec<_>>>()?;
    Ok(Predicate::and(parts))
}

fn lower_clause(clause: &Clause, fields: &FieldOptionsMap, path: Option<&str>) -> Result<Predicate> {
    let lower_all = |branches: &[FilterExpr]| {
        branches
            .iter()
            .map(|branch| lower(branch, fields, path))
            .collect::<Result<Vec<_>>>()
    };

    match clause {
        Clause::And(branches) => Ok(Predicate::and(lower_all(branches)?)),
        Clause::Or(branches) => Ok(Predicate::or(lower_all(branches)?)),
        Clause::Not(inner) => Ok(Predicate::not(lower(inner, fields, path)?)),
        Clause::Compare(op, operand) => {
            let path = path.ok_or_else(|| {
                ConnectionError::FilterValidation(format!("operator {op} must be applied to a field"))
            })?;
            Ok(Predicate::Compare {
                path: path.to_string(),
                op: *op,
                operand: operand.clone(),
            })
        }
        Clause::Field(name, condition) => {
            let physical = fields
                .physical_path(name)
                .ok_or_else(|| ConnectionError::UnknownField(name.clone()))?;
            Ok(match condition {
                FieldCondition::Value(value) => Predicate::Compare {
                    path: physical,
                    op: ComparisonOperator::Eq,
                    operand: Operand::Scalar(value.clone()),
                },
                FieldCondition::List(values) => Predicate::Compare {
                    path: physical,
                    op: ComparisonOperator::In,
                    operand: Operand::List(values.clone()),
                },
                FieldCondition::Expr(inner) => lower(inner, fields, Some(physical.as_str()))?,
            })
        }
    }
}
