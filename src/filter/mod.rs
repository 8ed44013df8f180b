//! Client filter handling
//!
//! Untrusted filters go through three passes before reaching a repository:
//!
//! 1. [`parse_filter`] - grammar, operand types, depth/array/operator limits
//! 2. [`validate_filter_fields`] - operator placement, declared and
//!    filterable fields, condition and `$or` budgets
//! 3. [`apply_replacement`] - logical fields to physical paths
//!
//! [`compile_filter`] runs all three.

mod expr;
mod replace;
mod validate;

pub use expr::{parse_filter, Clause, FieldCondition, FilterExpr};
pub use replace::apply_replacement;
pub use validate::validate_filter_fields;

use serde_json::Value;
use tracing::trace;

use crate::config::FilterConfig;
use crate::fields::FieldOptionsMap;
use crate::predicate::Predicate;
use crate::Result;

/// Parse, validate and rewrite a raw client filter
pub fn compile_filter(raw: &Value, fields: &FieldOptionsMap, config: &FilterConfig) -> Result<Predicate> {
    let expr = parse_filter(raw, config)?;
    validate_filter_fields(&expr, fields, config)?;
    let predicate = apply_replacement(&expr, fields)?;
    trace!(predicate = %predicate.to_json(), "compiled filter");
    Ok(predicate)
}
