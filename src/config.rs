//! Connection and filter configuration

use serde::{Deserialize, Serialize};

/// Bounds applied to client-supplied filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterConfig {
    /// Maximum object nesting, the filter root counting as one.
    pub max_depth: usize,
    /// Maximum number of comparisons in one filter.
    pub max_conditions: usize,
    /// Maximum number of `$or` branches across one filter.
    pub max_or_branches: usize,
    /// Maximum length of any array in a filter.
    pub max_array_length: usize,
    /// Operators rejected outright, e.g. `["$re", "$fulltext"]`.
    pub disabled_operators: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_conditions: 50,
            max_or_branches: 20,
            max_array_length: 100,
            disabled_operators: Vec::new(),
        }
    }
}

impl FilterConfig {
    pub fn is_disabled(&self, operator: &str) -> bool {
        self.disabled_operators.iter().any(|op| op == operator)
    }
}

/// Per-connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub filter: FilterConfig,
    /// Upper bound for `first`/`last`; unbounded when unset.
    pub max_page_size: Option<u32>,
    /// Root alias handed to callback replacements.
    pub alias: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            max_page_size: None,
            alias: "e0".to_string(),
        }
    }
}
