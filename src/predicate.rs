//! Physical query predicates handed to the repository

use std::fmt;

use serde_json::{Map, Value};

/// Comparison operators accepted inside a field condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Like,
    Ilike,
    Re,
    Fulltext,
    Contains,
    Overlap,
}

impl ComparisonOperator {
    pub const ALL: [ComparisonOperator; 14] = [
        Self::Eq,
        Self::Ne,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::In,
        Self::Nin,
        Self::Like,
        Self::Ilike,
        Self::Re,
        Self::Fulltext,
        Self::Contains,
        Self::Overlap,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::In => "$in",
            Self::Nin => "$nin",
            Self::Like => "$like",
            Self::Ilike => "$ilike",
            Self::Re => "$re",
            Self::Fulltext => "$fulltext",
            Self::Contains => "$contains",
            Self::Overlap => "$overlap",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == key)
    }

    /// Operators whose operand is an array of primitives.
    pub fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::Nin | Self::Contains | Self::Overlap)
    }

    /// Operators whose operand must be a string.
    pub fn takes_string(self) -> bool {
        matches!(self, Self::Like | Self::Ilike | Self::Re | Self::Fulltext)
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Scalar(Value),
    List(Vec<Value>),
}

impl Operand {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Scalar(v) => v.clone(),
            Self::List(values) => Value::Array(values.clone()),
        }
    }
}

/// Query predicate over physical field paths
///
/// An empty `And` matches every row.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare {
        path: String,
        op: ComparisonOperator,
        operand: Operand,
    },
}

impl Predicate {
    /// Predicate matching every row
    pub fn all() -> Self {
        Self::And(Vec::new())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::And(parts) if parts.is_empty())
    }

    pub fn compare(path: impl Into<String>, op: ComparisonOperator, value: impl Into<Value>) -> Self {
        Self::Compare {
            path: path.into(),
            op,
            operand: Operand::Scalar(value.into()),
        }
    }

    /// Conjunction, dropping match-all parts and flattening nested `And`s
    pub fn and(parts: impl IntoIterator<Item = Predicate>) -> Self {
        let mut flat = Vec::new();
        for part in parts {
            match part {
                Self::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.pop().unwrap_or_else(Self::all)
        } else {
            Self::And(flat)
        }
    }

    /// Disjunction; a single branch collapses to itself
    pub fn or(parts: impl IntoIterator<Item = Predicate>) -> Self {
        let mut branches: Vec<Predicate> = parts.into_iter().collect();
        if branches.len() == 1 {
            branches.pop().unwrap_or_else(Self::all)
        } else {
            Self::Or(branches)
        }
    }

    pub fn not(inner: Predicate) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Mongo-style JSON rendering, as a query builder would receive it
    pub fn to_json(&self) -> Value {
        match self {
            Self::And(parts) if parts.is_empty() => Value::Object(Map::new()),
            Self::And(parts) => logical("$and", parts),
            Self::Or(parts) => logical("$or", parts),
            Self::Not(inner) => single("$not", inner.to_json()),
            Self::Compare { path, op, operand } => {
                single(path, single(op.as_str(), operand.to_json()))
            }
        }
    }
}

fn logical(key: &str, parts: &[Predicate]) -> Value {
    single(key, Value::Array(parts.iter().map(Predicate::to_json).collect()))
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}
