//! In-memory repository
//!
//! Evaluates [`Predicate`]s directly against [`Entity`] values. Entities must
//! expose their primary key as a field under the path the connection orders
//! on (usually `id`).
//!
//! A predicate is compiled once per query, patterns included, and then
//! matched against every row. Strings compare lexicographically unless the
//! path belongs to a `DateTime` field registered with
//! [`MemoryRepository::with_fields`], in which case RFC 3339 values compare
//! by instant.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::entity::{get, Entity};
use crate::fields::{FieldOptionsMap, FieldType};
use crate::order::OrderDirection;
use crate::predicate::{ComparisonOperator, Operand, Predicate};
use crate::repository::{FindOptions, OrderTerm, Repository};

/// Memory repository errors
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Invalid pattern for {op}: {source}")]
    InvalidPattern {
        op: ComparisonOperator,
        #[source]
        source: regex::Error,
    },

    #[error("Unsupported operand for {0}")]
    UnsupportedOperand(ComparisonOperator),
}

/// Repository over a vector of entities
pub struct MemoryRepository<E> {
    rows: RwLock<Vec<E>>,
    queries: AtomicUsize,
    timestamps: HashSet<String>,
}

impl<E> MemoryRepository<E>
where
    E: Entity + Clone,
{
    pub fn new(rows: Vec<E>) -> Self {
        Self {
            rows: RwLock::new(rows),
            queries: AtomicUsize::new(0),
            timestamps: HashSet::new(),
        }
    }

    /// Compare the physical paths of `DateTime` fields chronologically
    pub fn with_fields(mut self, fields: &FieldOptionsMap) -> Self {
        self.timestamps = fields
            .iter()
            .filter(|options| options.field_type == FieldType::DateTime)
            .map(|options| options.physical_path(fields.alias()))
            .collect();
        self
    }

    pub async fn insert(&self, row: E) {
        self.rows.write().await.push(row);
    }

    /// Number of `find`/`count` calls served so far
    pub fn query_count(&self) -> usize {
        self.queries.load(AtomicOrdering::SeqCst)
    }

    async fn matching(&self, filter: &Predicate) -> Result<Vec<E>, MemoryError> {
        self.queries.fetch_add(1, AtomicOrdering::SeqCst);
        let matcher = Matcher::compile(filter, &self.timestamps)?;
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|row| matcher.matches(*row)).cloned().collect())
    }

    fn compare_rows(&self, a: &dyn Entity, b: &dyn Entity, terms: &[OrderTerm]) -> Ordering {
        for term in terms {
            let left = get(a, &term.path).unwrap_or(Value::Null);
            let right = get(b, &term.path).unwrap_or(Value::Null);
            let ordering = compare(&left, &right, self.timestamps.contains(&term.path))
                .unwrap_or_else(|| kind_rank(&left).cmp(&kind_rank(&right)));
            let ordering = match term.direction {
                OrderDirection::Asc => ordering,
                OrderDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

#[async_trait]
impl<E> Repository<E> for MemoryRepository<E>
where
    E: Entity + Clone + 'static,
{
    type Error = MemoryError;

    async fn find(&self, filter: &Predicate, options: &FindOptions) -> Result<Vec<E>, MemoryError> {
        let mut rows = self.matching(filter).await?;
        rows.sort_by(|a, b| self.compare_rows(a, b, &options.order_by));
        Ok(rows
            .into_iter()
            .skip(options.offset.unwrap_or(0))
            .take(options.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn count(&self, filter: &Predicate) -> Result<u64, MemoryError> {
        Ok(self.matching(filter).await?.len() as u64)
    }
}

/// Predicate with its patterns compiled
enum Matcher {
    All(Vec<Matcher>),
    Any(Vec<Matcher>),
    Not(Box<Matcher>),
    Field {
        path: String,
        temporal: bool,
        test: Test,
    },
}

enum Test {
    Eq(Value),
    Ne(Value),
    Range(Value, &'static [Ordering]),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Contains(Vec<Value>),
    Overlap(Vec<Value>),
    Pattern(Regex),
    Terms(Vec<String>),
}

impl Matcher {
    fn compile(predicate: &Predicate, timestamps: &HashSet<String>) -> Result<Self, MemoryError> {
        Ok(match predicate {
            Predicate::And(parts) => Self::All(compile_all(parts, timestamps)?),
            Predicate::Or(parts) => Self::Any(compile_all(parts, timestamps)?),
            Predicate::Not(inner) => Self::Not(Box::new(Self::compile(inner, timestamps)?)),
            Predicate::Compare { path, op, operand } => Self::Field {
                path: path.clone(),
                temporal: timestamps.contains(path),
                test: Test::compile(*op, operand)?,
            },
        })
    }

    fn matches(&self, entity: &dyn Entity) -> bool {
        match self {
            Self::All(parts) => parts.iter().all(|part| part.matches(entity)),
            Self::Any(parts) => parts.iter().any(|part| part.matches(entity)),
            Self::Not(inner) => !inner.matches(entity),
            Self::Field { path, temporal, test } => {
                let actual = get(entity, path).unwrap_or(Value::Null);
                test.matches(&actual, *temporal)
            }
        }
    }
}

fn compile_all(parts: &[Predicate], timestamps: &HashSet<String>) -> Result<Vec<Matcher>, MemoryError> {
    parts
        .iter()
        .map(|part| Matcher::compile(part, timestamps))
        .collect()
}

impl Test {
    fn compile(op: ComparisonOperator, operand: &Operand) -> Result<Self, MemoryError> {
        use ComparisonOperator::*;

        let invalid = |source| MemoryError::InvalidPattern { op, source };
        let test = match (op, operand) {
            (Eq, Operand::Scalar(v)) => Self::Eq(v.clone()),
            (Ne, Operand::Scalar(v)) => Self::Ne(v.clone()),
            (Gt, Operand::Scalar(v)) => Self::Range(v.clone(), &[Ordering::Greater]),
            (Gte, Operand::Scalar(v)) => Self::Range(v.clone(), &[Ordering::Greater, Ordering::Equal]),
            (Lt, Operand::Scalar(v)) => Self::Range(v.clone(), &[Ordering::Less]),
            (Lte, Operand::Scalar(v)) => Self::Range(v.clone(), &[Ordering::Less, Ordering::Equal]),
            (In, Operand::List(values)) => Self::In(values.clone()),
            (Nin, Operand::List(values)) => Self::Nin(values.clone()),
            (Contains, Operand::List(values)) => Self::Contains(values.clone()),
            (Overlap, Operand::List(values)) => Self::Overlap(values.clone()),
            (Like | Ilike, Operand::Scalar(Value::String(pattern))) => {
                Self::Pattern(like_pattern(pattern, op == Ilike).map_err(invalid)?)
            }
            (Re, Operand::Scalar(Value::String(pattern))) => Self::Pattern(Regex::new(pattern).map_err(invalid)?),
            (Fulltext, Operand::Scalar(Value::String(query))) => {
                Self::Terms(query.split_whitespace().map(str::to_lowercase).collect())
            }
            (op, _) => return Err(MemoryError::UnsupportedOperand(op)),
        };
        Ok(test)
    }

    fn matches(&self, actual: &Value, temporal: bool) -> bool {
        let equals = |a: &Value, b: &Value| compare(a, b, temporal) == Some(Ordering::Equal);
        let items = || actual.as_array().map(Vec::as_slice).unwrap_or_default();

        match self {
            Self::Eq(v) => equals(actual, v),
            Self::Ne(v) => !equals(actual, v),
            Self::Range(v, accepted) => {
                compare(actual, v, temporal).is_some_and(|ordering| accepted.contains(&ordering))
            }
            Self::In(values) => values.iter().any(|v| equals(actual, v)),
            Self::Nin(values) => !values.iter().any(|v| equals(actual, v)),
            Self::Contains(values) => {
                actual.is_array() && values.iter().all(|v| items().iter().any(|i| equals(i, v)))
            }
            Self::Overlap(values) => values.iter().any(|v| items().iter().any(|i| equals(i, v))),
            Self::Pattern(re) => actual.as_str().is_some_and(|text| re.is_match(text)),
            Self::Terms(terms) => actual.as_str().is_some_and(|text| {
                let text = text.to_lowercase();
                terms.iter().all(|term| text.contains(term.as_str()))
            }),
        }
    }
}

fn like_pattern(pattern: &str, case_insensitive: bool) -> Result<Regex, regex::Error> {
    let mut re = String::from("^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    re.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4])));
                }
            }
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    RegexBuilder::new(&re)
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
}

fn parse_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}

/// Timestamps compare by instant and sort before strings that do not parse
fn compare_timestamps(x: &str, y: &str) -> Ordering {
    match (parse_datetime(x), parse_datetime(y)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => x.cmp(y),
    }
}

fn compare(a: &Value, b: &Value, temporal: bool) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) if temporal => Some(compare_timestamps(x, y)),
        _ => compare_values(a, b),
    }
}

/// Compare two scalars; `None` when they are of different kinds
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::PrimaryKey;
    use crate::entity::Resolvable;
    use crate::fields::FieldOptions;
    use serde_json::json;

    #[derive(Clone)]
    struct Row {
        id: i64,
        name: &'static str,
        score: Option<i64>,
        tags: Vec<&'static str>,
        at: &'static str,
    }

    impl Entity for Row {
        fn primary_key(&self) -> PrimaryKey {
            self.id.into()
        }

        fn field(&self, name: &str) -> Option<Resolvable> {
            let value = match name {
                "id" => json!(self.id),
                "name" => json!(self.name),
                "score" => json!(self.score),
                "tags" => json!(self.tags),
                "at" => json!(self.at),
                _ => return None,
            };
            Some(value.into())
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { id: 1, name: "Alpha", score: Some(3), tags: vec!["a", "b"], at: "2024-01-01T10:00:00+02:00" },
            Row { id: 2, name: "beta_ray", score: None, tags: vec!["b"], at: "2024-01-01T09:00:00Z" },
            Row { id: 3, name: "Gamma ray", score: Some(1), tags: vec![], at: "2024-01-01T08:30:00Z" },
        ]
    }

    async fn ids(repo: &MemoryRepository<Row>, filter: Predicate, options: FindOptions) -> Vec<i64> {
        repo.find(&filter, &options).await.unwrap().iter().map(|r| r.id).collect()
    }

    fn cmp(path: &str, op: ComparisonOperator, value: Value) -> Predicate {
        Predicate::compare(path, op, value)
    }

    fn list(path: &str, op: ComparisonOperator, values: Vec<Value>) -> Predicate {
        Predicate::Compare {
            path: path.to_string(),
            op,
            operand: Operand::List(values),
        }
    }

    #[tokio::test]
    async fn test_comparisons() {
        use ComparisonOperator::*;
        let repo = MemoryRepository::new(rows());
        let all = FindOptions::default();

        assert_eq!(ids(&repo, cmp("score", Gte, json!(1)), all.clone()).await, vec![1, 3]);
        assert_eq!(ids(&repo, cmp("score", Eq, Value::Null), all.clone()).await, vec![2]);
        assert_eq!(ids(&repo, cmp("score", Ne, json!(3)), all.clone()).await, vec![2, 3]);
        assert_eq!(ids(&repo, list("id", In, vec![json!(1), json!(3)]), all.clone()).await, vec![1, 3]);
        assert_eq!(ids(&repo, list("id", Nin, vec![json!(1)]), all.clone()).await, vec![2, 3]);
        assert_eq!(ids(&repo, cmp("name", Like, json!("%ray")), all.clone()).await, vec![2, 3]);
        assert_eq!(ids(&repo, cmp("name", Like, json!("beta\\_%")), all.clone()).await, vec![2]);
        assert_eq!(ids(&repo, cmp("name", Ilike, json!("alpha")), all.clone()).await, vec![1]);
        assert_eq!(ids(&repo, cmp("name", Re, json!("^[A-Z]")), all.clone()).await, vec![1, 3]);
        assert_eq!(ids(&repo, cmp("name", Fulltext, json!("RAY gamma")), all.clone()).await, vec![3]);
        assert_eq!(ids(&repo, list("tags", Contains, vec![json!("a"), json!("b")]), all.clone()).await, vec![1]);
        assert_eq!(ids(&repo, list("tags", Overlap, vec![json!("b"), json!("z")]), all.clone()).await, vec![1, 2]);
    }

    fn by_at() -> FindOptions {
        FindOptions {
            order_by: vec![OrderTerm::new("at", OrderDirection::Asc)],
            ..FindOptions::default()
        }
    }

    fn timestamp_fields() -> FieldOptionsMap {
        FieldOptionsMap::builder()
            .add_field(FieldOptions::new("name", FieldType::String))
            .add_field(FieldOptions::new("at", FieldType::DateTime))
            .build()
    }

    #[tokio::test]
    async fn test_timestamps_compare_chronologically() {
        let repo = MemoryRepository::new(rows()).with_fields(&timestamp_fields());
        // 10:00+02:00 is 08:00Z
        assert_eq!(ids(&repo, Predicate::all(), by_at()).await, vec![1, 3, 2]);

        let after = cmp("at", ComparisonOperator::Gt, json!("2024-01-01T08:15:00Z"));
        assert_eq!(ids(&repo, after, FindOptions::default()).await, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_strings_compare_lexically() {
        let repo = MemoryRepository::new(rows());
        assert_eq!(ids(&repo, Predicate::all(), by_at()).await, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_mixed_strings_keep_a_total_order() {
        let mixed = |fields: Option<FieldOptionsMap>| {
            let rows: Vec<Row> = ["2024-01-01T10:00:00+02:00", "2024-01-01T09:00:00Z", "2024-01-01T09:30"]
                .into_iter()
                .zip(rows())
                .map(|(at, row)| Row { at, ..row })
                .collect();
            let repo = MemoryRepository::new(rows);
            match fields {
                Some(fields) => repo.with_fields(&fields),
                None => repo,
            }
        };

        assert_eq!(ids(&mixed(None), Predicate::all(), by_at()).await, vec![2, 3, 1]);
        let above = cmp("at", ComparisonOperator::Gt, json!("2024-01-01T09:00:00Z"));
        assert_eq!(ids(&mixed(None), above.clone(), by_at()).await, vec![3, 1]);

        // unparseable values sort after every timestamp
        let repo = mixed(Some(timestamp_fields()));
        assert_eq!(ids(&repo, Predicate::all(), by_at()).await, vec![1, 2, 3]);
        assert_eq!(ids(&repo, above, by_at()).await, vec![3]);
    }

    #[tokio::test]
    async fn test_order_limit_offset() {
        let repo = MemoryRepository::new(rows());
        let options = FindOptions {
            order_by: vec![
                OrderTerm::new("score", OrderDirection::Desc),
                OrderTerm::new("id", OrderDirection::Asc),
            ],
            limit: Some(2),
            offset: Some(1),
        };
        assert_eq!(ids(&repo, Predicate::all(), options).await, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_logical_and_count() {
        use ComparisonOperator::*;
        let repo = MemoryRepository::new(rows());
        let filter = Predicate::or([
            cmp("id", Eq, json!(1)),
            Predicate::not(cmp("name", Ilike, json!("%ray%"))),
            Predicate::and([cmp("id", Gt, json!(2)), cmp("score", Lt, json!(2))]),
        ]);
        assert_eq!(repo.count(&filter).await.unwrap(), 2);
        assert_eq!(repo.query_count(), 1);
    }

    #[tokio::test]
    async fn test_insert() {
        let repo = MemoryRepository::new(Vec::new());
        assert_eq!(repo.count(&Predicate::all()).await.unwrap(), 0);

        for row in rows().into_iter().rev() {
            repo.insert(row).await;
        }
        assert_eq!(repo.count(&Predicate::all()).await.unwrap(), 3);
        assert_eq!(ids(&repo, Predicate::all(), FindOptions::default()).await, vec![3, 2, 1]);
        assert_eq!(ids(&repo, cmp("score", ComparisonOperator::Eq, Value::Null), FindOptions::default()).await, vec![2]);
        assert_eq!(repo.query_count(), 4);
    }

    #[tokio::test]
    async fn test_patterns_compile_once_per_query() {
        let repo = MemoryRepository::<Row>::new(Vec::new());
        let err = repo
            .count(&cmp("name", ComparisonOperator::Re, json!("(unclosed")))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidPattern { op: ComparisonOperator::Re, .. }));

        let many: Vec<Row> = (0..200)
            .map(|i| Row { id: i, ..rows()[i as usize % 3].clone() })
            .collect();
        let repo = MemoryRepository::new(many);
        let filter = Predicate::or([
            cmp("name", ComparisonOperator::Re, json!("^beta")),
            cmp("name", ComparisonOperator::Ilike, json!("gamma%")),
        ]);
        assert_eq!(repo.count(&filter).await.unwrap(), 133);
    }

    #[tokio::test]
    async fn test_unsupported_operand() {
        let repo = MemoryRepository::new(rows());
        let filter = cmp("tags", ComparisonOperator::Contains, json!("a"));
        let err = repo.count(&filter).await.unwrap_err();
        assert!(matches!(err, MemoryError::UnsupportedOperand(ComparisonOperator::Contains)));
    }
}
