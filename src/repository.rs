//! Repository collaborator

use async_trait::async_trait;

use crate::order::OrderDirection;
use crate::predicate::Predicate;

/// One ordering term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub path: String,
    pub direction: OrderDirection,
}

impl OrderTerm {
    pub fn new(path: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            path: path.into(),
            direction,
        }
    }
}

/// Options for [`Repository::find`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub order_by: Vec<OrderTerm>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Storage the connection engine reads from
///
/// Implementations translate [`Predicate`]s into their own query language.
/// Errors are handed back to callers unchanged.
///
/// Null (or missing) values sort before every other value in ascending
/// order and after them in descending order, and `$eq`/`$ne` against null
/// test for null. Cursor predicates rely on this ordering.
#[async_trait]
pub trait Repository<E: Send>: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Rows matching `filter`, ordered and limited per `options`
    async fn find(&self, filter: &Predicate, options: &FindOptions) -> Result<Vec<E>, Self::Error>;

    /// Number of rows matching `filter`
    async fn count(&self, filter: &Predicate) -> Result<u64, Self::Error>;
}
