//! Relay-style connection types

use async_graphql::{InputObject, Json, Object, SimpleObject};
use serde_json::Value;

use crate::order::OrderDirection;
use crate::paging::PagingArgs;

/// Page information
#[derive(SimpleObject, Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// Edge in a connection
#[derive(Debug, Clone)]
pub struct Edge<T> {
    pub cursor: String,
    pub node: T,
}

#[Object]
impl<T: async_graphql::OutputType> Edge<T> {
    async fn cursor(&self) -> &str {
        &self.cursor
    }

    async fn node(&self) -> &T {
        &self.node
    }
}

/// Connection (paginated result)
#[derive(Debug, Clone)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
    /// Size of the whole filtered set, regardless of the page window
    pub total_count: u64,
}

#[Object]
impl<T: async_graphql::OutputType> Connection<T> {
    async fn edges(&self) -> &[Edge<T>] {
        &self.edges
    }

    async fn page_info(&self) -> &PageInfo {
        &self.page_info
    }

    async fn total_count(&self) -> u64 {
        self.total_count
    }
}

impl<T> Connection<T> {
    /// Create connection; start/end cursors come from the edges
    pub fn new(
        edges: Vec<Edge<T>>,
        has_next_page: bool,
        has_previous_page: bool,
        total_count: u64,
    ) -> Self {
        let start_cursor = edges.first().map(|e| e.cursor.clone());
        let end_cursor = edges.last().map(|e| e.cursor.clone());

        Self {
            edges,
            page_info: PageInfo {
                has_next_page,
                has_previous_page,
                start_cursor,
                end_cursor,
            },
            total_count,
        }
    }

    /// Create empty connection
    pub fn empty() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo::default(),
            total_count: 0,
        }
    }

    /// Convert nodes, e.g. from entities to GraphQL objects
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Connection<U> {
        Connection {
            edges: self
                .edges
                .into_iter()
                .map(|edge| Edge {
                    cursor: edge.cursor,
                    node: f(edge.node),
                })
                .collect(),
            page_info: self.page_info,
            total_count: self.total_count,
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|e| &e.node)
    }
}

/// Requested ordering
#[derive(InputObject, Debug, Clone, PartialEq, Eq)]
pub struct OrderByInput {
    /// Sortable-field key, e.g. `CREATED_AT`
    pub field: String,

    #[graphql(default)]
    pub direction: OrderDirection,
}

impl OrderByInput {
    pub fn new(field: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Connection arguments for GraphQL queries
///
/// Follows the Relay Cursor Connections Specification:
/// https://relay.dev/graphql/connections.htm
#[derive(InputObject, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Free-text search over searchable fields
    pub query: Option<String>,

    /// Mongo-style filter over filterable fields
    pub filter: Option<Json<Value>>,

    /// Number of items to return (forward pagination)
    pub first: Option<i32>,

    /// Cursor to start from (forward pagination)
    pub after: Option<String>,

    /// Number of items to return (backward pagination)
    pub last: Option<i32>,

    /// Cursor to start from (backward pagination)
    pub before: Option<String>,

    pub order_by: Option<OrderByInput>,
}

impl ConnectionArgs {
    pub fn forward(first: i32, after: Option<String>) -> Self {
        Self {
            first: Some(first),
            after,
            ..Self::default()
        }
    }

    pub fn backward(last: i32, before: Option<String>) -> Self {
        Self {
            last: Some(last),
            before,
            ..Self::default()
        }
    }

    pub fn with_order(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by = Some(OrderByInput::new(field, direction));
        self
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(Json(filter));
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn paging(&self) -> PagingArgs {
        PagingArgs {
            first: self.first,
            after: self.after.clone(),
            last: self.last,
            before: self.before.clone(),
        }
    }
}
