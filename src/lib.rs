//! # pleme-graphql-connection
//!
//! Relay-style GraphQL connections for Pleme platform services.
//!
//! ## Features
//!
//! - **Keyset Cursors** - opaque `(order value, primary key)` cursors
//! - **Paging Resolution** - `first`/`after` and `last`/`before` handling
//! - **Filter Validation** - Mongo-style filters checked against declared fields
//! - **Ordering** - sortable-field enumeration with primary-key tie-breaking
//! - **Connection Engine** - page + count queries against a [`Repository`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pleme_graphql_connection::{ConnectionArgs, ConnectionBuilder, FieldOptions, FieldType, Predicate};
//!
//! let posts = ConnectionBuilder::new("Post")
//!     .add_field(FieldOptions::new("createdAt", FieldType::DateTime).sortable())
//!     .add_field(FieldOptions::new("title", FieldType::String).filterable().searchable())
//!     .build();
//!
//! let connection = posts.find(&repository, &ConnectionArgs::forward(20, None), Predicate::all()).await?;
//! ```

pub mod builder;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod entity;
pub mod fields;
pub mod filter;
pub mod memory;
pub mod order;
pub mod pagination;
pub mod paging;
pub mod predicate;
pub mod repository;

pub use builder::{order_direction_enum, ConnectionBuilder, ConnectionDefinition};
pub use config::{ConnectionConfig, FilterConfig};
pub use connection::find_connection;
pub use cursor::{CursorCodec, CursorPayload, PrimaryKey};
pub use entity::{get, Entity, EntityRef, Reference, Resolvable};
pub use fields::{FieldOptions, FieldOptionsMap, FieldType, Replacement};
pub use filter::{apply_replacement, compile_filter, parse_filter, validate_filter_fields, FilterExpr};
pub use memory::MemoryRepository;
pub use order::{OrderDirection, ResolvedOrder, SortableField, SortableFields};
pub use pagination::{Connection, ConnectionArgs, Edge, OrderByInput, PageInfo};
pub use paging::{PagingArgs, PagingType};
pub use predicate::{ComparisonOperator, Operand, Predicate};
pub use repository::{FindOptions, OrderTerm, Repository};

use async_graphql::ErrorExtensions;
use thiserror::Error;

/// Boxed error returned by repository collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Connection errors
///
/// Everything except [`ConnectionError::Repository`] is a client error and is
/// raised before any query reaches the repository.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Invalid paging arguments: {0}")]
    InvalidPaging(String),

    #[error("Invalid filter: {0}")]
    FilterValidation(String),

    #[error("Unknown filter field: {0}")]
    UnknownField(String),

    #[error("Field is not filterable: {0}")]
    FieldNotFilterable(String),

    #[error("Unknown order field: {0}")]
    InvalidOrderField(String),

    #[error("Repository error: {0}")]
    Repository(#[source] BoxError),
}

impl ConnectionError {
    /// Wrap a repository failure, keeping the original error as the source.
    pub fn repository<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Repository(Box::new(err))
    }

    /// Whether the error was caused by the request rather than the backend.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Repository(_))
    }

    fn code(&self) -> &'static str {
        if self.is_client_error() {
            "BAD_USER_INPUT"
        } else {
            "INTERNAL_SERVER_ERROR"
        }
    }
}

impl ErrorExtensions for ConnectionError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| {
            e.set("code", self.code());
            if let Self::UnknownField(field) | Self::FieldNotFilterable(field) = self {
                e.set("field", field.as_str());
            }
        })
    }
}

/// Result type for connection operations
pub type Result<T> = std::result::Result<T, ConnectionError>;
