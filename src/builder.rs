//! Connection definitions
//!
//! A [`ConnectionDefinition`] is built once per node type and shared by
//! every resolver paging over it. It holds the declared fields, the
//! sortable-field enumeration and the connection configuration, and
//! produces the dynamic GraphQL types describing its ordering.

use std::sync::Arc;

use async_graphql::dynamic::{Enum, EnumItem, InputObject, InputValue, TypeRef};
use async_graphql::{Name, Value as GqlValue};
use serde_json::Value;

use crate::config::ConnectionConfig;
use crate::connection::find_connection;
use crate::entity::Entity;
use crate::fields::{FieldOptions, FieldOptionsMap};
use crate::filter::compile_filter;
use crate::order::{OrderDirection, ResolvedOrder, SortableFields};
use crate::pagination::{Connection, ConnectionArgs, OrderByInput};
use crate::predicate::{ComparisonOperator, Predicate};
use crate::repository::Repository;
use crate::{ConnectionError, Result};

/// Builder for [`ConnectionDefinition`]
#[derive(Debug)]
pub struct ConnectionBuilder {
    name: String,
    fields: Vec<FieldOptions>,
    primary_key: String,
    config: ConnectionConfig,
    default_order: Option<OrderByInput>,
}

impl ConnectionBuilder {
    /// Start a definition for the node type `name`, e.g. `Post`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            primary_key: "id".to_string(),
            config: ConnectionConfig::default(),
            default_order: None,
        }
    }

    pub fn add_field(mut self, options: FieldOptions) -> Self {
        self.fields.push(options);
        self
    }

    pub fn primary_key(mut self, path: impl Into<String>) -> Self {
        self.primary_key = path.into();
        self
    }

    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Order applied when a request has no `orderBy`
    ///
    /// Defaults to `CREATED_AT` ascending when `createdAt` is sortable.
    pub fn default_order(mut self, order: OrderByInput) -> Self {
        self.default_order = Some(order);
        self
    }

    pub fn build(self) -> ConnectionDefinition {
        let fields = self
            .fields
            .into_iter()
            .fold(FieldOptionsMap::builder(), |builder, options| builder.add_field(options))
            .primary_key(self.primary_key)
            .alias(self.config.alias.clone())
            .build();
        let sortable = SortableFields::from_options(&fields);
        let default_order = self.default_order.or_else(|| {
            sortable
                .get("CREATED_AT")
                .map(|field| OrderByInput::new(field.key.clone(), OrderDirection::Asc))
        });

        ConnectionDefinition {
            name: self.name,
            fields: Arc::new(fields),
            sortable,
            default_order,
            config: self.config,
        }
    }
}

/// Paging definition for one node type
#[derive(Debug, Clone)]
pub struct ConnectionDefinition {
    name: String,
    fields: Arc<FieldOptionsMap>,
    sortable: SortableFields,
    default_order: Option<OrderByInput>,
    config: ConnectionConfig,
}

impl ConnectionDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &FieldOptionsMap {
        &self.fields
    }

    pub fn sortable(&self) -> &SortableFields {
        &self.sortable
    }

    pub fn default_order(&self) -> Option<&OrderByInput> {
        self.default_order.as_ref()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Resolve a requested order, falling back to the default order
    ///
    /// `None` means rows are ordered by primary key only.
    pub fn resolve_order(&self, requested: Option<&OrderByInput>) -> Result<Option<ResolvedOrder>> {
        let Some(order) = requested.or(self.default_order.as_ref()) else {
            return Ok(None);
        };
        let field = self
            .sortable
            .get(&order.field)
            .ok_or_else(|| ConnectionError::InvalidOrderField(order.field.clone()))?;

        Ok(Some(ResolvedOrder {
            key: field.key.clone(),
            path: field.path.clone(),
            direction: order.direction,
        }))
    }

    /// Compile a raw client filter against the declared fields
    pub fn compile_filter(&self, raw: &Value) -> Result<Predicate> {
        compile_filter(raw, &self.fields, &self.config.filter)
    }

    /// Case-insensitive substring match over searchable fields
    ///
    /// Blank queries impose nothing. A query on a connection without
    /// searchable fields matches no rows.
    pub fn search_predicate(&self, query: Option<&str>) -> Option<Predicate> {
        let query = query.map(str::trim).filter(|q| !q.is_empty())?;
        let pattern = format!("%{}%", escape_like(query));

        Some(Predicate::or(
            self.fields
                .iter()
                .filter(|options| options.searchable)
                .map(|options| {
                    Predicate::compare(
                        options.physical_path(self.fields.alias()),
                        ComparisonOperator::Ilike,
                        pattern.clone(),
                    )
                }),
        ))
    }

    /// Row set a request pages over: `base`, the client filter and the search
    pub fn build_where(&self, base: Predicate, args: &ConnectionArgs) -> Result<Predicate> {
        let filter = args
            .filter
            .as_ref()
            .map(|filter| self.compile_filter(&filter.0))
            .transpose()?;
        let search = self.search_predicate(args.query.as_deref());

        Ok(Predicate::and([base].into_iter().chain(filter).chain(search)))
    }

    /// Resolve one page; see [`find_connection`]
    pub async fn find<E, R>(&self, repository: &R, args: &ConnectionArgs, base: Predicate) -> Result<Connection<E>>
    where
        E: Entity,
        R: Repository<E> + ?Sized,
    {
        find_connection(repository, self, args, base).await
    }

    /// GraphQL name of the sortable-field enum, e.g. `PostOrderField`
    pub fn order_field_type_name(&self) -> String {
        format!("{}OrderField", self.name)
    }

    /// GraphQL name of the order input, e.g. `PostOrder`
    pub fn order_type_name(&self) -> String {
        format!("{}Order", self.name)
    }

    /// Sortable-field enum for dynamic schemas
    pub fn order_field_enum(&self) -> Enum {
        self.sortable
            .iter()
            .fold(Enum::new(self.order_field_type_name()), |e, field| {
                e.item(EnumItem::new(&field.key).description(format!("Order by `{}`", field.field)))
            })
    }

    /// Order input for dynamic schemas: `{ field: <Name>OrderField!, direction: OrderDirection! = ASC }`
    pub fn order_input(&self) -> InputObject {
        InputObject::new(self.order_type_name())
            .field(InputValue::new(
                "field",
                TypeRef::named_nn(self.order_field_type_name()),
            ))
            .field(
                InputValue::new("direction", TypeRef::named_nn("OrderDirection"))
                    .default_value(GqlValue::Enum(Name::new("ASC"))),
            )
    }
}

/// `OrderDirection` enum for dynamic schemas
pub fn order_direction_enum() -> Enum {
    Enum::new("OrderDirection").item("ASC").item("DESC")
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
