//! Connection query engine
//!
//! Turns [`ConnectionArgs`] into a keyset page query plus a count query,
//! runs both concurrently and assembles the [`Connection`].
//!
//! Rows are ordered by `(order field, primary key)`, which is a total order,
//! so a cursor carrying both values pins an exact position. Backward pages
//! scan in reverse, fetch one row past the page to detect more data, and are
//! flipped back to the nominal order before returning.

use std::iter;

use serde_json::Value;
use tracing::{debug, trace};

use crate::builder::ConnectionDefinition;
use crate::cursor::{CursorCodec, CursorPayload};
use crate::entity::{get, Entity};
use crate::order::{effective_ascending, effective_direction, ResolvedOrder};
use crate::pagination::{Connection, ConnectionArgs, Edge};
use crate::paging::PagingType;
use crate::predicate::{ComparisonOperator, Predicate};
use crate::repository::{FindOptions, OrderTerm, Repository};
use crate::{ConnectionError, Result};

/// Resolve one page of `definition` from `repository`
///
/// `base` is the caller's own constraint (tenant, ownership, ...); it is
/// AND-ed with the client filter and search and applies to `total_count`
/// as well. Argument and filter errors are returned before any query runs.
pub async fn find_connection<E, R>(
    repository: &R,
    definition: &ConnectionDefinition,
    args: &ConnectionArgs,
    base: Predicate,
) -> Result<Connection<E>>
where
    E: Entity,
    R: Repository<E> + ?Sized,
{
    let paging_args = args.paging();
    let paging = paging_args.validate(definition.config().max_page_size)?;
    let limit = paging_args.limit();
    let order = definition.resolve_order(args.order_by.as_ref())?;
    let where_ = definition.build_where(base, args)?;

    let primary_key = definition.fields().primary_key();
    let cursor = paging_args
        .cursor(paging)
        .map(CursorCodec::decode)
        .unwrap_or_default();
    let bound = paging_args
        .bound(paging)
        .map(CursorCodec::decode)
        .unwrap_or_default();

    let direction = order.as_ref().map(|o| o.direction).unwrap_or_default();
    let ascending = effective_ascending(direction, paging);
    let cursor_where = keyset_predicate(&cursor, order.as_ref(), primary_key, ascending);
    let bound_where = keyset_predicate(&bound, order.as_ref(), primary_key, !ascending);
    let page_where = Predicate::and(
        iter::once(where_.clone())
            .chain(cursor_where)
            .chain(bound_where),
    );

    let scan = effective_direction(direction, paging);
    let mut order_by = Vec::with_capacity(2);
    if let Some(order) = order.as_ref().filter(|o| o.path != primary_key) {
        order_by.push(OrderTerm::new(&order.path, scan));
    }
    order_by.push(OrderTerm::new(primary_key, scan));
    let options = FindOptions {
        order_by,
        limit: Some(limit + 1),
        offset: None,
    };

    debug!(
        connection = definition.name(),
        paging = ?paging,
        limit,
        order = order.as_ref().map(|o| o.key.as_str()),
        "resolving connection page"
    );
    trace!(page_where = %page_where.to_json(), count_where = %where_.to_json(), "connection predicates");

    let (mut rows, total_count) = tokio::try_join!(
        repository.find(&page_where, &options),
        repository.count(&where_),
    )
    .map_err(ConnectionError::repository)?;

    let fetched = rows.len();
    if !paging.is_forward() {
        rows.reverse();
    }
    let has_more = fetched > limit;
    if has_more {
        match paging {
            PagingType::Forward => rows.truncate(limit),
            PagingType::Backward => {
                rows.drain(..fetched - limit);
            }
        }
    }

    let edges: Vec<Edge<E>> = rows
        .into_iter()
        .map(|node| {
            let value = order
                .as_ref()
                .map(|o| get(&node, &o.path).unwrap_or(Value::Null));
            let cursor = CursorCodec::encode(&CursorPayload::new(node.primary_key(), value));
            Edge { cursor, node }
        })
        .collect();

    let (has_next_page, has_previous_page) = match paging {
        PagingType::Forward => (has_more || args.before.is_some(), args.after.is_some()),
        PagingType::Backward => (args.before.is_some(), has_more || args.after.is_some()),
    };

    debug!(
        connection = definition.name(),
        fetched,
        edges = edges.len(),
        total_count,
        "resolved connection page"
    );

    Ok(Connection::new(edges, has_next_page, has_previous_page, total_count))
}

/// Rows strictly past `cursor` in `(order field, primary key)` order
///
/// `ascending` selects rows above the cursor, otherwise rows below it:
/// `field > v OR (field = v AND id > cursor.id)`. Nulls sort below every
/// value, so a null cursor value is followed by the remaining nulls and then
/// every non-null row, and rows below a non-null value include the nulls.
/// Without an order value only the primary key is compared; an empty cursor
/// constrains nothing.
fn keyset_predicate(
    cursor: &CursorPayload,
    order: Option<&ResolvedOrder>,
    primary_key: &str,
    ascending: bool,
) -> Option<Predicate> {
    let op = if ascending {
        ComparisonOperator::Gt
    } else {
        ComparisonOperator::Lt
    };
    let id_where = cursor
        .id
        .as_ref()
        .map(|id| Predicate::compare(primary_key, op, id.to_value()));

    let (order, value) = match (order, &cursor.value) {
        (Some(order), Some(value)) if order.path != primary_key => (order, value),
        _ => return id_where,
    };
    let path = order.path.as_str();
    let tie = |id_where: Predicate| {
        Predicate::and([
            Predicate::compare(path, ComparisonOperator::Eq, value.clone()),
            id_where,
        ])
    };

    let mut branches = Vec::with_capacity(3);
    if value.is_null() {
        branches.extend(id_where.map(tie));
        if ascending {
            branches.push(Predicate::compare(path, ComparisonOperator::Ne, Value::Null));
        }
    } else {
        branches.push(Predicate::compare(path, op, value.clone()));
        branches.extend(id_where.map(tie));
        if !ascending {
            branches.push(Predicate::compare(path, ComparisonOperator::Eq, Value::Null));
        }
    }

    Some(Predicate::or(branches))
}
