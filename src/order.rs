//! Ordering and sortable fields

use async_graphql::Enum;
use heck::ToShoutySnakeCase;
use serde::{Deserialize, Serialize};

use crate::fields::FieldOptionsMap;
use crate::paging::PagingType;

/// Sort direction
#[derive(Enum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn is_ascending(self) -> bool {
        matches!(self, Self::Asc)
    }

    pub fn reverse(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Whether a page scans its order field upwards
///
/// Backward pages scan against the nominal direction and are reversed
/// afterwards. Both the query ordering and the cursor comparison use this.
pub fn effective_ascending(direction: OrderDirection, paging: PagingType) -> bool {
    direction.is_ascending() == paging.is_forward()
}

pub fn effective_direction(direction: OrderDirection, paging: PagingType) -> OrderDirection {
    if effective_ascending(direction, paging) {
        OrderDirection::Asc
    } else {
        OrderDirection::Desc
    }
}

/// Enum key for a field path: `createdAt` -> `CREATED_AT`, `author.name` -> `AUTHOR_NAME`
pub fn enum_key(field: &str) -> String {
    field.to_shouty_snake_case()
}

/// One entry of the sortable-field enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortableField {
    /// Enum key exposed to clients
    pub key: String,
    /// Declared field name
    pub field: String,
    /// Physical path ordered on
    pub path: String,
}

/// Sortable-field enumeration, `ID` first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortableFields {
    fields: Vec<SortableField>,
}

impl SortableFields {
    pub fn from_options(options: &FieldOptionsMap) -> Self {
        let primary_key = options.primary_key().to_string();
        let mut fields = vec![SortableField {
            key: "ID".to_string(),
            field: primary_key.clone(),
            path: primary_key,
        }];

        for option in options.iter().filter(|o| o.sortable) {
            let key = enum_key(&option.field);
            if fields.iter().any(|f| f.key == key) {
                continue;
            }
            fields.push(SortableField {
                key,
                field: option.field.clone(),
                path: option.physical_path(options.alias()),
            });
        }

        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&SortableField> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SortableField> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }
}

/// Order resolved against the sortable fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOrder {
    pub key: String,
    pub path: String,
    pub direction: OrderDirection,
}
