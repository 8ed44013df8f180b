//! Field-options map
//!
//! Declares which logical fields a connection exposes, what clients may do
//! with them, and where they live physically. Built once when the connection
//! is defined and read-only afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Declared type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Id,
    String,
    Int,
    Float,
    Boolean,
    DateTime,
    Json,
}

/// Physical target of a logical field
#[derive(Clone)]
pub enum Replacement {
    /// Fixed physical path
    Path(String),
    /// Path derived from the query alias, e.g. `|alias| format!("lower({alias}.name)")`
    Callback(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Options for one declared field
#[derive(Debug, Clone)]
pub struct FieldOptions {
    pub field: String,
    pub field_type: FieldType,
    pub filterable: bool,
    pub searchable: bool,
    pub sortable: bool,
    pub replacement: Option<Replacement>,
}

impl FieldOptions {
    pub fn new(field: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            field: field.into(),
            field_type,
            filterable: false,
            searchable: false,
            sortable: false,
            replacement: None,
        }
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn replacement(mut self, path: impl Into<String>) -> Self {
        self.replacement = Some(Replacement::Path(path.into()));
        self
    }

    pub fn replacement_with<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.replacement = Some(Replacement::Callback(Arc::new(callback)));
        self
    }

    /// Path the repository sees for this field
    pub fn physical_path(&self, alias: &str) -> String {
        match &self.replacement {
            None => self.field.clone(),
            Some(Replacement::Path(path)) => path.clone(),
            Some(Replacement::Callback(callback)) => callback(alias),
        }
    }
}

/// Immutable lookup table of declared fields, in declaration order
#[derive(Debug, Clone)]
pub struct FieldOptionsMap {
    fields: Vec<FieldOptions>,
    index: HashMap<String, usize>,
    primary_key: String,
    alias: String,
}

impl FieldOptionsMap {
    pub fn builder() -> FieldOptionsBuilder {
        FieldOptionsBuilder::default()
    }

    pub fn get(&self, field: &str) -> Option<&FieldOptions> {
        self.index.get(field).map(|&i| &self.fields[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldOptions> {
        self.fields.iter()
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn physical_path(&self, field: &str) -> Option<String> {
        self.get(field).map(|options| options.physical_path(&self.alias))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builder for [`FieldOptionsMap`]
#[derive(Debug)]
pub struct FieldOptionsBuilder {
    fields: Vec<FieldOptions>,
    primary_key: String,
    alias: String,
}

impl Default for FieldOptionsBuilder {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            primary_key: "id".to_string(),
            alias: "e0".to_string(),
        }
    }
}

impl FieldOptionsBuilder {
    /// Declare a field; redeclaring a name replaces the earlier options.
    pub fn add_field(mut self, options: FieldOptions) -> Self {
        match self.fields.iter_mut().find(|f| f.field == options.field) {
            Some(existing) => *existing = options,
            None => self.fields.push(options),
        }
        self
    }

    pub fn primary_key(mut self, path: impl Into<String>) -> Self {
        self.primary_key = path.into();
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn build(self) -> FieldOptionsMap {
        let index = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, options)| (options.field.clone(), i))
            .collect();
        FieldOptionsMap {
            fields: self.fields,
            index,
            primary_key: self.primary_key,
            alias: self.alias,
        }
    }
}
