//! Entity capabilities and reference-aware field access

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::cursor::PrimaryKey;

/// A paginated row
pub trait Entity: Send + Sync {
    fn primary_key(&self) -> PrimaryKey;

    /// Value of a single (non-dotted) field, if the entity has it
    fn field(&self, name: &str) -> Option<Resolvable>;
}

/// Deferred link to another entity
pub trait Reference: Send + Sync {
    fn primary_key(&self) -> PrimaryKey;

    /// The referenced entity, or `None` when it has not been loaded
    fn resolve(&self) -> Option<Arc<dyn Entity>>;
}

/// A field value: either plain data or a reference to resolve
#[derive(Clone)]
pub enum Resolvable {
    Value(Value),
    Reference(Arc<dyn Reference>),
}

impl From<Value> for Resolvable {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl fmt::Debug for Resolvable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Reference(r) => f.debug_tuple("Reference").field(&r.primary_key()).finish(),
        }
    }
}

/// Reference that may or may not carry the loaded entity
#[derive(Clone)]
pub struct EntityRef {
    key: PrimaryKey,
    entity: Option<Arc<dyn Entity>>,
}

impl EntityRef {
    pub fn loaded(entity: Arc<dyn Entity>) -> Self {
        Self {
            key: entity.primary_key(),
            entity: Some(entity),
        }
    }

    pub fn unloaded(key: impl Into<PrimaryKey>) -> Self {
        Self {
            key: key.into(),
            entity: None,
        }
    }
}

impl Reference for EntityRef {
    fn primary_key(&self) -> PrimaryKey {
        self.key.clone()
    }

    fn resolve(&self) -> Option<Arc<dyn Entity>> {
        self.entity.clone()
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRef")
            .field("key", &self.key)
            .field("loaded", &self.entity.is_some())
            .finish()
    }
}

enum Hop<'a> {
    Borrowed(&'a dyn Entity),
    Shared(Arc<dyn Entity>),
    Value(Value),
}

/// Read a dotted path from an entity
///
/// References met along the way are resolved before descending. Traversal
/// stops at the first missing segment (or unloaded reference) and returns
/// the last value resolved so far; an entity reached as a value stands in
/// as its primary key.
pub fn get(entity: &dyn Entity, path: &str) -> Option<Value> {
    let mut hop = Hop::Borrowed(entity);
    let mut last = None;

    for segment in path.split('.') {
        let next = match &hop {
            Hop::Borrowed(e) => e.field(segment),
            Hop::Shared(e) => e.field(segment),
            Hop::Value(Value::Object(map)) => map.get(segment).cloned().map(Resolvable::Value),
            Hop::Value(_) => None,
        };

        hop = match next {
            None => break,
            Some(Resolvable::Value(value)) => {
                last = Some(value.clone());
                Hop::Value(value)
            }
            Some(Resolvable::Reference(reference)) => {
                last = Some(reference.primary_key().to_value());
                match reference.resolve() {
                    Some(resolved) => Hop::Shared(resolved),
                    None => break,
                }
            }
        };
    }

    last
}
