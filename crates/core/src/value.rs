//! Dynamic domain objects and the values stored in their fields.

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering as AtomicOrdering},
        Arc, PoisonError, RwLock,
    },
};

use chrono::{DateTime, NaiveDate, Utc};
use shared::{domain::ObjectId, Name};

use crate::{
    error::NamingError,
    naming::{Bound, NamingContext, OBJECT},
};

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Object(ObjectRef),
    Objects(Vec<ObjectRef>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Plain JSON form; objects become their identity.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(v) => serde_json::Value::Bool(*v),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Value::from(*v),
            Value::Text(v) => serde_json::Value::String(v.clone()),
            Value::Date(v) => serde_json::Value::String(v.format("%Y-%m-%d").to_string()),
            Value::DateTime(v) => serde_json::Value::String(v.to_rfc3339()),
            Value::Object(obj) => serde_json::Value::from(obj.id().0),
            Value::Objects(objs) => {
                serde_json::Value::Array(objs.iter().map(|o| o.id().0.into()).collect())
            }
        }
    }

    /// Scalar conversion of untyped JSON; arrays and maps have no scalar form.
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(v) => Value::Bool(*v),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(v) => Value::Int(v),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(v) => Value::Text(v.clone()),
            other => Value::Text(other.to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Text(_) => 3,
            Value::Date(_) => 4,
            Value::DateTime(_) => 5,
            Value::Object(_) => 6,
            Value::Objects(_) => 7,
        }
    }

    /// Total order used for sorting: `Null` first, then by type, then by value.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Object(a), Value::Object(b)) => a.id().cmp(&b.id()),
            (Value::Objects(a), Value::Objects(b)) => a.len().cmp(&b.len()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            // NaN equals itself
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Objects(a), Value::Objects(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
            Value::Object(obj) => write!(f, "{} {}", obj.kind(), obj.id().0),
            Value::Objects(objs) => write!(f, "{} objects", objs.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceState {
    Transient,
    Persistent,
    Deleted,
}

/// A domain record. Identity is the `ObjectId`, never the field values.
pub struct Entity {
    id: ObjectId,
    kind: String,
    fields: RwLock<BTreeMap<String, Value>>,
    state: RwLock<PersistenceState>,
}

pub type ObjectRef = Arc<Entity>;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

impl Entity {
    pub fn new(kind: impl Into<String>) -> ObjectRef {
        Self::with_fields(kind, BTreeMap::new())
    }

    pub fn with_fields(kind: impl Into<String>, fields: BTreeMap<String, Value>) -> ObjectRef {
        Arc::new(Self {
            id: ObjectId(NEXT_OBJECT_ID.fetch_add(1, AtomicOrdering::Relaxed)),
            kind: kind.into(),
            fields: RwLock::new(fields),
            state: RwLock::new(PersistenceState::Transient),
        })
    }

    /// Convenience constructor from `(field, value)` pairs.
    pub fn build<I, K>(kind: impl Into<String>, fields: I) -> ObjectRef
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::with_fields(
            kind,
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn get(&self, field: &str) -> Value {
        self.fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(field)
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(field)
    }

    /// Follow a dotted path through many-to-one references.
    pub fn get_path(&self, path: &[String]) -> Value {
        let Some((first, rest)) = path.split_first() else {
            return Value::Null;
        };
        let value = self.get(first);
        if rest.is_empty() {
            return value;
        }
        match value {
            Value::Object(target) => target.get_path(rest),
            _ => Value::Null,
        }
    }

    pub fn set(&self, field: &str, value: Value) {
        self.fields
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(field.to_string(), value);
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> PersistenceState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_state(&self, state: PersistenceState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id.0)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}

/// Bind `obj` in the object context of `root`, returning its wire name.
pub fn bind_object(root: &NamingContext, obj: &ObjectRef) -> Result<Name, NamingError> {
    let objects = root.resolve_context(&Name::from([OBJECT]))?;
    let bound: Bound = obj.clone();
    objects.bind_weak(&obj.id().0.to_string(), &bound)
}

pub fn resolve_object(root: &NamingContext, name: &Name) -> Result<ObjectRef, NamingError> {
    root.resolve_as::<Entity>(name)
}

/// Identity encoded in an `('object', '<id>')` name.
pub fn object_id_of(name: &Name) -> Option<ObjectId> {
    match name.segments() {
        [context, id] if context == OBJECT => id.parse().ok().map(ObjectId),
        _ => None,
    }
}
