//! Lazy ordered views over collections, as presented to a table.

use std::ops::Range;

use shared::domain::ObjectId;

use crate::{
    error::ProxyError,
    value::{Entity, ObjectRef, Value},
};

pub mod filter;
pub mod list;
pub mod query;

pub use filter::{FilterOp, Predicate, QuerySpec, SortTerm};
pub use list::ListModelProxy;
pub use query::QueryModelProxy;

pub trait ModelProxy: Send {
    /// Persisted rows plus appended ones.
    fn len(&mut self) -> Result<usize, ProxyError>;

    fn is_empty(&mut self) -> Result<bool, ProxyError> {
        Ok(self.len()? == 0)
    }

    fn index(&mut self, obj: &ObjectRef) -> Result<usize, ProxyError>;

    /// Objects of the view rows in `rows`, clamped to the current length.
    fn get(&mut self, rows: Range<usize>) -> Result<Vec<ObjectRef>, ProxyError>;

    fn sort(&mut self, key: Option<&str>, descending: bool) -> Result<(), ProxyError>;

    fn filter(&mut self, predicate: Predicate, value: Value) -> Result<(), ProxyError>;

    fn remove_filter(&mut self, predicate: &Predicate) -> Result<(), ProxyError>;

    fn append(&mut self, obj: ObjectRef) -> Result<(), ProxyError>;

    fn remove(&mut self, obj: &ObjectRef) -> Result<(), ProxyError>;

    /// Object with this identity if the view has already seen it.
    fn find(&self, id: ObjectId) -> Option<ObjectRef>;

    fn contains(&mut self, obj: &ObjectRef) -> bool {
        self.index(obj).is_ok()
    }
}

/// Persistence-side collection a query proxy pages through.
pub trait QuerySource: Send + Sync {
    fn count(&self, spec: &QuerySpec) -> Result<usize, ProxyError>;

    fn fetch(
        &self,
        spec: &QuerySpec,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ObjectRef>, ProxyError>;

    /// Object with `primary_key` if it satisfies `spec`.
    fn get(&self, spec: &QuerySpec, primary_key: &Value) -> Result<Option<ObjectRef>, ProxyError>;

    fn primary_key(&self, obj: &Entity) -> Option<Value>;

    /// Row of `obj` in the ordered query, found without paging. `None` lets
    /// the proxy page through `fetch` instead.
    fn position(&self, spec: &QuerySpec, obj: &Entity) -> Result<Option<usize>, ProxyError> {
        let _ = (spec, obj);
        Ok(None)
    }

    fn primary_key_field(&self, kind: &str) -> String {
        let _ = kind;
        "id".to_string()
    }

    /// Target kind of a many-to-one field, if `field` is one.
    fn relationship(&self, kind: &str, field: &str) -> Option<String>;

    /// Default order-by fields of a kind.
    fn default_order(&self, kind: &str) -> Vec<String>;
}
