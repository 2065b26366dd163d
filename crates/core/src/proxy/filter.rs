use std::cmp::Ordering;

pub use shared::mode::FilterOp;

use crate::value::{Entity, ObjectRef, Value};

/// Left-hand side of a filter; the right-hand side value is stored next to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Predicate {
    pub field: String,
    pub op: FilterOp,
}

impl Predicate {
    pub fn new(field: impl Into<String>, op: FilterOp) -> Self {
        Self {
            field: field.into(),
            op,
        }
    }

    pub fn eq(field: impl Into<String>) -> Self {
        Self::new(field, FilterOp::Eq)
    }

    pub fn path(&self) -> Vec<String> {
        split_path(&self.field)
    }

    pub fn evaluate(&self, obj: &Entity, value: &Value) -> bool {
        let actual = obj.get_path(&self.path());
        match self.op {
            FilterOp::Eq => actual == *value,
            FilterOp::Ne => actual != *value,
            FilterOp::Lt => !actual.is_null() && actual.sort_cmp(value) == Ordering::Less,
            FilterOp::Le => !actual.is_null() && actual.sort_cmp(value) != Ordering::Greater,
            FilterOp::Gt => actual.sort_cmp(value) == Ordering::Greater,
            FilterOp::Ge => !actual.is_null() && actual.sort_cmp(value) != Ordering::Less,
            FilterOp::Contains => match (actual.as_str(), value.as_str()) {
                (Some(haystack), Some(needle)) => haystack
                    .to_lowercase()
                    .contains(&needle.to_lowercase()),
                _ => false,
            },
            FilterOp::StartsWith => match (actual.as_str(), value.as_str()) {
                (Some(haystack), Some(prefix)) => haystack.starts_with(prefix),
                _ => false,
            },
            FilterOp::IsNull => actual.is_null(),
            FilterOp::NotNull => !actual.is_null(),
        }
    }
}

pub fn split_path(field: &str) -> Vec<String> {
    field.split('.').map(str::to_string).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortTerm {
    pub path: Vec<String>,
    pub descending: bool,
}

impl SortTerm {
    pub fn ascending(path: Vec<String>) -> Self {
        Self {
            path,
            descending: false,
        }
    }
}

/// Filters and ordering handed to a query source.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub kind: String,
    pub filters: Vec<(Predicate, Value)>,
    pub order: Vec<SortTerm>,
}

impl QuerySpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            filters: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn matches(&self, obj: &Entity) -> bool {
        obj.kind() == self.kind
            && self
                .filters
                .iter()
                .all(|(predicate, value)| predicate.evaluate(obj, value))
    }

    pub fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        for term in &self.order {
            let ordering = a.get_path(&term.path).sort_cmp(&b.get_path(&term.path));
            let ordering = if term.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Filter and order `objects` in memory.
    pub fn apply(&self, objects: impl IntoIterator<Item = ObjectRef>) -> Vec<ObjectRef> {
        let mut selected: Vec<ObjectRef> = objects
            .into_iter()
            .filter(|obj| self.matches(obj))
            .collect();
        selected.sort_by(|a, b| self.compare(a, b));
        selected
    }
}
