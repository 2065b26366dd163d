//! Persistence adapter seam and its in-memory implementation.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    error::{AdminError, ProxyError},
    proxy::{QuerySource, QuerySpec},
    value::{Entity, ObjectRef, PersistenceState, Value},
};

pub const PRIMARY_KEY: &str = "id";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// The flush made the object persistent for the first time.
    pub created: bool,
}

pub trait Session: Send + Sync {
    fn flush(&self, obj: &ObjectRef) -> Result<FlushOutcome, AdminError>;

    fn delete(&self, obj: &ObjectRef) -> Result<(), AdminError>;

    /// Discard unflushed changes.
    fn refresh(&self, obj: &ObjectRef) -> Result<(), AdminError>;

    fn is_persistent(&self, obj: &Entity) -> bool {
        obj.state() == PersistenceState::Persistent
    }

    fn is_deleted(&self, obj: &Entity) -> bool {
        obj.state() == PersistenceState::Deleted
    }
}

/// Ordering and relationship metadata of one entity kind.
#[derive(Debug, Clone, Default)]
pub struct KindMeta {
    pub default_order: Vec<String>,
    pub relationships: BTreeMap<String, String>,
}

#[derive(Default)]
struct Table {
    next_key: i64,
    rows: BTreeMap<i64, ObjectRef>,
    flushed: BTreeMap<i64, BTreeMap<String, Value>>,
}

/// Session keeping per-kind tables in memory with auto-increment keys.
#[derive(Default)]
pub struct MemorySession {
    tables: RwLock<HashMap<String, Table>>,
    meta: HashMap<String, KindMeta>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_order(mut self, kind: &str, fields: &[&str]) -> Self {
        self.meta.entry(kind.to_string()).or_default().default_order =
            fields.iter().map(|field| field.to_string()).collect();
        self
    }

    pub fn with_relationship(mut self, kind: &str, field: &str, target: &str) -> Self {
        self.meta
            .entry(kind.to_string())
            .or_default()
            .relationships
            .insert(field.to_string(), target.to_string());
        self
    }

    /// Flush a batch of new objects, typically fixtures.
    pub fn add_all(&self, objects: &[ObjectRef]) -> Result<(), AdminError> {
        for obj in objects {
            self.flush(obj)?;
        }
        Ok(())
    }

    pub fn all(&self, kind: &str) -> Vec<ObjectRef> {
        self.read()
            .get(kind)
            .map(|table| table.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Table>> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Table>> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn select(&self, spec: &QuerySpec) -> Vec<ObjectRef> {
        let tables = self.read();
        match tables.get(&spec.kind) {
            Some(table) => spec.apply(table.rows.values().cloned()),
            None => Vec::new(),
        }
    }
}

impl Session for MemorySession {
    fn flush(&self, obj: &ObjectRef) -> Result<FlushOutcome, AdminError> {
        let mut tables = self.write();
        let table = tables.entry(obj.kind().to_string()).or_default();
        match obj.state() {
            PersistenceState::Deleted => Err(AdminError::Persistence(format!(
                "{} {} was deleted",
                obj.kind(),
                obj.id().0
            ))),
            PersistenceState::Persistent => {
                let key = obj.get(PRIMARY_KEY).as_i64().ok_or_else(|| {
                    AdminError::Persistence("persistent object without primary key".to_string())
                })?;
                table.flushed.insert(key, obj.snapshot());
                Ok(FlushOutcome { created: false })
            }
            PersistenceState::Transient => {
                let key = match obj.get(PRIMARY_KEY).as_i64() {
                    Some(key) => key,
                    None => table.next_key.max(1),
                };
                if table.rows.contains_key(&key) {
                    return Err(AdminError::Persistence(format!(
                        "duplicate primary key {key} for {}",
                        obj.kind()
                    )));
                }
                obj.set(PRIMARY_KEY, Value::Int(key));
                table.next_key = table.next_key.max(key + 1);
                table.rows.insert(key, obj.clone());
                table.flushed.insert(key, obj.snapshot());
                obj.set_state(PersistenceState::Persistent);
                tracing::trace!(kind = obj.kind(), key, "flushed new object");
                Ok(FlushOutcome { created: true })
            }
        }
    }

    fn delete(&self, obj: &ObjectRef) -> Result<(), AdminError> {
        if obj.state() == PersistenceState::Persistent {
            if let Some(key) = obj.get(PRIMARY_KEY).as_i64() {
                let mut tables = self.write();
                if let Some(table) = tables.get_mut(obj.kind()) {
                    table.rows.remove(&key);
                    table.flushed.remove(&key);
                }
            }
        }
        obj.set_state(PersistenceState::Deleted);
        Ok(())
    }

    fn refresh(&self, obj: &ObjectRef) -> Result<(), AdminError> {
        if obj.state() != PersistenceState::Persistent {
            return Ok(());
        }
        let Some(key) = obj.get(PRIMARY_KEY).as_i64() else {
            return Ok(());
        };
        let tables = self.read();
        if let Some(fields) = tables
            .get(obj.kind())
            .and_then(|table| table.flushed.get(&key))
        {
            for (field, value) in fields {
                obj.set(field, value.clone());
            }
        }
        Ok(())
    }
}

impl QuerySource for MemorySession {
    fn count(&self, spec: &QuerySpec) -> Result<usize, ProxyError> {
        let tables = self.read();
        Ok(tables
            .get(&spec.kind)
            .map(|table| table.rows.values().filter(|obj| spec.matches(obj)).count())
            .unwrap_or(0))
    }

    fn fetch(
        &self,
        spec: &QuerySpec,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ObjectRef>, ProxyError> {
        Ok(self
            .select(spec)
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    fn get(&self, spec: &QuerySpec, primary_key: &Value) -> Result<Option<ObjectRef>, ProxyError> {
        let Some(key) = primary_key.as_i64() else {
            return Ok(None);
        };
        let tables = self.read();
        Ok(tables
            .get(&spec.kind)
            .and_then(|table| table.rows.get(&key))
            .filter(|obj| spec.matches(obj))
            .cloned())
    }

    fn position(&self, spec: &QuerySpec, obj: &Entity) -> Result<Option<usize>, ProxyError> {
        Ok(self
            .select(spec)
            .iter()
            .position(|candidate| candidate.id() == obj.id()))
    }

    fn primary_key(&self, obj: &Entity) -> Option<Value> {
        if obj.state() != PersistenceState::Persistent {
            return None;
        }
        let key = obj.get(PRIMARY_KEY);
        (!key.is_null()).then_some(key)
    }

    fn primary_key_field(&self, _kind: &str) -> String {
        PRIMARY_KEY.to_string()
    }

    fn relationship(&self, kind: &str, field: &str) -> Option<String> {
        self.meta
            .get(kind)
            .and_then(|meta| meta.relationships.get(field))
            .cloned()
    }

    fn default_order(&self, kind: &str) -> Vec<String> {
        self.meta
            .get(kind)
            .map(|meta| meta.default_order.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
