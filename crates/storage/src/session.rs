//! Synchronous entity session over [`Storage`] for the model worker thread.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{PoisonError, RwLock},
};

use anyhow::{Context, Result};
use camelot_core::{
    error::{AdminError, ProxyError},
    proxy::{QuerySource, QuerySpec},
    session::{FlushOutcome, KindMeta, Session, PRIMARY_KEY},
    Entity, ObjectRef, PersistenceState, Value,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use tokio::runtime::{Builder, Runtime};

use crate::{Storage, StoredEntity};

const DATE_TAG: &str = "$date";
const DATETIME_TAG: &str = "$datetime";
const REF_TAG: &str = "$ref";

/// Session persisting entities as JSON documents in SQLite.
///
/// Loaded rows go through an identity map, so one persisted row is always
/// the same `ObjectRef`. Queries load every document of the kind and filter
/// and order in memory.
pub struct SqliteSession {
    storage: Storage,
    runtime: Runtime,
    identity: RwLock<HashMap<(String, i64), ObjectRef>>,
    meta: HashMap<String, KindMeta>,
}

impl SqliteSession {
    pub fn open(database_url: &str) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start storage runtime")?;
        let storage = runtime.block_on(Storage::new(database_url))?;
        tracing::info!(database_url, "opened entity store");
        Ok(Self {
            runtime,
            storage,
            identity: RwLock::new(HashMap::new()),
            meta: HashMap::new(),
        })
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

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn add_all(&self, objects: &[ObjectRef]) -> Result<(), AdminError> {
        for obj in objects {
            self.flush(obj)?;
        }
        Ok(())
    }

    /// Every persisted object of `kind`, by primary key.
    pub fn all(&self, kind: &str) -> Result<Vec<ObjectRef>> {
        let stored = self.runtime.block_on(self.storage.list_entities(kind))?;
        stored
            .into_iter()
            .map(|entity| self.materialize(entity))
            .collect()
    }

    fn load(&self, kind: &str, primary_key: i64) -> Result<Option<ObjectRef>> {
        if let Some(obj) = self.cached(kind, primary_key) {
            return Ok(Some(obj));
        }
        let stored = self
            .runtime
            .block_on(self.storage.load_entity(kind, primary_key))?;
        stored.map(|entity| self.materialize(entity)).transpose()
    }

    fn cached(&self, kind: &str, primary_key: i64) -> Option<ObjectRef> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(kind.to_string(), primary_key))
            .cloned()
    }

    fn remember(&self, obj: &ObjectRef, primary_key: i64) {
        self.identity
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((obj.kind().to_string(), primary_key), obj.clone());
    }

    fn forget(&self, kind: &str, primary_key: i64) {
        self.identity
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(kind.to_string(), primary_key));
    }

    /// The object of a stored row; objects already loaded keep their
    /// unflushed changes.
    fn materialize(&self, stored: StoredEntity) -> Result<ObjectRef> {
        if let Some(obj) = self.cached(&stored.kind, stored.primary_key) {
            return Ok(obj);
        }
        let obj = Entity::new(stored.kind.clone());
        obj.set(PRIMARY_KEY, Value::Int(stored.primary_key));
        obj.set_state(PersistenceState::Persistent);
        // registered before decoding so references back to it resolve
        self.remember(&obj, stored.primary_key);
        for (field, value) in self.decode(&stored)? {
            obj.set(&field, value);
        }
        Ok(obj)
    }

    fn decode(&self, stored: &StoredEntity) -> Result<BTreeMap<String, Value>> {
        let Some(body) = stored.body.as_object() else {
            anyhow::bail!("document for {} {} is not a map", stored.kind, stored.primary_key);
        };
        let mut fields = BTreeMap::new();
        for (field, value) in body {
            fields.insert(field.clone(), self.decode_value(value)?);
        }
        Ok(fields)
    }

    fn decode_value(&self, value: &serde_json::Value) -> Result<Value> {
        let Some(tagged) = value.as_object().filter(|map| map.len() == 1) else {
            return Ok(Value::from_json(value));
        };
        if let Some(date) = tagged.get(DATE_TAG).and_then(|v| v.as_str()) {
            return Ok(Value::Date(NaiveDate::parse_from_str(date, "%Y-%m-%d")?));
        }
        if let Some(datetime) = tagged.get(DATETIME_TAG).and_then(|v| v.as_str()) {
            return Ok(Value::DateTime(DateTime::parse_from_rfc3339(datetime)?.with_timezone(&Utc)));
        }
        if let Some(reference) = tagged.get(REF_TAG) {
            let kind = reference["kind"].as_str().unwrap_or_default();
            let Some(key) = reference["key"].as_i64() else {
                return Ok(Value::Null);
            };
            return Ok(match self.load(kind, key)? {
                Some(obj) => Value::Object(obj),
                None => {
                    tracing::warn!(kind, key, "dangling reference in stored document");
                    Value::Null
                }
            });
        }
        Ok(Value::from_json(value))
    }

    fn refresh_from_store(&self, obj: &ObjectRef, primary_key: i64) -> Result<()> {
        let stored = self
            .runtime
            .block_on(self.storage.load_entity(obj.kind(), primary_key))?;
        if let Some(stored) = stored {
            for (field, value) in self.decode(&stored)? {
                obj.set(&field, value);
            }
        }
        Ok(())
    }

    fn load_kind(&self, kind: &str) -> Result<Vec<ObjectRef>, ProxyError> {
        self.all(kind).map_err(query_error)
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        // the pool must be closed while a runtime drives it
        self.runtime.block_on(self.storage.pool().close());
    }
}

/// JSON document of an entity; the primary key lives in its own column.
fn encode(obj: &Entity) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    for (field, value) in obj.snapshot() {
        if field == PRIMARY_KEY {
            continue;
        }
        let encoded = match &value {
            Value::Date(date) => json!({ DATE_TAG: date.format("%Y-%m-%d").to_string() }),
            Value::DateTime(datetime) => json!({ DATETIME_TAG: datetime.to_rfc3339() }),
            Value::Object(target) => match target.get(PRIMARY_KEY).as_i64() {
                Some(key) if target.state() == PersistenceState::Persistent => {
                    json!({ REF_TAG: { "kind": target.kind(), "key": key } })
                }
                _ => {
                    tracing::debug!(field = %field, "reference to an unsaved object stored as null");
                    serde_json::Value::Null
                }
            },
            // collections are derived from the many-to-one side
            Value::Objects(_) => continue,
            other => other.to_json(),
        };
        body.insert(field, encoded);
    }
    serde_json::Value::Object(body)
}

fn persistence_error(err: anyhow::Error) -> AdminError {
    AdminError::Persistence(format!("{err:#}"))
}

fn query_error(err: anyhow::Error) -> ProxyError {
    ProxyError::Query(format!("{err:#}"))
}

impl Session for SqliteSession {
    fn flush(&self, obj: &ObjectRef) -> Result<FlushOutcome, AdminError> {
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
                let updated = self
                    .runtime
                    .block_on(self.storage.update_entity(obj.kind(), key, &encode(obj)))
                    .map_err(persistence_error)?;
                if !updated {
                    return Err(AdminError::Persistence(format!(
                        "{} {key} no longer exists",
                        obj.kind()
                    )));
                }
                Ok(FlushOutcome { created: false })
            }
            PersistenceState::Transient => {
                let requested = obj.get(PRIMARY_KEY).as_i64();
                let key = self
                    .runtime
                    .block_on(self.storage.insert_entity(obj.kind(), requested, &encode(obj)))
                    .map_err(persistence_error)?;
                obj.set(PRIMARY_KEY, Value::Int(key));
                obj.set_state(PersistenceState::Persistent);
                self.remember(obj, key);
                tracing::debug!(kind = obj.kind(), key, "stored new object");
                Ok(FlushOutcome { created: true })
            }
        }
    }

    fn delete(&self, obj: &ObjectRef) -> Result<(), AdminError> {
        if obj.state() == PersistenceState::Persistent {
            if let Some(key) = obj.get(PRIMARY_KEY).as_i64() {
                self.runtime
                    .block_on(self.storage.delete_entity(obj.kind(), key))
                    .map_err(persistence_error)?;
                self.forget(obj.kind(), key);
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
        self.refresh_from_store(obj, key).map_err(persistence_error)
    }
}

impl QuerySource for SqliteSession {
    fn count(&self, spec: &QuerySpec) -> Result<usize, ProxyError> {
        Ok(self
            .load_kind(&spec.kind)?
            .iter()
            .filter(|obj| spec.matches(obj))
            .count())
    }

    fn fetch(
        &self,
        spec: &QuerySpec,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ObjectRef>, ProxyError> {
        Ok(spec
            .apply(self.load_kind(&spec.kind)?)
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    fn get(&self, spec: &QuerySpec, primary_key: &Value) -> Result<Option<ObjectRef>, ProxyError> {
        let Some(key) = primary_key.as_i64() else {
            return Ok(None);
        };
        Ok(self
            .load(&spec.kind, key)
            .map_err(query_error)?
            .filter(|obj| spec.matches(obj)))
    }

    fn position(&self, spec: &QuerySpec, obj: &Entity) -> Result<Option<usize>, ProxyError> {
        Ok(spec
            .apply(self.load_kind(&spec.kind)?)
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
