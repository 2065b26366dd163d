//! Unit of work an action runs against: a view with its caches and selection.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use shared::{domain::SelectionRange, Name};

use crate::{
    admin::{AdminRef, DynamicAttributes, FieldAttributes},
    cache::{ValueCache, DEFAULT_MAX_ENTRIES},
    error::{NamingError, ProxyError},
    naming::{NamingContext, MODEL_CONTEXT},
    proxy::ModelProxy,
    validator::Validator,
    value::{ObjectRef, Value},
};

static NEXT_MODEL_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

pub type ModelContextRef = Arc<Mutex<ModelContext>>;

pub struct ModelContext {
    pub admin: AdminRef,
    pub admin_route: Name,
    pub proxy: Box<dyn ModelProxy>,
    pub locale: String,
    pub edit_cache: ValueCache<Value>,
    pub attributes_cache: ValueCache<DynamicAttributes>,
    pub static_field_attributes: Vec<FieldAttributes>,
    pub current_row: Option<usize>,
    pub current_column: Option<usize>,
    pub current_field_name: Option<String>,
    pub selected_rows: Vec<SelectionRange>,
    pub collection_count: usize,
    pub selection_count: usize,
    pub validator: Arc<dyn Validator>,
    /// Candidates of the last completion; the object context only holds them weakly.
    pub completions: Vec<ObjectRef>,
}

impl ModelContext {
    pub fn new(admin: AdminRef, admin_route: Name, proxy: Box<dyn ModelProxy>) -> Self {
        let validator = admin.get_validator();
        Self {
            admin,
            admin_route,
            proxy,
            locale: "en_US".to_string(),
            edit_cache: ValueCache::new(DEFAULT_MAX_ENTRIES),
            attributes_cache: ValueCache::new(DEFAULT_MAX_ENTRIES),
            static_field_attributes: Vec::new(),
            current_row: None,
            current_column: None,
            current_field_name: None,
            selected_rows: Vec::new(),
            collection_count: 0,
            selection_count: 0,
            validator,
            completions: Vec::new(),
        }
    }

    pub fn with_cache_size(mut self, max_entries: usize) -> Self {
        self.edit_cache = ValueCache::new(max_entries);
        self.attributes_cache = ValueCache::new(max_entries);
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn into_ref(self) -> ModelContextRef {
        Arc::new(Mutex::new(self))
    }

    pub fn field_attributes(&self, column: usize) -> Option<&FieldAttributes> {
        self.static_field_attributes.get(column)
    }

    pub fn clear_caches(&mut self) {
        self.edit_cache.clear();
        self.attributes_cache.clear();
    }

    /// Object at a view row, `None` past the end.
    pub fn object_at(&mut self, row: usize) -> Result<Option<ObjectRef>, ProxyError> {
        Ok(self.proxy.get(row..row.saturating_add(1))?.into_iter().next())
    }

    pub fn get_object(&mut self) -> Result<Option<ObjectRef>, ProxyError> {
        match self.current_row {
            Some(row) => self.object_at(row),
            None => Ok(None),
        }
    }

    /// Selected objects in row order.
    pub fn selected_objects(&mut self) -> Result<Vec<ObjectRef>, ProxyError> {
        let mut objects = Vec::new();
        for range in self.selected_rows.clone() {
            objects.extend(self.proxy.get(range.first_row..range.last_row.saturating_add(1))?);
        }
        Ok(objects)
    }

    /// Every object of the view, fetched page by page.
    pub fn collection_objects(&mut self, page_size: usize) -> Result<Vec<ObjectRef>, ProxyError> {
        let page_size = page_size.max(1);
        let len = self.proxy.len()?;
        let mut objects = Vec::with_capacity(len);
        let mut offset = 0;
        while offset < len {
            let page = self.proxy.get(offset..(offset + page_size).min(len))?;
            if page.is_empty() {
                break;
            }
            offset += page.len();
            objects.extend(page);
        }
        Ok(objects)
    }
}

pub fn lock(model_context: &ModelContextRef) -> MutexGuard<'_, ModelContext> {
    model_context.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bind under `('model_context', '<id>')`.
pub fn bind_model_context(
    root: &NamingContext,
    model_context: ModelContextRef,
) -> Result<Name, NamingError> {
    let id = NEXT_MODEL_CONTEXT_ID.fetch_add(1, Ordering::Relaxed).to_string();
    root.bind(&Name::from([MODEL_CONTEXT, id.as_str()]), model_context)
}

pub fn resolve_model_context(
    root: &NamingContext,
    name: &Name,
) -> Result<ModelContextRef, NamingError> {
    root.resolve_as::<Mutex<ModelContext>>(name)
}

/// Context handed to a field action: one field of one object.
#[derive(Clone)]
pub struct FieldActionModelContext {
    pub admin: AdminRef,
    pub admin_route: Name,
    pub obj: ObjectRef,
    pub field: String,
    pub value: Value,
    pub field_attributes: FieldAttributes,
    pub dynamic_attributes: DynamicAttributes,
}

impl FieldActionModelContext {
    pub fn set_value(&mut self, value: Value) -> Result<(), crate::error::AdminError> {
        self.admin.set_field_value(&self.obj, &self.field, value.clone())?;
        self.value = value;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/model_context_tests.rs"]
mod tests;
