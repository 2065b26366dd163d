use std::{
    collections::{BTreeMap, HashMap},
    ops::Range,
    sync::Arc,
};

use shared::domain::ObjectId;

use crate::{
    error::ProxyError,
    proxy::{filter::split_path, ModelProxy, Predicate, QuerySource, QuerySpec, SortTerm},
    value::{ObjectRef, Value},
};

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// View over a persisted collection, paged through a [`QuerySource`].
///
/// Rows `[0, length)` come from the query, rows past `length` from the
/// `appended` buffer of objects inserted in this view.
pub struct QueryModelProxy {
    source: Arc<dyn QuerySource>,
    kind: String,
    filters: BTreeMap<Predicate, Value>,
    order: Vec<SortTerm>,
    length: Option<usize>,
    appended: Vec<ObjectRef>,
    indexed_objects: BTreeMap<usize, ObjectRef>,
    rows_by_id: HashMap<ObjectId, usize>,
    page_size: usize,
}

impl QueryModelProxy {
    pub fn new(source: Arc<dyn QuerySource>, kind: impl Into<String>) -> Self {
        Self {
            source,
            kind: kind.into(),
            filters: BTreeMap::new(),
            order: Vec::new(),
            length: None,
            appended: Vec::new(),
            indexed_objects: BTreeMap::new(),
            rows_by_id: HashMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn appended(&self) -> &[ObjectRef] {
        &self.appended
    }

    /// The filtered query, optionally with the full ordering applied.
    pub fn get_query(&self, order: bool) -> QuerySpec {
        let mut spec = QuerySpec::new(self.kind.clone());
        spec.filters = self
            .filters
            .iter()
            .map(|(predicate, value)| (predicate.clone(), value.clone()))
            .collect();
        if order {
            spec.order = self.order.clone();
            for field in self.source.default_order(&self.kind) {
                spec.order.push(SortTerm::ascending(split_path(&field)));
            }
            let primary_key = self.source.primary_key_field(&self.kind);
            spec.order.push(SortTerm::ascending(vec![primary_key]));
        }
        spec
    }

    fn sort_term(&self, key: &str, descending: bool) -> SortTerm {
        let mut path = split_path(key);
        if path.len() == 1 {
            if let Some(target) = self.source.relationship(&self.kind, key) {
                match self.source.default_order(&target).into_iter().next() {
                    Some(order_by) => path.extend(split_path(&order_by)),
                    None => path.push(self.source.primary_key_field(&target)),
                }
            }
        }
        SortTerm { path, descending }
    }

    fn persisted_len(&mut self) -> Result<usize, ProxyError> {
        if let Some(length) = self.length {
            return Ok(length);
        }
        let spec = self.get_query(false);
        let length = self.source.count(&spec)?;
        // objects flushed since they were appended are now counted by the query
        let mut kept = Vec::with_capacity(self.appended.len());
        for obj in std::mem::take(&mut self.appended) {
            let in_query = match self.source.primary_key(&obj) {
                Some(primary_key) => self.source.get(&spec, &primary_key)?.is_some(),
                None => false,
            };
            if !in_query {
                kept.push(obj);
            }
        }
        self.appended = kept;
        self.length = Some(length);
        Ok(length)
    }

    fn invalidate(&mut self) {
        self.length = None;
        self.clear_index();
    }

    fn clear_index(&mut self) {
        self.indexed_objects.clear();
        self.rows_by_id.clear();
    }

    fn clear_index_from(&mut self, first_row: usize) {
        let stale = self.indexed_objects.split_off(&first_row);
        for obj in stale.values() {
            self.rows_by_id.remove(&obj.id());
        }
    }

    fn index_row(&mut self, row: usize, obj: ObjectRef) {
        if let Some(previous) = self.indexed_objects.insert(row, obj.clone()) {
            if previous.id() != obj.id() {
                self.rows_by_id.remove(&previous.id());
            }
        }
        if let Some(old_row) = self.rows_by_id.insert(obj.id(), row) {
            if old_row != row {
                self.indexed_objects.remove(&old_row);
            }
        }
    }

    fn appended_position(&self, id: ObjectId) -> Option<usize> {
        self.appended.iter().position(|obj| obj.id() == id)
    }
}

impl ModelProxy for QueryModelProxy {
    fn len(&mut self) -> Result<usize, ProxyError> {
        Ok(self.persisted_len()? + self.appended.len())
    }

    fn index(&mut self, obj: &ObjectRef) -> Result<usize, ProxyError> {
        if let Some(row) = self.rows_by_id.get(&obj.id()) {
            return Ok(*row);
        }
        let length = self.persisted_len()?;
        if let Some(position) = self.appended_position(obj.id()) {
            self.index_row(length + position, obj.clone());
            return Ok(length + position);
        }
        let Some(primary_key) = self.source.primary_key(obj) else {
            return Err(ProxyError::NotInCollection);
        };
        let spec = self.get_query(true);
        if self.source.get(&spec, &primary_key)?.is_none() {
            return Err(ProxyError::NotInCollection);
        }
        if let Some(row) = self.source.position(&spec, obj)? {
            if row < length {
                self.index_row(row, obj.clone());
                return Ok(row);
            }
        }
        let mut offset = 0;
        while offset < length {
            let limit = self.page_size.min(length - offset);
            let page = self.get(offset..offset + limit)?;
            if page.is_empty() {
                break;
            }
            if let Some(row) = self.rows_by_id.get(&obj.id()) {
                return Ok(*row);
            }
            offset += page.len();
        }
        Err(ProxyError::NotInCollection)
    }

    fn get(&mut self, rows: Range<usize>) -> Result<Vec<ObjectRef>, ProxyError> {
        let length = self.persisted_len()?;
        let stop = rows.end.min(length + self.appended.len());
        if rows.start >= stop {
            return Ok(Vec::new());
        }
        let mut result = Vec::with_capacity(stop - rows.start);

        let mut length = length;
        let mut appended_changed = false;
        let mut shrunk = false;
        let mut row = rows.start;
        while row < stop.min(length) {
            let limit = stop.min(length) - row;
            let fetched = self.source.fetch(&self.get_query(true), row, limit)?;
            let short = fetched.len() < limit;
            for obj in fetched {
                if let Some(position) = self.appended_position(obj.id()) {
                    // flushed while appended: keep the visible count unchanged
                    self.appended.remove(position);
                    length += 1;
                    appended_changed = true;
                }
                self.index_row(row, obj.clone());
                result.push(obj);
                row += 1;
            }
            if short {
                shrunk = true;
                break;
            }
        }
        if shrunk {
            // rows left the query since it was counted
            self.length = None;
            length = self.persisted_len()?.min(row);
            self.length = Some(length);
            self.clear_index_from(length);
            result.truncate(length.saturating_sub(rows.start));
            tracing::debug!(kind = %self.kind, length, "query shrank under the view");
        } else if appended_changed {
            self.length = Some(length);
            self.clear_index_from(length);
        }

        let stop = rows.end.min(length + self.appended.len());
        for row in rows.start.max(length)..stop {
            let obj = self.appended[row - length].clone();
            self.index_row(row, obj.clone());
            result.push(obj);
        }
        Ok(result)
    }

    fn sort(&mut self, key: Option<&str>, descending: bool) -> Result<(), ProxyError> {
        self.order = match key {
            Some(key) => vec![self.sort_term(key, descending)],
            None => Vec::new(),
        };
        self.invalidate();
        Ok(())
    }

    fn filter(&mut self, predicate: Predicate, value: Value) -> Result<(), ProxyError> {
        self.filters.insert(predicate, value);
        self.invalidate();
        Ok(())
    }

    fn remove_filter(&mut self, predicate: &Predicate) -> Result<(), ProxyError> {
        if self.filters.remove(predicate).is_some() {
            self.invalidate();
        }
        Ok(())
    }

    fn append(&mut self, obj: ObjectRef) -> Result<(), ProxyError> {
        if self.appended_position(obj.id()).is_some() {
            return Ok(());
        }
        // transient objects cannot be in the query yet
        if let Some(primary_key) = self.source.primary_key(&obj) {
            if self
                .source
                .get(&self.get_query(false), &primary_key)?
                .is_some()
            {
                return Ok(());
            }
        }
        self.appended.push(obj);
        Ok(())
    }

    fn remove(&mut self, obj: &ObjectRef) -> Result<(), ProxyError> {
        if let Some(position) = self.appended_position(obj.id()) {
            self.appended.remove(position);
            let length = self.persisted_len()?;
            self.clear_index_from(length);
            return Ok(());
        }
        if let Some(length) = self.length {
            self.length = Some(length.saturating_sub(1));
        }
        self.clear_index();
        Ok(())
    }

    fn find(&self, id: ObjectId) -> Option<ObjectRef> {
        self.rows_by_id
            .get(&id)
            .and_then(|row| self.indexed_objects.get(row))
            .or_else(|| self.appended.iter().find(|obj| obj.id() == id))
            .cloned()
    }
}

#[cfg(test)]
#[path = "../tests/query_proxy_tests.rs"]
mod tests;
