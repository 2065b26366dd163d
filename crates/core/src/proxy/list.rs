use std::{
    collections::{BTreeMap, HashMap, HashSet},
    ops::Range,
};

use shared::domain::ObjectId;

use crate::{
    error::ProxyError,
    proxy::{filter::split_path, ModelProxy, Predicate},
    value::{ObjectRef, Value},
};

/// View over an owned list of objects.
///
/// `sort_and_filter` maps view rows to positions in `objects`. Appended
/// objects ignore filters, keep their tail position until the next sort and
/// then take part in the ordering like any other object.
pub struct ListModelProxy {
    objects: Vec<ObjectRef>,
    appended: HashSet<ObjectId>,
    sort_and_filter: Vec<usize>,
    sort_key: Option<(Vec<String>, bool)>,
    filters: BTreeMap<Predicate, Value>,
    indexed_objects: BTreeMap<usize, ObjectRef>,
    rows_by_id: HashMap<ObjectId, usize>,
}

impl ListModelProxy {
    pub fn new(objects: Vec<ObjectRef>) -> Self {
        let mut proxy = Self {
            objects: Vec::new(),
            appended: HashSet::new(),
            sort_and_filter: Vec::new(),
            sort_key: None,
            filters: BTreeMap::new(),
            indexed_objects: BTreeMap::new(),
            rows_by_id: HashMap::new(),
        };
        let mut seen = HashSet::new();
        proxy.objects = objects
            .into_iter()
            .filter(|obj| seen.insert(obj.id()))
            .collect();
        proxy.rebuild();
        proxy
    }

    pub fn objects(&self) -> &[ObjectRef] {
        &self.objects
    }

    fn position(&self, id: ObjectId) -> Option<usize> {
        self.objects.iter().position(|obj| obj.id() == id)
    }

    fn visible(&self, obj: &ObjectRef) -> bool {
        self.appended.contains(&obj.id())
            || self
                .filters
                .iter()
                .all(|(predicate, value)| predicate.evaluate(obj, value))
    }

    fn rebuild(&mut self) {
        let mut rows: Vec<usize> = (0..self.objects.len())
            .filter(|&i| self.visible(&self.objects[i]))
            .collect();
        if let Some((path, descending)) = &self.sort_key {
            let keys: Vec<Value> = self.objects.iter().map(|obj| obj.get_path(path)).collect();
            rows.sort_by(|&a, &b| {
                let ordering = keys[a].sort_cmp(&keys[b]);
                if *descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        self.sort_and_filter = rows;
        self.clear_index();
    }

    fn clear_index(&mut self) {
        self.indexed_objects.clear();
        self.rows_by_id.clear();
    }

    fn index_row(&mut self, row: usize, obj: ObjectRef) {
        if let Some(previous) = self.indexed_objects.insert(row, obj.clone()) {
            self.rows_by_id.remove(&previous.id());
        }
        if let Some(old_row) = self.rows_by_id.insert(obj.id(), row) {
            if old_row != row {
                self.indexed_objects.remove(&old_row);
            }
        }
    }
}

impl ModelProxy for ListModelProxy {
    fn len(&mut self) -> Result<usize, ProxyError> {
        Ok(self.sort_and_filter.len())
    }

    fn index(&mut self, obj: &ObjectRef) -> Result<usize, ProxyError> {
        if let Some(row) = self.rows_by_id.get(&obj.id()) {
            return Ok(*row);
        }
        let row = self
            .sort_and_filter
            .iter()
            .position(|&i| self.objects[i].id() == obj.id())
            .ok_or(ProxyError::NotInCollection)?;
        let found = self.objects[self.sort_and_filter[row]].clone();
        self.index_row(row, found);
        Ok(row)
    }

    fn get(&mut self, rows: Range<usize>) -> Result<Vec<ObjectRef>, ProxyError> {
        let stop = rows.end.min(self.sort_and_filter.len());
        let mut result = Vec::with_capacity(stop.saturating_sub(rows.start));
        for row in rows.start..stop {
            let obj = match self.indexed_objects.get(&row) {
                Some(obj) => obj.clone(),
                None => {
                    let obj = self.objects[self.sort_and_filter[row]].clone();
                    self.index_row(row, obj.clone());
                    obj
                }
            };
            result.push(obj);
        }
        Ok(result)
    }

    fn sort(&mut self, key: Option<&str>, descending: bool) -> Result<(), ProxyError> {
        self.sort_key = key.map(|key| (split_path(key), descending));
        self.rebuild();
        Ok(())
    }

    fn filter(&mut self, predicate: Predicate, value: Value) -> Result<(), ProxyError> {
        self.filters.insert(predicate, value);
        self.rebuild();
        Ok(())
    }

    fn remove_filter(&mut self, predicate: &Predicate) -> Result<(), ProxyError> {
        if self.filters.remove(predicate).is_some() {
            self.rebuild();
        }
        Ok(())
    }

    fn append(&mut self, obj: ObjectRef) -> Result<(), ProxyError> {
        if self.position(obj.id()).is_some() {
            return Ok(());
        }
        self.appended.insert(obj.id());
        self.objects.push(obj);
        self.sort_and_filter.push(self.objects.len() - 1);
        Ok(())
    }

    fn remove(&mut self, obj: &ObjectRef) -> Result<(), ProxyError> {
        let position = self
            .position(obj.id())
            .ok_or(ProxyError::NotInCollection)?;
        self.objects.remove(position);
        self.appended.remove(&obj.id());
        self.sort_and_filter.retain(|&i| i != position);
        for i in self.sort_and_filter.iter_mut() {
            if *i > position {
                *i -= 1;
            }
        }
        self.clear_index();
        Ok(())
    }

    fn find(&self, id: ObjectId) -> Option<ObjectRef> {
        self.objects.iter().find(|obj| obj.id() == id).cloned()
    }
}

#[cfg(test)]
#[path = "../tests/list_proxy_tests.rs"]
mod tests;
