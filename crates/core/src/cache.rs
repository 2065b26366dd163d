use std::collections::{BTreeMap, BTreeSet, HashMap};

use shared::domain::ObjectId;

use crate::error::CacheError;

pub const DEFAULT_MAX_ENTRIES: usize = 1000;

struct CacheEntry<V> {
    seq: u64,
    owner: ObjectId,
    data: BTreeMap<usize, V>,
}

/// Row-indexed cache of column values. Rows are evicted oldest-touched first
/// once the cache grows past `max_entries`; the cache never fetches by itself.
pub struct ValueCache<V> {
    max_entries: usize,
    entries: HashMap<usize, CacheEntry<V>>,
    order: BTreeMap<u64, usize>,
    next_seq: u64,
}

impl<V: Clone + PartialEq> ValueCache<V> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge `row_data` into the row and return the columns whose value changed.
    pub fn add_data(
        &mut self,
        row: usize,
        owner: ObjectId,
        row_data: BTreeMap<usize, V>,
    ) -> BTreeSet<usize> {
        let seq = self.next_seq;
        self.next_seq += 1;

        let same_owner = self
            .entries
            .get(&row)
            .map(|entry| entry.owner == owner)
            .unwrap_or(false);
        if !same_owner {
            self.delete_by_row(row);
        }

        let changed = match self.entries.get_mut(&row) {
            Some(entry) => {
                self.order.remove(&entry.seq);
                entry.seq = seq;
                let mut changed = BTreeSet::new();
                for (column, value) in row_data {
                    if entry.data.get(&column) != Some(&value) {
                        entry.data.insert(column, value);
                        changed.insert(column);
                    }
                }
                changed
            }
            None => {
                let changed = row_data.keys().copied().collect();
                self.entries.insert(
                    row,
                    CacheEntry {
                        seq,
                        owner,
                        data: row_data,
                    },
                );
                changed
            }
        };
        self.order.insert(seq, row);
        self.evict();
        changed
    }

    pub fn get_data(&self, row: usize) -> Result<&BTreeMap<usize, V>, CacheError> {
        self.entries
            .get(&row)
            .map(|entry| &entry.data)
            .ok_or(CacheError::NotInCache(row))
    }

    pub fn get_value(&self, row: usize, column: usize) -> Result<&V, CacheError> {
        self.get_data(row)?
            .get(&column)
            .ok_or(CacheError::NotInCache(row))
    }

    pub fn get_owner(&self, row: usize) -> Option<ObjectId> {
        self.entries.get(&row).map(|entry| entry.owner)
    }

    /// Rows currently cached for `owner`.
    pub fn rows_of(&self, owner: ObjectId) -> Vec<usize> {
        let mut rows: Vec<usize> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.owner == owner)
            .map(|(row, _)| *row)
            .collect();
        rows.sort_unstable();
        rows
    }

    pub fn delete_by_row(&mut self, row: usize) {
        if let Some(entry) = self.entries.remove(&row) {
            self.order.remove(&entry.seq);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn evict(&mut self) {
        while self.entries.len() > self.max_entries {
            let Some((_, row)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&row);
        }
    }
}

impl<V: Clone + PartialEq> Default for ValueCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
