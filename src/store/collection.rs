//! Typed collection handle over one sled tree
//!
//! Rows are JSON-serialized documents keyed by their id. Writes rely on
//! sled's background flushing for durability; on crash at most the last
//! few writes may be lost, which is acceptable because every ingestion
//! write is idempotent on `external_id` and re-polled next cycle.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::filter::{Filter, Query};
use super::StoreError;

/// A persistable record type bound to a named collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection (sled tree) name.
    const COLLECTION: &'static str;

    /// Primary key accessor.
    fn id(&self) -> &str;
}

/// Typed handle to one collection.
#[derive(Clone)]
pub struct Collection<T: Document> {
    tree: sled::Tree,
    _marker: PhantomData<T>,
}

impl<T: Document> Collection<T> {
    pub(crate) fn new(tree: sled::Tree) -> Self {
        Self {
            tree,
            _marker: PhantomData,
        }
    }

    /// Insert one row, overwriting any row with the same id.
    pub fn insert(&self, row: &T) -> Result<(), StoreError> {
        let value = serde_json::to_vec(row)?;
        self.tree.insert(row.id().as_bytes(), value)?;
        Ok(())
    }

    /// Insert a batch of rows atomically.
    pub fn insert_batch(&self, rows: &[T]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut batch = sled::Batch::default();
        for row in rows {
            batch.insert(row.id().as_bytes(), serde_json::to_vec(row)?);
        }
        self.tree.apply_batch(batch)?;
        Ok(())
    }

    /// Fetch one row by id.
    pub fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        match self.tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Run a filtered, ordered, paginated read.
    pub fn find(&self, query: &Query) -> Result<Vec<T>, StoreError> {
        let mut rows: Vec<(Value, Vec<u8>)> = Vec::new();
        for item in self.tree.iter() {
            let (_key, bytes) = item?;
            let value: Value = serde_json::from_slice(&bytes)?;
            if query.filter.matches(&value) {
                rows.push((value, bytes.to_vec()));
            }
        }

        query.sort_rows(&mut rows);

        let iter = rows.into_iter().skip(query.offset);
        let selected: Vec<(Value, Vec<u8>)> = match query.limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        };

        selected
            .into_iter()
            .map(|(value, _)| serde_json::from_value(value).map_err(StoreError::from))
            .collect()
    }

    /// Return the single matching row, if any.
    pub fn maybe_single(&self, query: &Query) -> Result<Option<T>, StoreError> {
        let mut rows = self.find(&query.clone().limit(1))?;
        Ok(rows.pop())
    }

    /// Apply a partial update to every row matching `filter`.
    ///
    /// Returns the number of rows updated.
    pub fn update_where<F>(&self, filter: &Filter, mut patch: F) -> Result<usize, StoreError>
    where
        F: FnMut(&mut T),
    {
        let mut updated = 0usize;
        for item in self.tree.iter() {
            let (key, bytes) = item?;
            let value: Value = serde_json::from_slice(&bytes)?;
            if !filter.matches(&value) {
                continue;
            }
            let mut row: T = serde_json::from_value(value)?;
            patch(&mut row);
            self.tree.insert(key, serde_json::to_vec(&row)?)?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Count rows matching `filter` without materializing them.
    pub fn count(&self, filter: &Filter) -> Result<usize, StoreError> {
        if matches!(filter, Filter::All) {
            return Ok(self.tree.len());
        }
        let mut n = 0usize;
        for item in self.tree.iter() {
            let (_key, bytes) = item?;
            let value: Value = serde_json::from_slice(&bytes)?;
            if filter.matches(&value) {
                n += 1;
            }
        }
        Ok(n)
    }

    /// Remove one row by id. Returns whether a row existed.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.tree.remove(id.as_bytes())?.is_some())
    }

    /// Remove every row. Test helper.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.tree.clear()?;
        Ok(())
    }
}
