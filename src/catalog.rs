//! Table catalog.
//!
//! Maps table ids (and names) to table files. The buffer pool uses it only to
//! route page reads and writes to the right page store.

use crate::access::TableFile;
use crate::storage::page::TableId;
use dashmap::DashMap;
use log::debug;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

struct CatalogEntry {
    name: String,
    file: Arc<dyn TableFile>,
}

#[derive(Default)]
pub struct Catalog {
    tables: DashMap<TableId, CatalogEntry>,
    names: DashMap<String, TableId>,
    next_table_id: AtomicU32,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out an id no other table registered through this catalog uses.
    pub fn next_table_id(&self) -> TableId {
        TableId(self.next_table_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Registers `file` under `name`. A table with the same id or name is
    /// replaced.
    pub fn add_table(&self, name: &str, file: Arc<dyn TableFile>) {
        let table_id = file.table_id();

        if let Some(previous) = self.names.insert(name.to_string(), table_id) {
            if previous != table_id {
                self.tables.remove(&previous);
            }
        }
        let replaced = self.tables.insert(
            table_id,
            CatalogEntry {
                name: name.to_string(),
                file,
            },
        );
        if let Some(old) = replaced {
            if old.name != name {
                self.names.remove(&old.name);
            }
            debug!("Replaced {} ('{}') in catalog", table_id, old.name);
        }
    }

    pub fn table(&self, table_id: TableId) -> Option<Arc<dyn TableFile>> {
        self.tables
            .get(&table_id)
            .map(|entry| Arc::clone(&entry.file))
    }

    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.names.get(name).map(|id| *id)
    }

    pub fn table_name(&self, table_id: TableId) -> Option<String> {
        self.tables.get(&table_id).map(|entry| entry.name.clone())
    }

    pub fn remove_table(&self, table_id: TableId) -> Option<Arc<dyn TableFile>> {
        let (_, entry) = self.tables.remove(&table_id)?;
        self.names.remove(&entry.name);
        Some(entry.file)
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<TableId> = self.tables.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
