use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;

use crate::catalog::error::CatalogError;
use crate::common::types::Fd;
use crate::storage::record::RecordFileHandle;

/// Open tables by name
#[derive(Default)]
pub struct TableRegistry {
    tables: RwLock<HashMap<String, Arc<RecordFileHandle>>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, handle: Arc<RecordFileHandle>) -> Result<(), CatalogError> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(CatalogError::TableAlreadyExists(name.to_string()));
        }
        tables.insert(name.to_string(), handle);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<RecordFileHandle>, CatalogError> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    pub fn remove(&self, name: &str) -> Result<Arc<RecordFileHandle>, CatalogError> {
        self.tables
            .write()
            .remove(name)
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    /// Name of the table stored in file `fd`
    pub fn name_of(&self, fd: Fd) -> Option<String> {
        self.tables
            .read()
            .iter()
            .find(|(_, handle)| handle.fd() == fd)
            .map(|(name, _)| name.clone())
    }

    /// Registered table names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove and return every table
    pub fn drain(&self) -> Vec<(String, Arc<RecordFileHandle>)> {
        self.tables.write().drain().collect()
    }
}
