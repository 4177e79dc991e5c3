use std::fs;
use std::sync::Arc;
use log::{info, warn};

use crate::catalog::{CatalogError, TableRegistry};
use crate::common::config::EngineConfig;
use crate::common::types::Rid;
use crate::engine::error::Result;
use crate::storage::buffer::BufferPoolManager;
use crate::storage::disk::DiskManager;
use crate::storage::record::{RecordFileHandle, RecordManager};
use crate::transaction::{
    AbortReason, GroupLockMode, LockDataId, LockManager, LogManager, Transaction, TransactionError,
    TransactionManager, WriteRecord,
};

/// Table files in the data directory carry this extension
const TABLE_EXTENSION: &str = "tbl";

/// One database instance: a data directory with its tables, buffer pool,
/// lock table, log and transaction manager.
///
/// Created by `open` and torn down by `shutdown`.
pub struct StorageEngine {
    config: EngineConfig,
    disk_manager: Arc<DiskManager>,
    buffer_pool: Arc<BufferPoolManager>,
    record_manager: RecordManager,
    tables: Arc<TableRegistry>,
    lock_manager: Arc<LockManager>,
    log_manager: Option<Arc<LogManager>>,
    txn_manager: TransactionManager,
}

impl StorageEngine {
    /// Open the data directory named by `config`, creating it if needed, and
    /// reopen every table found there
    pub fn open(config: EngineConfig) -> Result<Self> {
        let disk_manager = Arc::new(DiskManager::new(config.log_path()));
        if !disk_manager.is_dir(&config.data_dir) {
            disk_manager.create_dir(&config.data_dir)?;
        }

        let buffer_pool = Arc::new(BufferPoolManager::new(
            config.buffer_pool_size,
            Arc::clone(&disk_manager),
        ));
        let record_manager = RecordManager::new(Arc::clone(&disk_manager), Arc::clone(&buffer_pool));
        let tables = Arc::new(TableRegistry::new());
        let lock_manager = Arc::new(LockManager::new());
        let log_manager = if config.enable_logging {
            Some(Arc::new(LogManager::new(Arc::clone(&disk_manager))?))
        } else {
            None
        };
        let txn_manager = TransactionManager::new(
            Arc::clone(&lock_manager),
            log_manager.clone(),
            Arc::clone(&tables),
        );

        let engine = Self {
            config,
            disk_manager,
            buffer_pool,
            record_manager,
            tables,
            lock_manager,
            log_manager,
            txn_manager,
        };

        for name in engine.stored_table_names()? {
            engine.open_table(&name)?;
        }
        info!(
            "opened engine at {} ({} tables, {} frames)",
            engine.config.data_dir.display(),
            engine.tables.names().len(),
            engine.config.buffer_pool_size
        );
        Ok(engine)
    }

    /// Create table `name` storing `record_size`-byte records and open it
    pub fn create_table(&self, name: &str, record_size: usize) -> Result<Arc<RecordFileHandle>> {
        if self.tables.contains(name) {
            return Err(CatalogError::TableAlreadyExists(name.to_string()).into());
        }
        self.record_manager
            .create_file(self.config.table_path(name), record_size)?;
        self.open_table(name)
    }

    /// Open table `name`, or return its handle if it is already open
    pub fn open_table(&self, name: &str) -> Result<Arc<RecordFileHandle>> {
        if let Ok(handle) = self.tables.get(name) {
            return Ok(handle);
        }
        let handle = Arc::new(self.record_manager.open_file(self.config.table_path(name))?);
        self.tables.register(name, Arc::clone(&handle))?;
        Ok(handle)
    }

    /// Write back and close table `name`. It stays on disk.
    ///
    /// Refused while any transaction holds a lock on the table, since its
    /// undo still needs the open file.
    pub fn close_table(&self, name: &str) -> Result<()> {
        let fd = self.tables.get(name)?.fd();
        if self.lock_manager.group_mode(LockDataId::table(fd)) != GroupLockMode::NonLock {
            return Err(CatalogError::TableInUse(name.to_string()).into());
        }
        let handle = self.tables.remove(name)?;
        if let Err(e) = self.record_manager.close_file(&handle) {
            self.tables.register(name, handle)?;
            return Err(e.into());
        }
        Ok(())
    }

    /// Close table `name` and delete its file
    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.close_table(name)?;
        self.record_manager.destroy_file(self.config.table_path(name))?;
        info!("dropped table {}", name);
        Ok(())
    }

    pub fn table(&self, name: &str) -> Result<Arc<RecordFileHandle>> {
        Ok(self.tables.get(name)?)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.names()
    }

    /// Insert a record under an IX table lock and an X lock on the new record.
    ///
    /// The X lock is taken before the slot is written. Slots still locked by
    /// another transaction, such as ones freed by its uncommitted deletes,
    /// are passed over.
    pub fn insert_record(
        &self,
        txn: &mut Transaction,
        table: &str,
        buf: &[u8],
    ) -> std::result::Result<Rid, TransactionError> {
        let handle = self.tables.get(table)?;
        let fd = handle.fd();
        self.lock_manager.lock_ix_on_table(txn, fd)?;

        let rid = handle.insert_record_with(buf, |rid| {
            match self.lock_manager.lock_exclusive_on_record(txn, rid, fd) {
                Ok(()) => Ok(true),
                Err(e) if e.reason == AbortReason::DeadlockPrevention => Ok(false),
                Err(e) => Err(TransactionError::from(e)),
            }
        })?;
        txn.append_write_record(WriteRecord::insert(table, rid));
        Ok(rid)
    }

    pub fn delete_record(
        &self,
        txn: &mut Transaction,
        table: &str,
        rid: Rid,
    ) -> std::result::Result<(), TransactionError> {
        let handle = self.tables.get(table)?;
        self.lock_manager.lock_ix_on_table(txn, handle.fd())?;
        self.lock_manager.lock_exclusive_on_record(txn, rid, handle.fd())?;

        let old_record = handle.get_record(&rid)?;
        handle.delete_record(&rid)?;
        txn.append_write_record(WriteRecord::delete(table, rid, old_record));
        Ok(())
    }

    pub fn update_record(
        &self,
        txn: &mut Transaction,
        table: &str,
        rid: Rid,
        buf: &[u8],
    ) -> std::result::Result<(), TransactionError> {
        let handle = self.tables.get(table)?;
        self.lock_manager.lock_ix_on_table(txn, handle.fd())?;
        self.lock_manager.lock_exclusive_on_record(txn, rid, handle.fd())?;

        let old_record = handle.get_record(&rid)?;
        handle.update_record(&rid, buf)?;
        txn.append_write_record(WriteRecord::update(table, rid, old_record));
        Ok(())
    }

    /// Read one record under an IS table lock and an S record lock
    pub fn get_record(
        &self,
        txn: &mut Transaction,
        table: &str,
        rid: Rid,
    ) -> std::result::Result<Vec<u8>, TransactionError> {
        let handle = self.tables.get(table)?;
        self.lock_manager.lock_is_on_table(txn, handle.fd())?;
        self.lock_manager.lock_shared_on_record(txn, rid, handle.fd())?;
        Ok(handle.get_record(&rid)?)
    }

    /// Read every record of `table` under an S table lock
    pub fn scan_table(
        &self,
        txn: &mut Transaction,
        table: &str,
    ) -> std::result::Result<Vec<(Rid, Vec<u8>)>, TransactionError> {
        let handle = self.tables.get(table)?;
        self.lock_manager.lock_shared_on_table(txn, handle.fd())?;

        let mut records = Vec::new();
        for rid in handle.scan()? {
            let rid = rid?;
            records.push((rid, handle.get_record(&rid)?));
        }
        Ok(records)
    }

    pub fn txn_manager(&self) -> &TransactionManager {
        &self.txn_manager
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    pub fn log_manager(&self) -> Option<&Arc<LogManager>> {
        self.log_manager.as_ref()
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.buffer_pool
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Flush the log and close every table
    pub fn shutdown(self) -> Result<()> {
        let active = self.txn_manager.active_transaction_ids();
        if !active.is_empty() {
            warn!("shutting down with {} active transactions: {:?}", active.len(), active);
        }

        if let Some(log_manager) = &self.log_manager {
            log_manager.flush_log_to_disk()?;
        }
        for (name, handle) in self.tables.drain() {
            self.record_manager.close_file(&handle)?;
            info!("closed table {}", name);
        }
        info!("engine at {} shut down", self.config.data_dir.display());
        Ok(())
    }

    /// Names of the table files in the data directory, sorted
    fn stored_table_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.config.data_dir)? {
            let path = entry?.path();
            if !self.disk_manager.is_file(&path)
                || path.extension().and_then(|ext| ext.to_str()) != Some(TABLE_EXTENSION)
            {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
