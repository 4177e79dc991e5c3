use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use log::{error, info};
use parking_lot::Mutex;

use crate::catalog::TableRegistry;
use crate::common::types::{Timestamp, TxnId};
use crate::transaction::concurrency::error::{Result, TransactionError};
use crate::transaction::concurrency::lock_manager::LockManager;
use crate::transaction::concurrency::transaction::{
    Transaction, TransactionState, WriteRecord, WriteType,
};
use crate::transaction::wal::{LogManager, LogRecordType};

/// Transaction manager - responsible for creating, ending and tracking transactions
pub struct TransactionManager {
    /// Next transaction ID to assign
    next_txn_id: AtomicU32,

    next_timestamp: AtomicU64,

    lock_manager: Arc<LockManager>,

    /// Absent when logging is disabled
    log_manager: Option<Arc<LogManager>>,

    /// Where undo finds the record file of a write record
    tables: Arc<TableRegistry>,

    /// Active transactions (txn_id -> start timestamp)
    active_transactions: Mutex<HashMap<TxnId, Timestamp>>,
}

impl TransactionManager {
    pub fn new(
        lock_manager: Arc<LockManager>,
        log_manager: Option<Arc<LogManager>>,
        tables: Arc<TableRegistry>,
    ) -> Self {
        Self {
            next_txn_id: AtomicU32::new(1),
            next_timestamp: AtomicU64::new(1),
            lock_manager,
            log_manager,
            tables,
            active_transactions: Mutex::new(HashMap::new()),
        }
    }

    /// Start `txn`, or a fresh explicit transaction when `None` is given.
    ///
    /// A supplied transaction whose id is already active is refused. Fresh
    /// ids skip over ids that callers registered themselves.
    pub fn begin(&self, txn: Option<Transaction>) -> Result<Transaction> {
        let mut active = self.active_transactions.lock();
        let mut txn = match txn {
            Some(txn) if active.contains_key(&txn.id()) => {
                return Err(TransactionError::AlreadyActive(txn.id()));
            }
            Some(txn) => txn,
            None => {
                let mut txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
                while active.contains_key(&txn_id) {
                    txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
                }
                let mut txn = Transaction::new(txn_id);
                txn.set_explicit(true);
                txn
            }
        };

        txn.set_start_ts(self.next_timestamp.fetch_add(1, Ordering::SeqCst));
        txn.set_state(TransactionState::Growing);
        active.insert(txn.id(), txn.start_ts());
        drop(active);

        if let Some(log_manager) = &self.log_manager {
            match log_manager.add_log_to_buffer(txn.id(), txn.prev_lsn(), LogRecordType::Begin) {
                Ok(lsn) => txn.set_prev_lsn(lsn),
                Err(e) => {
                    self.active_transactions.lock().remove(&txn.id());
                    return Err(e.into());
                }
            }
        }

        info!("began transaction {}", txn.id());
        Ok(txn)
    }

    /// Commit `txn`, releasing all of its locks.
    ///
    /// Locks are released and the transaction deregistered even when the
    /// commit record cannot be flushed; that failure is returned afterwards.
    pub fn commit(&self, mut txn: Transaction) -> Result<()> {
        self.check_active(&txn)?;

        let logged = self.write_log(&mut txn, LogRecordType::Commit);
        self.finish(&mut txn, TransactionState::Committed);
        info!("committed transaction {}", txn.id());
        logged
    }

    /// Undo every change of `txn` in reverse order, then release its locks.
    ///
    /// Every undo step is attempted; the first failure is returned once the
    /// transaction has been torn down.
    pub fn abort(&self, mut txn: Transaction) -> Result<()> {
        self.check_active(&txn)?;

        let mut first_error = None;
        for write_record in txn.take_write_set().iter().rev() {
            if let Err(e) = self.undo(write_record) {
                error!(
                    "txn {}: failed to undo {:?} of {} in {}: {}",
                    txn.id(),
                    write_record.write_type(),
                    write_record.rid(),
                    write_record.table_name(),
                    e
                );
                first_error.get_or_insert(e);
            }
        }

        let logged = self.write_log(&mut txn, LogRecordType::Abort);
        self.finish(&mut txn, TransactionState::Aborted);
        info!("aborted transaction {}", txn.id());

        match first_error {
            Some(e) => Err(e),
            None => logged,
        }
    }

    /// Run `f` inside a new transaction.
    ///
    /// Commits when `f` succeeds. Otherwise the transaction is rolled back
    /// before `f`'s error is returned.
    pub fn run<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Transaction) -> std::result::Result<T, E>,
        E: From<TransactionError>,
    {
        let mut txn = self.begin(None)?;
        match f(&mut txn) {
            Ok(value) => {
                self.commit(txn)?;
                Ok(value)
            }
            Err(e) => {
                let txn_id = txn.id();
                if let Err(abort_error) = self.abort(txn) {
                    error!("rollback of transaction {} incomplete: {}", txn_id, abort_error);
                }
                Err(e)
            }
        }
    }

    pub fn active_transaction_ids(&self) -> Vec<TxnId> {
        let mut ids: Vec<TxnId> = self.active_transactions.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_active(&self, txn_id: TxnId) -> bool {
        self.active_transactions.lock().contains_key(&txn_id)
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    pub fn log_manager(&self) -> Option<&Arc<LogManager>> {
        self.log_manager.as_ref()
    }

    fn check_active(&self, txn: &Transaction) -> Result<()> {
        match txn.state() {
            TransactionState::Committed | TransactionState::Aborted => {
                Err(TransactionError::InvalidState(txn.id()))
            }
            TransactionState::Growing | TransactionState::Shrinking => Ok(()),
        }
    }

    fn undo(&self, write_record: &WriteRecord) -> Result<()> {
        let handle = self.tables.get(write_record.table_name())?;
        let rid = write_record.rid();

        match (write_record.write_type(), write_record.record()) {
            (WriteType::InsertTuple, _) => handle.delete_record(&rid)?,
            (WriteType::DeleteTuple, Some(record)) => handle.insert_record_at(&rid, record)?,
            (WriteType::UpdateTuple, Some(record)) => handle.update_record(&rid, record)?,
            (WriteType::DeleteTuple | WriteType::UpdateTuple, None) => {
                error!("write record for {} carries no prior image", rid);
            }
        }
        Ok(())
    }

    fn write_log(&self, txn: &mut Transaction, record_type: LogRecordType) -> Result<()> {
        let Some(log_manager) = &self.log_manager else {
            return Ok(());
        };
        let lsn = log_manager.add_log_to_buffer(txn.id(), txn.prev_lsn(), record_type)?;
        txn.set_prev_lsn(lsn);
        log_manager.flush_log_to_disk()?;
        Ok(())
    }

    /// Shrink, release every lock, settle on `final_state` and deregister
    fn finish(&self, txn: &mut Transaction, final_state: TransactionState) {
        txn.set_state(TransactionState::Shrinking);
        for lock_data_id in txn.take_lock_set() {
            self.lock_manager.release(txn.id(), lock_data_id);
        }
        txn.set_state(final_state);
        self.active_transactions.lock().remove(&txn.id());
    }
}
