use std::collections::HashSet;

use crate::common::types::{Lsn, Rid, Timestamp, TxnId};
use crate::transaction::concurrency::lock_manager::LockDataId;

/// Two-phase locking states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteType {
    InsertTuple,
    DeleteTuple,
    UpdateTuple,
}

/// One change made by a transaction, with what is needed to undo it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    write_type: WriteType,
    table_name: String,
    rid: Rid,
    /// Record bytes before the change, for deletes and updates
    record: Option<Vec<u8>>,
}

impl WriteRecord {
    pub fn insert(table_name: impl Into<String>, rid: Rid) -> Self {
        Self {
            write_type: WriteType::InsertTuple,
            table_name: table_name.into(),
            rid,
            record: None,
        }
    }

    pub fn delete(table_name: impl Into<String>, rid: Rid, record: Vec<u8>) -> Self {
        Self {
            write_type: WriteType::DeleteTuple,
            table_name: table_name.into(),
            rid,
            record: Some(record),
        }
    }

    pub fn update(table_name: impl Into<String>, rid: Rid, old_record: Vec<u8>) -> Self {
        Self {
            write_type: WriteType::UpdateTuple,
            table_name: table_name.into(),
            rid,
            record: Some(old_record),
        }
    }

    pub fn write_type(&self) -> WriteType {
        self.write_type
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn rid(&self) -> Rid {
        self.rid
    }

    pub fn record(&self) -> Option<&[u8]> {
        self.record.as_deref()
    }
}

/// A running transaction.
///
/// Owned by the thread driving it; handed to `TransactionManager::commit` or
/// `abort` by value when it ends.
#[derive(Debug)]
pub struct Transaction {
    id: TxnId,
    state: TransactionState,
    start_ts: Timestamp,
    /// Started by an explicit BEGIN rather than wrapping a single statement
    explicit_mode: bool,
    prev_lsn: Option<Lsn>,
    lock_set: HashSet<LockDataId>,
    write_set: Vec<WriteRecord>,
}

impl Transaction {
    pub fn new(id: TxnId) -> Self {
        Self {
            id,
            state: TransactionState::Growing,
            start_ts: 0,
            explicit_mode: false,
            prev_lsn: None,
            lock_set: HashSet::new(),
            write_set: Vec::new(),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: TransactionState) {
        self.state = state;
    }

    pub fn start_ts(&self) -> Timestamp {
        self.start_ts
    }

    pub(crate) fn set_start_ts(&mut self, start_ts: Timestamp) {
        self.start_ts = start_ts;
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit_mode
    }

    pub fn set_explicit(&mut self, explicit_mode: bool) {
        self.explicit_mode = explicit_mode;
    }

    pub fn prev_lsn(&self) -> Option<Lsn> {
        self.prev_lsn
    }

    pub(crate) fn set_prev_lsn(&mut self, lsn: Lsn) {
        self.prev_lsn = Some(lsn);
    }

    /// Locks currently held
    pub fn lock_set(&self) -> &HashSet<LockDataId> {
        &self.lock_set
    }

    pub(crate) fn lock_set_mut(&mut self) -> &mut HashSet<LockDataId> {
        &mut self.lock_set
    }

    pub fn write_set(&self) -> &[WriteRecord] {
        &self.write_set
    }

    /// Remember a change so that abort can undo it
    pub fn append_write_record(&mut self, record: WriteRecord) {
        self.write_set.push(record);
    }

    pub(crate) fn take_write_set(&mut self) -> Vec<WriteRecord> {
        std::mem::take(&mut self.write_set)
    }

    pub(crate) fn take_lock_set(&mut self) -> HashSet<LockDataId> {
        std::mem::take(&mut self.lock_set)
    }
}
