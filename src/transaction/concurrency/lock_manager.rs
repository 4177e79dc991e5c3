use std::collections::HashMap;
use std::fmt;
use log::debug;
use parking_lot::Mutex;

use crate::common::types::{Fd, Rid, TxnId};
use crate::transaction::concurrency::error::{AbortReason, TransactionAbortError};
use crate::transaction::concurrency::transaction::{Transaction, TransactionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockDataType {
    Table,
    Record,
}

/// What a lock protects: a whole table or one record of it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockDataId {
    pub fd: Fd,
    pub rid: Option<Rid>,
    pub data_type: LockDataType,
}

impl LockDataId {
    pub fn table(fd: Fd) -> Self {
        Self {
            fd,
            rid: None,
            data_type: LockDataType::Table,
        }
    }

    pub fn record(fd: Fd, rid: Rid) -> Self {
        Self {
            fd,
            rid: Some(rid),
            data_type: LockDataType::Record,
        }
    }
}

impl fmt::Display for LockDataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rid {
            Some(rid) => write!(f, "record {} of fd {}", rid, self.fd),
            None => write!(f, "table fd {}", self.fd),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
    IntentionShared,
    IntentionExclusive,
    SharedIntentionExclusive,
}

impl LockMode {
    /// Whether holding `self` already grants everything `requested` would
    fn covers(self, requested: LockMode) -> bool {
        use LockMode::*;
        match self {
            Exclusive => true,
            SharedIntentionExclusive => requested != Exclusive,
            Shared => matches!(requested, Shared | IntentionShared),
            IntentionExclusive => matches!(requested, IntentionExclusive | IntentionShared),
            IntentionShared => requested == IntentionShared,
        }
    }

    /// Whether a request in this mode conflicts with a queue in `group` mode
    fn conflicts_with(self, group: GroupLockMode) -> bool {
        use GroupLockMode as G;
        match self {
            LockMode::IntentionShared | LockMode::Shared => matches!(group, G::X | G::Six),
            LockMode::IntentionExclusive => matches!(group, G::X | G::S | G::Six),
            LockMode::SharedIntentionExclusive | LockMode::Exclusive => group != G::NonLock,
        }
    }
}

/// Strongest mode granted in a queue. Variants are ordered by precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum GroupLockMode {
    #[default]
    NonLock,
    Is,
    Ix,
    S,
    Six,
    X,
}

impl From<LockMode> for GroupLockMode {
    fn from(mode: LockMode) -> Self {
        match mode {
            LockMode::IntentionShared => GroupLockMode::Is,
            LockMode::IntentionExclusive => GroupLockMode::Ix,
            LockMode::Shared => GroupLockMode::S,
            LockMode::SharedIntentionExclusive => GroupLockMode::Six,
            LockMode::Exclusive => GroupLockMode::X,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRequest {
    pub txn_id: TxnId,
    pub lock_mode: LockMode,
    pub granted: bool,
}

#[derive(Debug, Default)]
pub struct LockRequestQueue {
    requests: Vec<LockRequest>,
    group_lock_mode: GroupLockMode,
}

impl LockRequestQueue {
    fn recompute_group_mode(&mut self) {
        self.group_lock_mode = self
            .requests
            .iter()
            .filter(|req| req.granted)
            .map(|req| GroupLockMode::from(req.lock_mode))
            .max()
            .unwrap_or_default();
    }

    fn holds(&self, txn_id: TxnId, requested: LockMode) -> bool {
        self.requests
            .iter()
            .any(|req| req.txn_id == txn_id && req.granted && req.lock_mode.covers(requested))
    }
}

/// Multi-granularity lock table with a no-wait policy.
///
/// A conflicting request is never queued: it fails at once with
/// `DeadlockPrevention`, which obliges the caller to abort the transaction.
#[derive(Default)]
pub struct LockManager {
    lock_table: Mutex<HashMap<LockDataId, LockRequestQueue>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_shared_on_record(
        &self,
        txn: &mut Transaction,
        rid: Rid,
        tab_fd: Fd,
    ) -> Result<(), TransactionAbortError> {
        self.lock(txn, LockDataId::record(tab_fd, rid), LockMode::Shared)
    }

    pub fn lock_exclusive_on_record(
        &self,
        txn: &mut Transaction,
        rid: Rid,
        tab_fd: Fd,
    ) -> Result<(), TransactionAbortError> {
        self.lock(txn, LockDataId::record(tab_fd, rid), LockMode::Exclusive)
    }

    pub fn lock_shared_on_table(&self, txn: &mut Transaction, tab_fd: Fd) -> Result<(), TransactionAbortError> {
        self.lock(txn, LockDataId::table(tab_fd), LockMode::Shared)
    }

    pub fn lock_exclusive_on_table(&self, txn: &mut Transaction, tab_fd: Fd) -> Result<(), TransactionAbortError> {
        self.lock(txn, LockDataId::table(tab_fd), LockMode::Exclusive)
    }

    pub fn lock_is_on_table(&self, txn: &mut Transaction, tab_fd: Fd) -> Result<(), TransactionAbortError> {
        self.lock(txn, LockDataId::table(tab_fd), LockMode::IntentionShared)
    }

    pub fn lock_ix_on_table(&self, txn: &mut Transaction, tab_fd: Fd) -> Result<(), TransactionAbortError> {
        self.lock(txn, LockDataId::table(tab_fd), LockMode::IntentionExclusive)
    }

    pub fn lock_six_on_table(&self, txn: &mut Transaction, tab_fd: Fd) -> Result<(), TransactionAbortError> {
        self.lock(txn, LockDataId::table(tab_fd), LockMode::SharedIntentionExclusive)
    }

    /// Drop every request `txn` holds on `lock_data_id`.
    ///
    /// A growing transaction enters its shrinking phase. Returns false if
    /// nothing is locked on `lock_data_id`.
    pub fn unlock(&self, txn: &mut Transaction, lock_data_id: LockDataId) -> bool {
        let released = self.release(txn.id(), lock_data_id);
        txn.lock_set_mut().remove(&lock_data_id);
        if txn.state() == TransactionState::Growing {
            txn.set_state(TransactionState::Shrinking);
        }
        released
    }

    /// Current group mode of `lock_data_id`
    pub fn group_mode(&self, lock_data_id: LockDataId) -> GroupLockMode {
        self.lock_table
            .lock()
            .get(&lock_data_id)
            .map(|queue| queue.group_lock_mode)
            .unwrap_or_default()
    }

    /// Number of ids with at least one request
    pub fn locked_count(&self) -> usize {
        self.lock_table.lock().len()
    }

    pub(crate) fn release(&self, txn_id: TxnId, lock_data_id: LockDataId) -> bool {
        let mut table = self.lock_table.lock();
        let Some(queue) = table.get_mut(&lock_data_id) else {
            return false;
        };

        queue.requests.retain(|req| req.txn_id != txn_id);
        if queue.requests.is_empty() {
            table.remove(&lock_data_id);
        } else {
            queue.recompute_group_mode();
        }
        true
    }

    fn lock(
        &self,
        txn: &mut Transaction,
        lock_data_id: LockDataId,
        lock_mode: LockMode,
    ) -> Result<(), TransactionAbortError> {
        if txn.state() == TransactionState::Shrinking {
            return Err(TransactionAbortError::new(txn.id(), AbortReason::LockOnShrinking));
        }

        let mut table = self.lock_table.lock();
        let queue = table.entry(lock_data_id).or_default();

        if queue.holds(txn.id(), lock_mode) {
            return Ok(());
        }
        if lock_mode.conflicts_with(queue.group_lock_mode) {
            debug!(
                "txn {} denied {:?} on {} (group mode {:?})",
                txn.id(),
                lock_mode,
                lock_data_id,
                queue.group_lock_mode
            );
            return Err(TransactionAbortError::new(txn.id(), AbortReason::DeadlockPrevention));
        }

        queue.requests.push(LockRequest {
            txn_id: txn.id(),
            lock_mode,
            granted: true,
        });
        queue.recompute_group_mode();
        txn.lock_set_mut().insert(lock_data_id);
        Ok(())
    }
}
