#[path = "../common/mod.rs"]
mod common;

use std::thread;
use anyhow::Result;
use quarrydb::common::types::Rid;
use quarrydb::storage::record::RecordError;
use quarrydb::transaction::{AbortReason, LockDataId, LogRecordType, TransactionError, TransactionState};

use common::{create_test_engine, numbered_record, record_number};

const RECORD_SIZE: usize = 16;

fn insert_committed(engine: &quarrydb::StorageEngine, values: &[u64]) -> Result<Vec<Rid>> {
    let rids = engine.txn_manager().run(|txn| {
        values
            .iter()
            .map(|value| engine.insert_record(txn, "t", &numbered_record(*value, RECORD_SIZE)))
            .collect::<Result<Vec<_>, TransactionError>>()
    })?;
    Ok(rids)
}

#[test]
fn test_abort_undoes_writes_in_reverse_order() -> Result<()> {
    let (engine, _dir) = create_test_engine(8)?;
    let table = engine.create_table("t", RECORD_SIZE)?;
    let rids = insert_committed(&engine, &[10, 11])?;

    let txn_manager = engine.txn_manager();
    let mut txn = txn_manager.begin(None)?;
    engine.update_record(&mut txn, "t", rids[0], &numbered_record(100, RECORD_SIZE))?;
    engine.delete_record(&mut txn, "t", rids[1])?;
    // The insert lands in the slot the delete just freed
    let inserted = engine.insert_record(&mut txn, "t", &numbered_record(12, RECORD_SIZE))?;
    assert_eq!(inserted, rids[1]);
    assert_eq!(txn.write_set().len(), 3);

    txn_manager.abort(txn)?;

    assert_eq!(record_number(&table.get_record(&rids[0])?), 10);
    assert_eq!(record_number(&table.get_record(&rids[1])?), 11);
    let remaining: Vec<Rid> = table.scan()?.collect::<Result<_, _>>()?;
    assert_eq!(remaining, rids);

    assert_eq!(engine.lock_manager().locked_count(), 0);
    assert!(txn_manager.active_transaction_ids().is_empty());
    engine.shutdown()?;
    Ok(())
}

#[test]
fn test_abort_restores_deleted_record_at_its_rid() -> Result<()> {
    let (engine, _dir) = create_test_engine(8)?;
    let table = engine.create_table("t", RECORD_SIZE)?;
    let rids = insert_committed(&engine, &[1, 2, 3])?;

    let mut txn = engine.txn_manager().begin(None)?;
    engine.delete_record(&mut txn, "t", rids[1])?;
    assert!(!table.is_record(&rids[1])?);
    engine.txn_manager().abort(txn)?;

    assert_eq!(record_number(&table.get_record(&rids[1])?), 2);
    assert_eq!(table.scan()?.count(), 3);
    engine.shutdown()?;
    Ok(())
}

#[test]
fn test_insert_passes_over_slot_freed_by_uncommitted_delete() -> Result<()> {
    let (engine, _dir) = create_test_engine(8)?;
    let table = engine.create_table("t", RECORD_SIZE)?;
    let rids = insert_committed(&engine, &[1, 2])?;
    let txn_manager = engine.txn_manager();

    let mut deleter = txn_manager.begin(None)?;
    engine.delete_record(&mut deleter, "t", rids[0])?;

    // The freed slot is still locked by the deleter, so the insert goes elsewhere
    let mut inserter = txn_manager.begin(None)?;
    let inserted = engine.insert_record(&mut inserter, "t", &numbered_record(3, RECORD_SIZE))?;
    assert_ne!(inserted, rids[0]);
    assert!(inserter.lock_set().contains(&LockDataId::record(table.fd(), inserted)));
    assert!(!inserter.lock_set().contains(&LockDataId::record(table.fd(), rids[0])));

    txn_manager.abort(deleter)?;
    txn_manager.abort(inserter)?;

    assert_eq!(record_number(&table.get_record(&rids[0])?), 1);
    assert!(!table.is_record(&inserted)?);
    let remaining: Vec<Rid> = table.scan()?.collect::<Result<_, _>>()?;
    assert_eq!(remaining, rids);
    assert_eq!(engine.lock_manager().locked_count(), 0);
    engine.shutdown()?;
    Ok(())
}

#[test]
fn test_insert_skips_locked_slots_of_a_full_chain() -> Result<()> {
    let (engine, _dir) = create_test_engine(8)?;
    let table = engine.create_table("t", RECORD_SIZE)?;
    let per_page = table.header().num_records_per_page as u64;
    let rids = insert_committed(&engine, &(0..per_page).collect::<Vec<_>>())?;
    assert_eq!(table.header().first_free_page_no, None);
    let txn_manager = engine.txn_manager();

    let mut deleter = txn_manager.begin(None)?;
    engine.delete_record(&mut deleter, "t", rids[5])?;
    assert_eq!(table.header().first_free_page_no, Some(rids[5].page_no));

    // The only free slot is locked, so a new page is appended
    let mut inserter = txn_manager.begin(None)?;
    let inserted = engine.insert_record(&mut inserter, "t", &numbered_record(99, RECORD_SIZE))?;
    assert_eq!(inserted, Rid::new(rids[5].page_no + 1, 0));

    txn_manager.commit(inserter)?;
    txn_manager.commit(deleter)?;

    assert!(!table.is_record(&rids[5])?);
    assert_eq!(record_number(&table.get_record(&inserted)?), 99);
    assert_eq!(table.scan()?.count() as u64, per_page);

    // The appended page heads the free chain, ahead of the page with the freed slot
    assert_eq!(table.header().first_free_page_no, Some(inserted.page_no));
    let next = txn_manager.run(|txn| engine.insert_record(txn, "t", &numbered_record(7, RECORD_SIZE)))?;
    assert_eq!(next, Rid::new(inserted.page_no, 1));
    engine.shutdown()?;
    Ok(())
}

#[test]
fn test_abort_removes_inserted_records() -> Result<()> {
    let (engine, _dir) = create_test_engine(8)?;
    let table = engine.create_table("t", RECORD_SIZE)?;

    let mut txn = engine.txn_manager().begin(None)?;
    let rid = engine.insert_record(&mut txn, "t", &numbered_record(5, RECORD_SIZE))?;
    assert!(table.is_record(&rid)?);
    engine.txn_manager().abort(txn)?;

    assert!(matches!(table.get_record(&rid), Err(RecordError::RecordNotFound(_))));
    assert_eq!(table.scan()?.count(), 0);
    engine.shutdown()?;
    Ok(())
}

#[test]
fn test_commit_keeps_changes_and_releases_locks() -> Result<()> {
    let (engine, _dir) = create_test_engine(8)?;
    let table = engine.create_table("t", RECORD_SIZE)?;

    let mut txn = engine.txn_manager().begin(None)?;
    let txn_id = txn.id();
    let rid = engine.insert_record(&mut txn, "t", &numbered_record(42, RECORD_SIZE))?;
    assert!(txn.lock_set().contains(&LockDataId::table(table.fd())));
    assert!(txn.lock_set().contains(&LockDataId::record(table.fd(), rid)));
    assert!(engine.txn_manager().is_active(txn_id));

    engine.txn_manager().commit(txn)?;

    assert!(!engine.txn_manager().is_active(txn_id));
    assert_eq!(engine.lock_manager().locked_count(), 0);
    assert_eq!(record_number(&table.get_record(&rid)?), 42);
    engine.shutdown()?;
    Ok(())
}

#[test]
fn test_reader_is_refused_while_writer_holds_record() -> Result<()> {
    let (engine, _dir) = create_test_engine(8)?;
    engine.create_table("t", RECORD_SIZE)?;
    let rids = insert_committed(&engine, &[1])?;
    let txn_manager = engine.txn_manager();

    let mut writer = txn_manager.begin(None)?;
    engine.update_record(&mut writer, "t", rids[0], &numbered_record(2, RECORD_SIZE))?;

    let mut reader = txn_manager.begin(None)?;
    let err = engine.get_record(&mut reader, "t", rids[0]).unwrap_err();
    assert_eq!(err.abort_reason(), Some(AbortReason::DeadlockPrevention));
    // The intention lock on the table was granted before the refusal
    assert_eq!(reader.lock_set().len(), 1);
    txn_manager.abort(reader)?;

    txn_manager.commit(writer)?;

    let value = txn_manager.run(|txn| engine.get_record(txn, "t", rids[0]))?;
    assert_eq!(record_number(&value), 2);
    engine.shutdown()?;
    Ok(())
}

#[test]
fn test_scan_blocks_writers_on_the_table() -> Result<()> {
    let (engine, _dir) = create_test_engine(8)?;
    engine.create_table("t", RECORD_SIZE)?;
    insert_committed(&engine, &[1, 2])?;
    let txn_manager = engine.txn_manager();

    let mut scanner = txn_manager.begin(None)?;
    assert_eq!(engine.scan_table(&mut scanner, "t")?.len(), 2);

    let mut writer = txn_manager.begin(None)?;
    let err = engine
        .insert_record(&mut writer, "t", &numbered_record(3, RECORD_SIZE))
        .unwrap_err();
    assert_eq!(err.abort_reason(), Some(AbortReason::DeadlockPrevention));
    assert!(writer.write_set().is_empty());
    txn_manager.abort(writer)?;

    // A second reader shares the table
    let rows = txn_manager.run(|txn| engine.scan_table(txn, "t"))?;
    assert_eq!(rows.len(), 2);

    txn_manager.commit(scanner)?;
    txn_manager.run(|txn| engine.insert_record(txn, "t", &numbered_record(3, RECORD_SIZE)))?;
    engine.shutdown()?;
    Ok(())
}

#[test]
fn test_no_locks_after_release_starts() -> Result<()> {
    let (engine, _dir) = create_test_engine(8)?;
    let table = engine.create_table("t", RECORD_SIZE)?;
    let lock_manager = engine.lock_manager();

    let mut txn = engine.txn_manager().begin(None)?;
    lock_manager.lock_is_on_table(&mut txn, table.fd())?;
    assert!(lock_manager.unlock(&mut txn, LockDataId::table(table.fd())));
    assert_eq!(txn.state(), TransactionState::Shrinking);

    let err = lock_manager.lock_is_on_table(&mut txn, table.fd()).unwrap_err();
    assert_eq!(err.reason, AbortReason::LockOnShrinking);
    engine.txn_manager().abort(txn)?;
    engine.shutdown()?;
    Ok(())
}

#[test]
fn test_concurrent_increments_with_retry() -> Result<()> {
    const THREADS: usize = 4;
    const INCREMENTS: usize = 25;

    let (engine, _dir) = create_test_engine(8)?;
    let table = engine.create_table("t", RECORD_SIZE)?;
    let rid = insert_committed(&engine, &[0])?[0];
    let fd = table.fd();
    let shared = &engine;

    thread::scope(|scope| -> Result<()> {
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(move || -> Result<usize> {
                    let engine = shared;
                    let txn_manager = engine.txn_manager();
                    let mut retries = 0;
                    let mut done = 0;
                    while done < INCREMENTS {
                        let mut txn = txn_manager.begin(None)?;
                        let attempt = (|| -> Result<(), TransactionError> {
                            engine.lock_manager().lock_ix_on_table(&mut txn, fd)?;
                            engine.lock_manager().lock_exclusive_on_record(&mut txn, rid, fd)?;
                            let value = record_number(&engine.get_record(&mut txn, "t", rid)?);
                            engine.update_record(&mut txn, "t", rid, &numbered_record(value + 1, RECORD_SIZE))
                        })();
                        match attempt {
                            Ok(()) => {
                                txn_manager.commit(txn)?;
                                done += 1;
                            }
                            Err(e) if e.abort_reason() == Some(AbortReason::DeadlockPrevention) => {
                                txn_manager.abort(txn)?;
                                retries += 1;
                                thread::yield_now();
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                    Ok(retries)
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker panicked")?;
        }
        Ok(())
    })?;

    assert_eq!(record_number(&table.get_record(&rid)?), (THREADS * INCREMENTS) as u64);
    assert_eq!(engine.lock_manager().locked_count(), 0);
    assert!(engine.txn_manager().active_transaction_ids().is_empty());
    engine.shutdown()?;
    Ok(())
}

#[test]
fn test_log_records_lifecycle_of_each_transaction() -> Result<()> {
    let (engine, _dir) = create_test_engine(8)?;
    engine.create_table("t", RECORD_SIZE)?;
    let txn_manager = engine.txn_manager();

    let mut committed = txn_manager.begin(None)?;
    let committed_id = committed.id();
    engine.insert_record(&mut committed, "t", &numbered_record(1, RECORD_SIZE))?;
    txn_manager.commit(committed)?;

    let aborted = txn_manager.begin(None)?;
    let aborted_id = aborted.id();
    txn_manager.abort(aborted)?;

    let log_manager = engine.log_manager().expect("logging is enabled");
    let records = log_manager.read_log_records()?;

    let of = |txn_id| {
        records
            .iter()
            .filter(|record| record.txn_id == txn_id)
            .collect::<Vec<_>>()
    };
    let committed_log = of(committed_id);
    assert_eq!(
        committed_log.iter().map(|r| r.record_type).collect::<Vec<_>>(),
        vec![LogRecordType::Begin, LogRecordType::Commit]
    );
    assert_eq!(committed_log[0].prev_lsn, None);
    assert_eq!(committed_log[1].prev_lsn, Some(committed_log[0].lsn));

    let aborted_log = of(aborted_id);
    assert_eq!(
        aborted_log.iter().map(|r| r.record_type).collect::<Vec<_>>(),
        vec![LogRecordType::Begin, LogRecordType::Abort]
    );
    assert!(records.windows(2).all(|pair| pair[0].lsn < pair[1].lsn));
    assert_eq!(log_manager.persistent_lsn(), records.last().map(|r| r.lsn));
    engine.shutdown()?;
    Ok(())
}
