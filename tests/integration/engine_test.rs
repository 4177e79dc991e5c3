#[path = "../common/mod.rs"]
mod common;

use anyhow::Result;
use tempfile::TempDir;
use quarrydb::catalog::CatalogError;
use quarrydb::transaction::{LogRecordType, TransactionError};
use quarrydb::{EngineConfig, EngineError, StorageEngine};

use common::{create_test_engine, numbered_record, record_number, test_config};

#[test]
fn test_records_survive_restart() -> Result<()> {
    let dir = TempDir::new()?;

    let engine = StorageEngine::open(test_config(&dir, 4))?;
    engine.create_table("orders", 32)?;
    engine.create_table("items", 128)?;
    let rids = engine.txn_manager().run(|txn| {
        (0..100)
            .map(|i| engine.insert_record(txn, "orders", &numbered_record(i, 32)))
            .collect::<Result<Vec<_>, TransactionError>>()
    })?;
    engine.shutdown()?;

    let engine = StorageEngine::open(test_config(&dir, 4))?;
    assert_eq!(engine.table_names(), vec!["items".to_string(), "orders".to_string()]);
    assert_eq!(engine.table("items")?.record_size(), 128);

    let rows = engine.txn_manager().run(|txn| engine.scan_table(txn, "orders"))?;
    assert_eq!(rows.len(), 100);
    for ((rid, record), (expected_rid, value)) in rows.iter().zip(rids.iter().zip(0u64..)) {
        assert_eq!(rid, expected_rid);
        assert_eq!(record_number(record), value);
    }
    engine.shutdown()?;
    Ok(())
}

#[test]
fn test_drop_table_removes_file() -> Result<()> {
    let (engine, _dir) = create_test_engine(4)?;
    engine.create_table("scratch", 8)?;
    let path = engine.config().table_path("scratch");
    assert!(path.exists());

    engine.drop_table("scratch")?;
    assert!(!path.exists());
    assert!(engine.table_names().is_empty());
    assert!(matches!(
        engine.table("scratch"),
        Err(EngineError::CatalogError(CatalogError::TableNotFound(_)))
    ));

    // The name can be reused afterwards
    engine.create_table("scratch", 16)?;
    assert_eq!(engine.table("scratch")?.record_size(), 16);
    engine.shutdown()?;
    Ok(())
}

#[test]
fn test_locked_table_cannot_be_closed_or_dropped() -> Result<()> {
    let (engine, _dir) = create_test_engine(4)?;
    let table = engine.create_table("t", 8)?;
    let txn_manager = engine.txn_manager();

    let mut txn = txn_manager.begin(None)?;
    let rid = engine.insert_record(&mut txn, "t", b"pending!")?;

    assert!(matches!(
        engine.drop_table("t"),
        Err(EngineError::CatalogError(CatalogError::TableInUse(_)))
    ));
    assert!(matches!(
        engine.close_table("t"),
        Err(EngineError::CatalogError(CatalogError::TableInUse(_)))
    ));
    assert!(engine.config().table_path("t").exists());

    // The table is still open, so the insert can be undone
    txn_manager.abort(txn)?;
    assert!(!table.is_record(&rid)?);

    engine.drop_table("t")?;
    assert!(!engine.config().table_path("t").exists());
    engine.shutdown()?;
    Ok(())
}

#[test]
fn test_close_and_reopen_table() -> Result<()> {
    let (engine, _dir) = create_test_engine(4)?;
    engine.create_table("t", 8)?;
    let rid = engine
        .txn_manager()
        .run(|txn| engine.insert_record(txn, "t", b"12345678"))?;

    engine.close_table("t")?;
    assert!(engine.table("t").is_err());
    assert!(engine.config().table_path("t").exists());

    let handle = engine.open_table("t")?;
    assert_eq!(handle.get_record(&rid)?, b"12345678");
    engine.shutdown()?;
    Ok(())
}

#[test]
fn test_disabled_logging_writes_no_log() -> Result<()> {
    let dir = TempDir::new()?;
    let config = EngineConfig {
        enable_logging: false,
        ..test_config(&dir, 4)
    };
    let log_path = config.log_path();

    let engine = StorageEngine::open(config)?;
    assert!(engine.log_manager().is_none());
    engine.create_table("t", 8)?;
    engine
        .txn_manager()
        .run(|txn| engine.insert_record(txn, "t", b"abcdefgh"))?;
    engine.shutdown()?;

    assert!(!log_path.exists());
    Ok(())
}

#[test]
fn test_log_sequence_resumes_after_restart() -> Result<()> {
    let dir = TempDir::new()?;

    let engine = StorageEngine::open(test_config(&dir, 4))?;
    engine.create_table("t", 8)?;
    engine
        .txn_manager()
        .run(|txn| engine.insert_record(txn, "t", b"abcdefgh"))?;
    let next_lsn = engine.log_manager().expect("logging is enabled").next_lsn();
    engine.shutdown()?;

    let engine = StorageEngine::open(test_config(&dir, 4))?;
    let log_manager = engine.log_manager().expect("logging is enabled");
    assert_eq!(log_manager.next_lsn(), next_lsn);
    assert_eq!(log_manager.persistent_lsn(), Some(next_lsn - 1));

    let txn = engine.txn_manager().begin(None)?;
    engine.txn_manager().commit(txn)?;

    let records = log_manager.read_log_records()?;
    assert_eq!(records.len(), 4);
    assert_eq!(records[2].lsn, next_lsn);
    assert_eq!(records[3].record_type, LogRecordType::Commit);
    engine.shutdown()?;
    Ok(())
}

#[test]
fn test_failed_closure_rolls_back() -> Result<()> {
    let (engine, _dir) = create_test_engine(4)?;
    let table = engine.create_table("t", 8)?;

    let outcome = engine.txn_manager().run(|txn| -> Result<(), EngineError> {
        engine.insert_record(txn, "t", b"aaaaaaaa")?;
        engine.insert_record(txn, "t", b"too short")?;
        Ok(())
    });
    assert!(matches!(outcome, Err(EngineError::TransactionError(_))));
    assert_eq!(table.scan()?.count(), 0);
    assert!(engine.txn_manager().active_transaction_ids().is_empty());
    engine.shutdown()?;
    Ok(())
}
