#![allow(dead_code)]

use std::sync::Arc;
use anyhow::Result;
use tempfile::TempDir;
use quarrydb::common::types::Fd;
use quarrydb::storage::buffer::BufferPoolManager;
use quarrydb::storage::disk::DiskManager;
use quarrydb::storage::record::{RecordFileHandle, RecordManager};
use quarrydb::{EngineConfig, StorageEngine};

// Create a buffer pool over one freshly created, open file
pub fn create_test_buffer_pool(pool_size: usize) -> Result<(Arc<BufferPoolManager>, Fd, TempDir)> {
    let dir = TempDir::new()?;
    let disk = Arc::new(DiskManager::new(dir.path().join("test.log")));
    let path = dir.path().join("test.db");
    disk.create_file(&path)?;
    let fd = disk.open_file(&path)?;
    let buffer_pool = Arc::new(BufferPoolManager::new(pool_size, disk));
    Ok((buffer_pool, fd, dir))
}

// Create and open a record file of `record_size`-byte records
pub fn create_test_record_file(
    pool_size: usize,
    record_size: usize,
) -> Result<(RecordManager, RecordFileHandle, TempDir)> {
    let dir = TempDir::new()?;
    let disk = Arc::new(DiskManager::new(dir.path().join("test.log")));
    let buffer_pool = Arc::new(BufferPoolManager::new(pool_size, Arc::clone(&disk)));
    let record_manager = RecordManager::new(disk, buffer_pool);
    let path = dir.path().join("test.tbl");
    record_manager.create_file(&path, record_size)?;
    let handle = record_manager.open_file(&path)?;
    Ok((record_manager, handle, dir))
}

pub fn test_config(dir: &TempDir, pool_size: usize) -> EngineConfig {
    EngineConfig {
        buffer_pool_size: pool_size,
        ..EngineConfig::with_data_dir(dir.path().join("data"))
    }
}

// Open an engine in a fresh data directory
pub fn create_test_engine(pool_size: usize) -> Result<(StorageEngine, TempDir)> {
    let dir = TempDir::new()?;
    let engine = StorageEngine::open(test_config(&dir, pool_size))?;
    Ok((engine, dir))
}

// Generate test data of specified size
pub fn generate_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

// A record of `size` bytes starting with `value` in little-endian
pub fn numbered_record(value: u64, size: usize) -> Vec<u8> {
    let mut record = vec![0u8; size];
    record[..8].copy_from_slice(&value.to_le_bytes());
    record
}

pub fn record_number(record: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&record[..8]);
    u64::from_le_bytes(bytes)
}
