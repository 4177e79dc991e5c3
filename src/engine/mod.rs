pub mod error;
pub mod storage_engine;

pub use error::EngineError;
pub use storage_engine::StorageEngine;
