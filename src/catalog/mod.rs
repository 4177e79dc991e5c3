//! Catalog Module
//!
//! Maps table names to the record files that store them. Schemas, columns and
//! system tables live above this layer.

pub mod error;
pub mod registry;

pub use self::error::CatalogError;
pub use self::registry::TableRegistry;
