// QuarryDB common definitions shared by every layer

pub mod config;
pub mod types;

pub use config::EngineConfig;
