//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod import_file;
pub mod memory_cache_adapter;
#[cfg(feature = "redis")]
pub mod redis_cache_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
