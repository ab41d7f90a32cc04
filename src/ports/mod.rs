//! Port traits the domain depends on; adapters implement them.

pub mod bar_port;
pub mod cache_port;
pub mod config_port;
