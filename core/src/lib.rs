//! Core utilities and shared types for the pgcsv transfer tools.

pub mod config;
pub mod naming;

pub use config::{ConfigError, ConnectionParams};
pub use naming::{file_stamp, stamped_table_name, TableRef};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
