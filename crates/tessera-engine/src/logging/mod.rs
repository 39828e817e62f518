//! Logging setup.
//!
//! The crate logs through the `log` facade only. Applications that do not
//! bring their own logger can install `env_logger` with [`init_logging`].

mod init;

pub use init::{init_logging, LoggingConfig};
