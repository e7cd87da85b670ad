//! Blocking FTP client library
//!
//! One `FtpClient` owns one control connection. Construction is fallible
//! and fails fast, dropping the client quits the session, and every
//! operation maps a server refusal to its own `ClientError` variant.
//! The wire protocol is handled by `suppaftp`.

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod protocols;

pub use client::{FtpClient, CURRENT_DIRECTORY, PARENT_DIRECTORY};
pub use config::{parse_config, ConnectionConfig, Credentials, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use error::ClientError;
pub use logging::{init_logging, set_log_file};
pub use protocols::{
    DataChannelMode, FtpError, FtpTransport, SuppaTransport, TransferOptions, TransferType,
    DEFAULT_DOWNLOAD_TYPE, DEFAULT_UPLOAD_TYPE,
};

/// Name of the library (from Cargo.toml)
pub const PROGRAM_NAME: &str = env!("CARGO_PKG_NAME");

/// Current version of the library (from Cargo.toml)
pub const PROGRAM_VERSION: &str = env!("CARGO_PKG_VERSION");
