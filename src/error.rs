//! Error kinds raised by `FtpClient`
//!
//! Each variant belongs to one operation family and carries the operands of
//! the failing call, so a message is diagnosable without a protocol trace.
//! The underlying transport error is kept as the `source`.

use std::path::PathBuf;
use thiserror::Error;

use crate::protocols::{DataChannelMode, FtpError};

#[derive(Debug, Error)]
pub enum ClientError {
    /// Control connection could not be established
    #[error("connection failed to '{host}:{port}': {source}")]
    Connection {
        host: String,
        port: u16,
        source: FtpError,
    },

    /// Server rejected the credentials
    #[error("authentication failed with username '{username}': {source}")]
    Login { username: String, source: FtpError },

    /// CWD or CDUP was refused
    #[error("change directory to '{path}' failed: {source}")]
    ChangeDirectory { path: String, source: FtpError },

    /// Passive/active switch was refused
    #[error("change mode to '{mode}' failed: {source}")]
    ModeChange {
        mode: DataChannelMode,
        source: FtpError,
    },

    /// PWD could not be answered
    #[error("working directory query failed: {source}")]
    WorkingDirectoryQuery { source: FtpError },

    /// NLST failed; only reported by `try_list_names`
    #[error("listing '{directory}' failed: {source}")]
    List { directory: String, source: FtpError },

    #[error("change mode '{mode:o}' for '{filename}' failed: {source}")]
    FileModeChange {
        mode: u32,
        filename: String,
        source: FtpError,
    },

    #[error("downloading file '{remote}' to '{}' failed: {source}", .local.display())]
    Download {
        remote: String,
        local: PathBuf,
        source: FtpError,
    },

    #[error("uploading file '{}' to '{remote}' failed: {source}", .local.display())]
    Upload {
        local: PathBuf,
        remote: String,
        source: FtpError,
    },

    #[error("delete file '{path}' failed: {source}")]
    Delete { path: String, source: FtpError },
}

impl ClientError {
    /// Returns the transport error behind this failure
    pub fn transport_error(&self) -> &FtpError {
        match self {
            ClientError::Connection { source, .. }
            | ClientError::Login { source, .. }
            | ClientError::ChangeDirectory { source, .. }
            | ClientError::ModeChange { source, .. }
            | ClientError::WorkingDirectoryQuery { source }
            | ClientError::List { source, .. }
            | ClientError::FileModeChange { source, .. }
            | ClientError::Download { source, .. }
            | ClientError::Upload { source, .. }
            | ClientError::Delete { source, .. } => source,
        }
    }
}
