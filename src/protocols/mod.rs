//! Transport seam between `FtpClient` and an FTP engine
//!
//! The client is defined purely in terms of the primitives listed by the
//! `FtpTransport` trait. `SuppaTransport` implements them over a
//! `suppaftp::FtpStream`; tests substitute an in-memory transport.

pub mod ftp;

#[cfg(test)]
pub(crate) mod scripted;

pub use ftp::SuppaTransport;

use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Error type for protocol operations
pub type FtpError = suppaftp::FtpError;

/// Result type for protocol operations
pub type FtpResult<T> = Result<T, FtpError>;

/// Primitives an FTP engine must provide to back an `FtpClient`
///
/// Every method is a blocking round trip to the server. Implementations
/// must not retry and must not cache server-side session state.
pub trait FtpTransport {
    /// Open a control connection and read the server greeting
    ///
    /// # Arguments
    /// * `host` - Server hostname or IP address
    /// * `port` - Server port number
    /// * `timeout` - Bound for the connect and for every control read/write
    fn connect(host: &str, port: u16, timeout: Duration) -> FtpResult<Self>
    where
        Self: Sized;

    /// Authenticate with username and password
    fn login(&mut self, user: &str, password: &str) -> FtpResult<()>;

    /// Move to the parent of the working directory (CDUP)
    fn cdup(&mut self) -> FtpResult<()>;

    /// Select how data channels are opened for later transfers
    fn set_mode(&mut self, mode: DataChannelMode) -> FtpResult<()>;

    /// Change working directory
    fn cwd(&mut self, path: &str) -> FtpResult<()>;

    /// Query the working directory (PWD)
    fn pwd(&mut self) -> FtpResult<String>;

    /// Get list of names in directory (NLST command)
    fn nlst(&mut self, path: &str) -> FtpResult<Vec<String>>;

    /// Change permission bits of a remote file, returning the server reply text
    fn chmod(&mut self, mode: u32, filename: &str) -> FtpResult<String>;

    /// Retrieve `remote` into the local file `local`, starting at `offset`
    ///
    /// Returns the number of bytes written locally.
    fn get(
        &mut self,
        local: &Path,
        remote: &str,
        transfer_type: TransferType,
        offset: u64,
    ) -> FtpResult<u64>;

    /// Store the local file `local` as `remote`, starting at `offset`
    ///
    /// Returns the number of bytes sent.
    fn put(
        &mut self,
        remote: &str,
        local: &Path,
        transfer_type: TransferType,
        offset: u64,
    ) -> FtpResult<u64>;

    /// Remove/delete a file
    fn rm(&mut self, path: &str) -> FtpResult<()>;

    /// Quit/disconnect from the server
    fn quit(&mut self) -> FtpResult<()>;
}

/// Transfer type for file operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    /// Binary (image) mode, bytes pass through unchanged
    Binary,
    /// ASCII/text mode (with line ending conversion on the server side)
    Ascii,
}

impl From<TransferType> for suppaftp::types::FileType {
    fn from(transfer_type: TransferType) -> Self {
        match transfer_type {
            TransferType::Binary => suppaftp::types::FileType::Binary,
            TransferType::Ascii => {
                suppaftp::types::FileType::Ascii(suppaftp::types::FormatControl::NonPrint)
            }
        }
    }
}

/// Transfer type used by downloads unless the caller picks another
pub const DEFAULT_DOWNLOAD_TYPE: TransferType = TransferType::Binary;

/// Transfer type used by uploads unless the caller picks another
pub const DEFAULT_UPLOAD_TYPE: TransferType = TransferType::Binary;

/// Which side opens the data channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataChannelMode {
    /// Server listens, client connects (PASV)
    Passive,
    /// Client listens, server connects (PORT)
    Active,
}

impl DataChannelMode {
    pub fn from_passive(passive: bool) -> Self {
        if passive {
            DataChannelMode::Passive
        } else {
            DataChannelMode::Active
        }
    }
}

impl fmt::Display for DataChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataChannelMode::Passive => f.write_str("PASSIVE"),
            DataChannelMode::Active => f.write_str("ACTIVE"),
        }
    }
}

/// Per-transfer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    pub transfer_type: TransferType,
    /// Byte position to resume from; 0 transfers the whole file
    pub offset: u64,
}

impl TransferOptions {
    /// Whole-file download with `DEFAULT_DOWNLOAD_TYPE`
    pub fn download() -> Self {
        TransferOptions {
            transfer_type: DEFAULT_DOWNLOAD_TYPE,
            offset: 0,
        }
    }

    /// Whole-file upload with `DEFAULT_UPLOAD_TYPE`
    pub fn upload() -> Self {
        TransferOptions {
            transfer_type: DEFAULT_UPLOAD_TYPE,
            offset: 0,
        }
    }

    pub fn with_type(mut self, transfer_type: TransferType) -> Self {
        self.transfer_type = transfer_type;
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}

/// Local destination of a download
///
/// A whole-file download is written to `.<name>.tmp~` next to the target and
/// renamed over it by `commit`, so a failed transfer leaves an existing file
/// untouched. A resumed download writes into the target from `offset`;
/// `discard` cuts it back to the bytes it held below the offset, or removes
/// it when the download created it.
pub(crate) struct DownloadTarget {
    file: File,
    target: PathBuf,
    kind: TargetKind,
}

enum TargetKind {
    Staged { staged: PathBuf },
    Resumed { restore_len: Option<u64> },
}

impl DownloadTarget {
    pub fn open(path: &Path, offset: u64) -> io::Result<Self> {
        if offset == 0 {
            let staged = staged_path(path)?;
            let file = File::create(&staged)?;
            return Ok(DownloadTarget {
                file,
                target: path.to_path_buf(),
                kind: TargetKind::Staged { staged },
            });
        }

        let restore_len = match fs::metadata(path) {
            Ok(meta) => Some(meta.len().min(offset)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(DownloadTarget {
            file,
            target: path.to_path_buf(),
            kind: TargetKind::Resumed { restore_len },
        })
    }

    pub fn file(&mut self) -> &mut File {
        &mut self.file
    }

    /// Makes the received bytes visible at the target path
    pub fn commit(self) -> io::Result<()> {
        let DownloadTarget { file, target, kind } = self;
        file.sync_all()?;
        drop(file);
        match kind {
            TargetKind::Staged { staged } => fs::rename(&staged, &target).map_err(|e| {
                let _ = fs::remove_file(&staged);
                e
            }),
            TargetKind::Resumed { .. } => Ok(()),
        }
    }

    /// Undoes every local change made for a failed download
    pub fn discard(self) -> io::Result<()> {
        let DownloadTarget { file, target, kind } = self;
        match kind {
            TargetKind::Staged { staged } => {
                drop(file);
                fs::remove_file(staged)
            }
            TargetKind::Resumed {
                restore_len: Some(len),
            } => file.set_len(len),
            TargetKind::Resumed { restore_len: None } => {
                drop(file);
                fs::remove_file(target)
            }
        }
    }
}

fn staged_path(path: &Path) -> io::Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{}' does not name a file", path.display()),
        )
    })?;
    let mut staged_name = OsString::from(".");
    staged_name.push(name);
    staged_name.push(".tmp~");
    Ok(path.with_file_name(staged_name))
}

/// Opens the local source of an upload positioned at `offset`
pub(crate) fn open_upload_source(path: &Path, offset: u64) -> io::Result<File> {
    let mut file = File::open(path)?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset))?;
    }
    Ok(file)
}

/// Converts a resume offset into the width the REST command takes
pub(crate) fn rest_offset(offset: u64) -> FtpResult<usize> {
    usize::try_from(offset).map_err(|e| {
        FtpError::ConnectionError(io::Error::new(io::ErrorKind::InvalidInput, e))
    })
}
