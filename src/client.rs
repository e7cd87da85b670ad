//! The FTP client
//!
//! `FtpClient` owns one control connection for its whole life. Construction
//! either yields a connected client or a `ClientError::Connection`; dropping
//! the client quits the session. Operations that mutate server state return
//! `&mut Self` so calls chain with `?` and stop at the first failure:
//!
//! ```no_run
//! use std::time::Duration;
//! use ftpclient::FtpClient;
//!
//! # fn run() -> Result<(), ftpclient::ClientError> {
//! let mut client = FtpClient::connect("ftp.example.com", 21, Duration::from_secs(30))?;
//! client
//!     .login("anonymous", "guest@example.com")?
//!     .set_passive(true)?
//!     .change_directory("/pub")?
//!     .download("/tmp/README", "README")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use secrecy::ExposeSecret;

use crate::config::{validate_endpoint, ConnectionConfig, Credentials};
use crate::error::ClientError;
use crate::protocols::{
    DataChannelMode, FtpError, FtpTransport, SuppaTransport, TransferOptions,
};

/// Directory listed by `list_names` when the caller means "here"
pub const CURRENT_DIRECTORY: &str = ".";

/// Path reported by `ChangeDirectory` errors raised from `change_directory_up`
pub const PARENT_DIRECTORY: &str = "..";

/// FTP client bound to a single server connection
///
/// Holds no session state of its own: working directory, transfer type and
/// login state live on the server and every query is a round trip. A client
/// is meant for sequential use; use one client per thread for concurrency.
pub struct FtpClient<T: FtpTransport = SuppaTransport> {
    transport: T,
    host: String,
    port: u16,
}

impl FtpClient {
    /// Opens a control connection to `host:port`
    ///
    /// `timeout` bounds the TCP connect, the greeting and every later
    /// control-channel read or write.
    ///
    /// # Errors
    /// `ClientError::Connection` if a parameter is invalid, the host cannot
    /// be resolved or reached, or no greeting arrives in time.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, ClientError> {
        Self::connect_transport(host, port, timeout)
    }

    /// Connects using a profile and logs in when it carries credentials
    ///
    /// If the login is refused the fresh connection is closed before the
    /// `ClientError::Login` is returned.
    pub fn connect_with_config(config: &ConnectionConfig) -> Result<Self, ClientError> {
        let mut client = Self::connect(&config.host, config.port, config.timeout())?;
        if let Some(credentials) = &config.credentials {
            client.login_with(credentials)?;
        }
        Ok(client)
    }
}

impl<T: FtpTransport> FtpClient<T> {
    /// Opens a control connection through the transport `T`
    pub fn connect_transport(host: &str, port: u16, timeout: Duration) -> Result<Self, ClientError> {
        let connection_error = |source: FtpError| ClientError::Connection {
            host: host.to_string(),
            port,
            source,
        };

        validate_endpoint(host, port, timeout)
            .map_err(|e| connection_error(FtpError::ConnectionError(e)))?;
        let transport = T::connect(host, port, timeout).map_err(connection_error)?;

        log::info!("Connected to {}:{}", host, port);
        Ok(Self::from_transport(transport, host, port))
    }

    /// Wraps an already connected transport
    ///
    /// The client takes ownership and quits the transport when dropped.
    pub fn from_transport(transport: T, host: &str, port: u16) -> Self {
        FtpClient {
            transport,
            host: host.to_string(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Authenticates the session
    ///
    /// A refused login leaves the connection open, so it can be retried.
    pub fn login(&mut self, username: &str, password: &str) -> Result<&mut Self, ClientError> {
        log::debug!("Logging in to {}:{} as '{}'", self.host, self.port, username);
        self.transport
            .login(username, password)
            .map_err(|source| ClientError::Login {
                username: username.to_string(),
                source,
            })?;
        Ok(self)
    }

    /// `login` with credentials from a connection profile
    pub fn login_with(&mut self, credentials: &Credentials) -> Result<&mut Self, ClientError> {
        self.login(&credentials.username, credentials.password.expose_secret())
    }

    /// Moves to the parent of the remote working directory
    pub fn change_directory_up(&mut self) -> Result<&mut Self, ClientError> {
        log::debug!("Changing to parent directory");
        self.transport
            .cdup()
            .map_err(|source| ClientError::ChangeDirectory {
                path: PARENT_DIRECTORY.to_string(),
                source,
            })?;
        Ok(self)
    }

    /// Selects passive (`true`) or active (`false`) data channels
    pub fn set_passive(&mut self, passive: bool) -> Result<&mut Self, ClientError> {
        let mode = DataChannelMode::from_passive(passive);
        log::debug!("Switching data channel mode to {}", mode);
        self.transport
            .set_mode(mode)
            .map_err(|source| ClientError::ModeChange { mode, source })?;
        Ok(self)
    }

    /// Sets the remote working directory
    pub fn change_directory(&mut self, path: &str) -> Result<&mut Self, ClientError> {
        log::debug!("Changing directory to '{}'", path);
        self.transport
            .cwd(path)
            .map_err(|source| ClientError::ChangeDirectory {
                path: path.to_string(),
                source,
            })?;
        Ok(self)
    }

    /// Asks the server for the remote working directory
    pub fn working_directory(&mut self) -> Result<String, ClientError> {
        self.transport
            .pwd()
            .map_err(|source| ClientError::WorkingDirectoryQuery { source })
    }

    /// Lists entry names under `directory` in the order the server sends them
    ///
    /// A refused or failed listing yields an empty vector, exactly like an
    /// empty directory. Use `try_list_names` to tell the two apart.
    pub fn list_names(&mut self, directory: &str) -> Vec<String> {
        match self.try_list_names(directory) {
            Ok(names) => names,
            Err(e) => {
                log::warn!("{}; treating as empty", e);
                Vec::new()
            }
        }
    }

    /// Lists entry names under `directory`, reporting listing failures
    pub fn try_list_names(&mut self, directory: &str) -> Result<Vec<String>, ClientError> {
        log::debug!("Listing '{}'", directory);
        self.transport
            .nlst(directory)
            .map_err(|source| ClientError::List {
                directory: directory.to_string(),
                source,
            })
    }

    /// Changes the permission bits of `filename` to `mode` (e.g. `0o644`)
    ///
    /// Returns the server's acknowledgment text.
    pub fn change_file_mode(&mut self, mode: u32, filename: &str) -> Result<String, ClientError> {
        log::debug!("Changing mode of '{}' to {:o}", filename, mode);
        self.transport
            .chmod(mode, filename)
            .map_err(|source| ClientError::FileModeChange {
                mode,
                filename: filename.to_string(),
                source,
            })
    }

    /// Downloads `remote_path` to `local_path` as a whole binary file
    pub fn download<P: AsRef<Path>>(
        &mut self,
        local_path: P,
        remote_path: &str,
    ) -> Result<&mut Self, ClientError> {
        self.download_with(local_path, remote_path, TransferOptions::download())
    }

    /// Downloads `remote_path` to `local_path` with an explicit type and
    /// resume offset
    ///
    /// With a non-zero offset the local file keeps its first `offset` bytes
    /// and the rest of the remote file is written after them.
    pub fn download_with<P: AsRef<Path>>(
        &mut self,
        local_path: P,
        remote_path: &str,
        options: TransferOptions,
    ) -> Result<&mut Self, ClientError> {
        let local = local_path.as_ref();
        log::debug!(
            "Downloading '{}' to '{}' ({:?}, offset {})",
            remote_path,
            local.display(),
            options.transfer_type,
            options.offset
        );
        let bytes = self
            .transport
            .get(local, remote_path, options.transfer_type, options.offset)
            .map_err(|source| ClientError::Download {
                remote: remote_path.to_string(),
                local: local.to_path_buf(),
                source,
            })?;
        log::debug!("Downloaded {} bytes of '{}'", bytes, remote_path);
        Ok(self)
    }

    /// Uploads `local_path` to `remote_path` as a whole binary file
    pub fn upload<P: AsRef<Path>>(
        &mut self,
        remote_path: &str,
        local_path: P,
    ) -> Result<&mut Self, ClientError> {
        self.upload_with(remote_path, local_path, TransferOptions::upload())
    }

    /// Uploads `local_path` to `remote_path` with an explicit type and start
    /// offset
    pub fn upload_with<P: AsRef<Path>>(
        &mut self,
        remote_path: &str,
        local_path: P,
        options: TransferOptions,
    ) -> Result<&mut Self, ClientError> {
        let local = local_path.as_ref();
        log::debug!(
            "Uploading '{}' to '{}' ({:?}, offset {})",
            local.display(),
            remote_path,
            options.transfer_type,
            options.offset
        );
        let bytes = self
            .transport
            .put(remote_path, local, options.transfer_type, options.offset)
            .map_err(|source| ClientError::Upload {
                local: local.to_path_buf(),
                remote: remote_path.to_string(),
                source,
            })?;
        log::debug!("Uploaded {} bytes to '{}'", bytes, remote_path);
        Ok(self)
    }

    /// Removes the remote file at `path`
    pub fn delete(&mut self, path: &str) -> Result<&mut Self, ClientError> {
        log::debug!("Deleting '{}'", path);
        self.transport
            .rm(path)
            .map_err(|source| ClientError::Delete {
                path: path.to_string(),
                source,
            })?;
        Ok(self)
    }

    /// Closes the connection now instead of at the end of the scope
    ///
    /// Never fails; see `Drop`.
    pub fn close(self) {
        drop(self);
    }
}

impl<T: FtpTransport> Drop for FtpClient<T> {
    fn drop(&mut self) {
        match self.transport.quit() {
            Ok(()) => log::info!("Closed connection to {}:{}", self.host, self.port),
            Err(e) => log::debug!(
                "Connection to {}:{} closed without QUIT acknowledgment: {}",
                self.host,
                self.port,
                e
            ),
        }
    }
}
