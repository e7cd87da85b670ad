//! Plain FTP transport implementation
//!
//! This module provides `SuppaTransport`, which implements the `FtpTransport`
//! trait for standard (unencrypted) FTP connections on top of
//! `suppaftp::FtpStream`.

use std::fs::File;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use suppaftp::{FtpStream, Mode, Status};

use crate::protocols::{
    open_upload_source, rest_offset, DataChannelMode, DownloadTarget, FtpError, FtpResult,
    FtpTransport, TransferType,
};

/// FTP transport over a single plain control connection
pub struct SuppaTransport {
    stream: FtpStream,
}

impl SuppaTransport {
    /// Returns the greeting the server sent on connect, if any
    pub fn welcome_message(&self) -> Option<&str> {
        self.stream.get_welcome_msg()
    }

    fn receive(&mut self, remote: &str, offset: u64, file: &mut File) -> FtpResult<u64> {
        if offset > 0 {
            self.stream.resume_transfer(rest_offset(offset)?)?;
        }
        self.stream.retr(remote, |reader| {
            io::copy(reader, &mut *file).map_err(FtpError::ConnectionError)
        })
    }
}

/// Connects a socket whose connect, reads and writes are all bounded by
/// `timeout`
fn connect_bounded(addr: SocketAddr, timeout: Duration) -> FtpResult<TcpStream> {
    let tcp = TcpStream::connect_timeout(&addr, timeout).map_err(FtpError::ConnectionError)?;
    tcp.set_read_timeout(Some(timeout))
        .map_err(FtpError::ConnectionError)?;
    tcp.set_write_timeout(Some(timeout))
        .map_err(FtpError::ConnectionError)?;
    Ok(tcp)
}

/// Opens one control connection and reads the greeting
///
/// Passive data connections are built with the same bounds, and in active
/// mode the server gets `timeout` to connect back.
fn open_control(addr: SocketAddr, timeout: Duration) -> FtpResult<FtpStream> {
    let tcp = connect_bounded(addr, timeout)?;
    let mut stream = FtpStream::connect_with_stream(tcp)?
        .passive_stream_builder(move |data_addr| connect_bounded(data_addr, timeout))
        .active_mode(timeout);
    stream.set_mode(Mode::Passive);
    Ok(stream)
}

impl FtpTransport for SuppaTransport {
    fn connect(host: &str, port: u16, timeout: Duration) -> FtpResult<Self>
    where
        Self: Sized,
    {
        // Resolve host to all possible addresses
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(FtpError::ConnectionError)?
            .collect();

        if addrs.is_empty() {
            return Err(FtpError::ConnectionError(io::Error::new(
                io::ErrorKind::NotFound,
                "No addresses found",
            )));
        }

        // Try each address until one succeeds
        let mut last_error = None;
        for addr in addrs {
            match open_control(addr, timeout) {
                Ok(stream) => {
                    log::debug!("Control connection established with {}", addr);
                    return Ok(SuppaTransport { stream });
                }
                Err(e) => {
                    log::debug!("Connecting to {} failed: {}", addr, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            FtpError::ConnectionError(io::Error::new(
                io::ErrorKind::NotFound,
                "No addresses available",
            ))
        }))
    }

    fn login(&mut self, user: &str, password: &str) -> FtpResult<()> {
        self.stream.login(user, password)
    }

    fn cdup(&mut self) -> FtpResult<()> {
        self.stream.cdup()
    }

    fn set_mode(&mut self, mode: DataChannelMode) -> FtpResult<()> {
        match mode {
            DataChannelMode::Passive => {
                // The server must agree to open a passive listener; the
                // address it answers with is renegotiated per transfer.
                let _ = self.stream.custom_command("PASV", &[Status::PassiveMode])?;
                self.stream.set_mode(Mode::Passive);
            }
            DataChannelMode::Active => self.stream.set_mode(Mode::Active),
        }
        Ok(())
    }

    fn cwd(&mut self, path: &str) -> FtpResult<()> {
        self.stream.cwd(path)
    }

    fn pwd(&mut self) -> FtpResult<String> {
        self.stream.pwd()
    }

    fn nlst(&mut self, path: &str) -> FtpResult<Vec<String>> {
        self.stream.nlst(Some(path))
    }

    fn chmod(&mut self, mode: u32, filename: &str) -> FtpResult<String> {
        let response = self.stream.site(format!("CHMOD {:o} {}", mode, filename))?;
        let text = response.as_string().map_err(|_| FtpError::BadResponse)?;
        Ok(text.trim_end().to_string())
    }

    fn get(
        &mut self,
        local: &Path,
        remote: &str,
        transfer_type: TransferType,
        offset: u64,
    ) -> FtpResult<u64> {
        self.stream.transfer_type(transfer_type.into())?;
        let mut target = DownloadTarget::open(local, offset).map_err(FtpError::ConnectionError)?;
        match self.receive(remote, offset, target.file()) {
            Ok(received) => {
                target.commit().map_err(FtpError::ConnectionError)?;
                Ok(received)
            }
            Err(e) => {
                if let Err(cleanup) = target.discard() {
                    log::warn!(
                        "Could not clean up '{}' after failed download: {}",
                        local.display(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    fn put(
        &mut self,
        remote: &str,
        local: &Path,
        transfer_type: TransferType,
        offset: u64,
    ) -> FtpResult<u64> {
        let mut file = open_upload_source(local, offset).map_err(FtpError::ConnectionError)?;
        self.stream.transfer_type(transfer_type.into())?;
        if offset > 0 {
            self.stream.resume_transfer(rest_offset(offset)?)?;
        }
        self.stream.put_file(remote, &mut file)
    }

    fn rm(&mut self, path: &str) -> FtpResult<()> {
        self.stream.rm(path)
    }

    fn quit(&mut self) -> FtpResult<()> {
        self.stream.quit()
    }
}
