use secrecy::SecretString;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Error, ErrorKind};
use std::time::Duration;

/// Conventional FTP control port
pub const DEFAULT_PORT: u16 = 21;

/// Default bound for connecting and for every control-channel round trip
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

/// Username and password for one server
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    /// Redacted in `Debug` output and zeroised on drop
    pub password: SecretString,
}

/// FTP connection profile
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    /// Server hostname or IP address (JSON field: host)
    pub host: String,
    /// Control port (JSON field: port, default 21)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Timeout in seconds (JSON field: timeout, default 90)
    #[serde(rename = "timeout", default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Optional login performed right after connecting (JSON field: credentials)
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

impl ConnectionConfig {
    /// Profile for `host` with the default port and timeout and no login
    pub fn new(host: impl Into<String>) -> Self {
        ConnectionConfig {
            host: host.into(),
            port: DEFAULT_PORT,
            timeout_secs: default_timeout_secs(),
            credentials: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Checks the constraints a connection attempt relies on
    pub fn validate(&self) -> Result<(), Error> {
        validate_endpoint(&self.host, self.port, self.timeout())
    }
}

/// Rejects an empty host, port 0 and a zero timeout
pub fn validate_endpoint(host: &str, port: u16, timeout: Duration) -> Result<(), Error> {
    if host.trim().is_empty() {
        return Err(Error::new(ErrorKind::InvalidInput, "host must not be empty"));
    }
    if port == 0 {
        return Err(Error::new(ErrorKind::InvalidInput, "port must be in 1..=65535"));
    }
    if timeout.is_zero() {
        return Err(Error::new(ErrorKind::InvalidInput, "timeout must be positive"));
    }
    Ok(())
}

/// Parses a configuration file into a vector of connection profiles
///
/// # Arguments
/// * `filename` - Path to configuration file
///
/// # Errors
/// - File not found or unreadable
/// - Invalid JSON format or missing `host`
/// - A profile that fails `ConnectionConfig::validate`
///
/// # File Format
/// JSONL format - one JSON object per line with fields:
/// host, port, timeout, credentials { username, password }.
/// Empty lines and lines starting with `#` are skipped.
///
/// # Example
/// ```text
/// // let profiles = parse_config("servers.jsonl")?;
/// ```
pub fn parse_config(filename: &str) -> Result<Vec<ConnectionConfig>, Error> {
    let file = File::open(filename)?;
    let reader = BufReader::new(file);

    let mut configs = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let config: ConnectionConfig = serde_json::from_str(line).map_err(|e| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("invalid JSON on line {}: {}", line_num + 1, e),
            )
        })?;

        config.validate().map_err(|e| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("invalid profile on line {}: {}", line_num + 1, e),
            )
        })?;

        configs.push(config);
    }

    Ok(configs)
}
