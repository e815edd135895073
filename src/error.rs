use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::bootstrap::Phase;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config file was detected and one could not be created: {0}")]
    NotFound(String),

    #[error("permission denied while accessing the config file: {0}")]
    PermissionDenied(String),

    #[error("storage too busy to access the config file: {0}")]
    Busy(String),

    #[error("os error while handling the config file: {0}")]
    Os(String),
}

impl ConfigError {
    /// Categorizes a raw I/O failure against the config file.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        let detail = format!("{}: {}", path.display(), err);
        match err.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound(detail),
            io::ErrorKind::PermissionDenied => ConfigError::PermissionDenied(detail),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ConfigError::Busy(detail),
            _ => ConfigError::Os(detail),
        }
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no network interface detected: {0}")]
    NoInterface(io::Error),

    #[error("announcement socket error: {0}")]
    Socket(io::Error),
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("service probe command unavailable: {0}")]
    CommandUnavailable(String),

    #[error("unexpected service probe output: {0}")]
    UnexpectedOutput(String),
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("service start command unavailable: {0}")]
    CommandUnavailable(String),

    #[error("permission denied while starting the service: {0}")]
    PermissionDenied(String),

    #[error("unexpected service start output: {0}")]
    UnexpectedOutput(String),
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("phase {phase} did not complete within {timeout:?}")]
    PhaseTimeout { phase: Phase, timeout: Duration },

    #[error("phase {phase} was interrupted before completion")]
    PhaseInterrupted { phase: Phase },

    #[error("failed to bring up the broker service: {0}")]
    Start(#[from] StartError),

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
}
