use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by the page-session transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("session lost: {0}")]
    SessionLost(String),

    #[error("page unresponsive: {0}")]
    Unresponsive(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("browser error: {0}")]
    Browser(String),
}

impl TransportError {
    /// The session behind this error cannot be reused and must be recreated.
    pub fn requires_new_session(&self) -> bool {
        matches!(self, TransportError::SessionLost(_) | TransportError::Unresponsive(_))
    }
}

/// Errors that escape the session manager or the pagination walk. All of
/// them are fatal for the current query only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrawlError {
    #[error("action failed after {attempts} attempts: {last}")]
    SessionExhausted { attempts: u32, last: TransportError },

    #[error("session recovery failed after {attempts} attempts: {last}")]
    RecoveryFailed { attempts: u32, last: TransportError },

    /// The session was recreated mid-walk, so the search it was showing is gone.
    #[error("session was replaced while on result page {page}")]
    SessionReplaced { page: u32 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to write CSV record: {0}")]
    Csv(#[from] csv::Error),

    #[error("Output IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Input file {0} does not exist")]
    NotFound(PathBuf),

    #[error("Could not read input file: {0}")]
    Io(#[from] io::Error),

    #[error("Could not parse CSV input: {0}")]
    Csv(#[from] csv::Error),

    #[error("Could not open Excel file: {0}")]
    Excel(String),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Could not read extract directory: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to write extract CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Could not extract text from PDF: {0}")]
    Pdf(String),
}
