//! Error types for the user position and integrity engine.
//!
//! Recoverable conditions of the processing chain (too few satellites, PDOP
//! rejection, zero protection levels, truncated input) are *not* errors: they
//! are encoded in the output records. `UsrError` is reserved for genuine
//! failures such as unreadable files or an unusable configuration.

use thiserror::Error;

/// Errors raised by the `usrperf` library.
#[derive(Debug, Error)]
pub enum UsrError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("numerical failure: {0}")]
    Numerical(&'static str),

    #[error("invalid LOS record at SOD {sod}, user {user_id}, PRN {prn}: {reason}")]
    InvalidRecord {
        sod: u32,
        user_id: u32,
        prn: u32,
        reason: &'static str,
    },
}

/// Alias for `Result<T, UsrError>`.
pub type Result<T> = std::result::Result<T, UsrError>;
