//! Revision store error types
//!
//! Error codes:
//! - AERO_STORAGE_IO_ERROR (ERROR)
//! - AERO_STORAGE_WRITE_FAILED (ERROR)
//! - AERO_STORAGE_READ_FAILED (ERROR)
//! - AERO_DATA_CORRUPTION (FATAL)

use std::fmt;
use std::io;

use crate::observability::Severity;

/// Store error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// Disk I/O failure outside a read or write of revision data
    AeroStorageIoError,
    /// Persisting revision data failed
    AeroStorageWriteFailed,
    /// Loading revision data failed
    AeroStorageReadFailed,
    /// Persisted revision data failed checksum or decoding
    AeroDataCorruption,
}

impl StoreErrorCode {
    /// Stable string code
    pub fn code(&self) -> &'static str {
        match self {
            StoreErrorCode::AeroStorageIoError => "AERO_STORAGE_IO_ERROR",
            StoreErrorCode::AeroStorageWriteFailed => "AERO_STORAGE_WRITE_FAILED",
            StoreErrorCode::AeroStorageReadFailed => "AERO_STORAGE_READ_FAILED",
            StoreErrorCode::AeroDataCorruption => "AERO_DATA_CORRUPTION",
        }
    }

    /// Severity of this error class
    pub fn severity(&self) -> Severity {
        match self {
            StoreErrorCode::AeroDataCorruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Store error with code, message and optional context.
#[derive(Debug)]
pub struct StoreError {
    code: StoreErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl StoreError {
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::with_source(StoreErrorCode::AeroStorageIoError, message, source)
    }

    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::with_source(StoreErrorCode::AeroStorageWriteFailed, message, source)
    }

    /// Write failure with no underlying I/O error (e.g. an injected fault)
    pub fn write_failed_no_source(message: impl Into<String>) -> Self {
        Self {
            code: StoreErrorCode::AeroStorageWriteFailed,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    pub fn read_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::with_source(StoreErrorCode::AeroStorageReadFailed, message, source)
    }

    /// Corruption at a byte offset of a store file (FATAL)
    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self {
            code: StoreErrorCode::AeroDataCorruption,
            message: reason.into(),
            details: Some(format!("byte_offset: {}", offset)),
            source: None,
        }
    }

    fn with_source(code: StoreErrorCode, message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    pub fn code(&self) -> StoreErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// True if the store must not be used further
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
