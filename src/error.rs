//! Centralized error types for rstunpack.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the rstunpack library.
#[derive(Error, Debug)]
pub enum UnpackError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The result file is structurally invalid (bad header, bad section address, truncation).
    #[error("Invalid result file: {0}")]
    InvalidResult(String),

    /// The util-data file is structurally invalid.
    #[error("Invalid util data: {0}")]
    InvalidUtilData(String),

    /// A section declares a size that cannot be held in memory on this platform.
    #[error("Section '{section}' declares {size} bytes, which is too large")]
    SectionTooLarge { section: &'static str, size: u64 },
}

/// Convenience alias for `Result<T, UnpackError>`.
pub type Result<T> = std::result::Result<T, UnpackError>;

impl UnpackError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for structural problems in the scanned data (as opposed to I/O failures).
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidResult(_) | Self::InvalidUtilData(_) | Self::SectionTooLarge { .. }
        )
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (scanners working on an already-open stream).
impl From<std::io::Error> for UnpackError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<stream>"),
            source,
        }
    }
}
