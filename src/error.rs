//! Errors that can occur while building, reading or combining
//! acquisition and image containers.

use thiserror::Error;

/// Shorthand for results carrying an [`MrError`].
pub type MrResult<T> = Result<T, MrError>;

/// Errors from the storage layer (the `Io` and `Format` variants),
/// from the values handed to an operation (mismatched shapes, unknown
/// names), or from an external reconstruction step (`Setup`).
#[derive(Error, Debug)]
pub enum MrError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("dimension mismatch (expected {expected}, found {found})")]
    DimensionMismatch { expected: String, found: String },
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed data: {0}")]
    Format(String),
    #[error("JSON header or configuration could not be parsed: {0}")]
    Header(#[from] serde_json::Error),
    #[error("setup failed: {0}")]
    Setup(String),
    #[error("storage lock poisoned by a panicking thread")]
    LockPoisoned,
}

impl MrError {
    /// Builds a `DimensionMismatch` from anything printable.
    pub fn mismatch(expected: impl std::fmt::Display, found: impl std::fmt::Display) -> Self {
        MrError::DimensionMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

impl From<binrw::Error> for MrError {
    fn from(err: binrw::Error) -> Self {
        match err {
            binrw::Error::Io(io) => MrError::Io(io),
            other => MrError::Format(other.to_string()),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for MrError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        MrError::LockPoisoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binrw_io_errors_stay_io() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: MrError = binrw::Error::Io(io).into();
        assert!(matches!(err, MrError::Io(_)));
    }

    #[test]
    fn mismatch_formats_both_sides() {
        let err = MrError::mismatch("16 x 8", "12 x 8");
        assert_eq!(
            err.to_string(),
            "dimension mismatch (expected 16 x 8, found 12 x 8)"
        );
    }
}
