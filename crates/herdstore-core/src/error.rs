//! Error types for herdstore.
//!
//! This module provides a unified error type for the farm and kv engines.
//! Error codes follow the pattern `HERD-XXX` for easy debugging.

use thiserror::Error;

/// Result type alias for herdstore operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in herdstore operations.
///
/// Each variant includes a descriptive error message suitable for end-users.
#[derive(Error, Debug)]
pub enum Error {
    /// No such VDI (HERD-001).
    #[error("[HERD-001] No VDI named '{0}'")]
    NoVdi(String),

    /// VDI already exists (HERD-002).
    #[error("[HERD-002] VDI '{0}' already exists")]
    VdiExists(String),

    /// No such object in the block store (HERD-003).
    #[error("[HERD-003] No object {0:#018x}")]
    NoObject(u64),

    /// Named object not found in a bucket (HERD-004).
    #[error("[HERD-004] Object '{object}' not found in bucket '{bucket}'")]
    ObjectNotFound {
        /// Bucket VDI name (`account/bucket`).
        bucket: String,
        /// Object name.
        object: String,
    },

    /// Address space exhausted (HERD-005).
    #[error("[HERD-005] No space left: {0}")]
    NoSpace(String),

    /// Snapshot not found in the snap log (HERD-006).
    #[error("[HERD-006] Snapshot (idx {idx}, tag '{tag}') not found")]
    SnapshotNotFound {
        /// Requested snapshot index.
        idx: u32,
        /// Requested snapshot tag.
        tag: String,
    },

    /// Invalid VDI, bucket, object or tag name (HERD-007).
    #[error("[HERD-007] Invalid name: {0}")]
    InvalidName(String),

    /// Operation not implemented (HERD-008).
    #[error("[HERD-008] Not implemented: {0}")]
    NotImplemented(&'static str),

    /// Corrupt on-disk data (HERD-009).
    ///
    /// Indicates a damaged slice, log or record that cannot be decoded.
    #[error("[HERD-009] Corrupt data: {0}")]
    Corrupt(String),

    /// IO error (HERD-010).
    #[error("[HERD-010] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (HERD-011).
    #[error("[HERD-011] Serialization error: {0}")]
    Serialization(String),

    /// Archive initialization error (HERD-012).
    #[error("[HERD-012] {0}")]
    Init(String),

    /// Operation aborted after a worker error (HERD-013).
    #[error("[HERD-013] Aborted: {0}")]
    Aborted(&'static str),

    /// Internal error (HERD-014).
    #[error("[HERD-014] Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the error code (e.g., "HERD-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoVdi(_) => "HERD-001",
            Self::VdiExists(_) => "HERD-002",
            Self::NoObject(_) => "HERD-003",
            Self::ObjectNotFound { .. } => "HERD-004",
            Self::NoSpace(_) => "HERD-005",
            Self::SnapshotNotFound { .. } => "HERD-006",
            Self::InvalidName(_) => "HERD-007",
            Self::NotImplemented(_) => "HERD-008",
            Self::Corrupt(_) => "HERD-009",
            Self::Io(_) => "HERD-010",
            Self::Serialization(_) => "HERD-011",
            Self::Init(_) => "HERD-012",
            Self::Aborted(_) => "HERD-013",
            Self::Internal(_) => "HERD-014",
        }
    }

    /// Returns true if this error means "the thing does not exist".
    ///
    /// Used by callers that treat absence as control flow rather than failure.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NoVdi(_)
                | Self::NoObject(_)
                | Self::ObjectNotFound { .. }
                | Self::SnapshotNotFound { .. }
        )
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(Error::NoVdi("a".into()).code(), "HERD-001");
        assert_eq!(Error::NoSpace("full".into()).code(), "HERD-005");
        assert_eq!(Error::Aborted("save").code(), "HERD-013");
    }

    #[test]
    fn test_not_found_classification() {
        assert!(Error::NoVdi("a".into()).is_not_found());
        assert!(Error::NoObject(42).is_not_found());
        assert!(!Error::NoSpace("full".into()).is_not_found());
        assert!(!Error::Corrupt("bad".into()).is_not_found());
    }
}
