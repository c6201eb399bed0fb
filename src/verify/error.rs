//! Error types for verification.

use std::path::PathBuf;

use thiserror::Error;

/// Verification failures.
///
/// [`verify_file`](super::verify_file) reports a mismatch as an outcome; the
/// orchestrator turns it into [`VerifyError::Mismatch`] once it decides the
/// package has failed.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The computed digest differs from the expected one.
    #[error("{algorithm} mismatch for {path}\n  Expected: {expected}\n  Got:      {computed}\n  Suggestion: The file was kept for inspection; delete it to force a fresh download")]
    Mismatch {
        /// Archive path.
        path: PathBuf,
        /// Algorithm name.
        algorithm: String,
        /// Expected hex digest.
        expected: String,
        /// Computed hex digest.
        computed: String,
    },

    /// The archive disappeared between transfer and verification.
    #[error("file not found for verification: {path}\n  Suggestion: Run the same command again to download it")]
    MissingFile {
        /// Expected archive path.
        path: PathBuf,
    },

    /// Reading the archive failed.
    #[error("IO error reading {path} for verification: {source}")]
    Io {
        /// Archive path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl VerifyError {
    /// Creates a missing-file error.
    pub fn missing_file(path: impl Into<PathBuf>) -> Self {
        Self::MissingFile { path: path.into() }
    }

    /// Creates a mismatch error.
    pub fn mismatch(
        path: impl Into<PathBuf>,
        algorithm: impl ToString,
        expected: impl Into<String>,
        computed: impl Into<String>,
    ) -> Self {
        Self::Mismatch {
            path: path.into(),
            algorithm: algorithm.to_string(),
            expected: expected.into(),
            computed: computed.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
