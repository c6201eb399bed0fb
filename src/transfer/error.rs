//! Error types for the transfer module.
//!
//! Every variant is resumable: the partial file stays on disk and running
//! the same command again continues from it.

use std::path::PathBuf;

use thiserror::Error;

/// Guidance appended to every transfer failure.
pub const RESUME_HINT: &str = "Run the same command again to RESUME the download.";

/// Errors that can occur while transferring an archive to disk.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, dropped stream)
    #[error("network error downloading {url}: {source}\n  Suggestion: Run the same command again to RESUME the download.")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Connect or read timed out.
    #[error("timeout downloading {url}\n  Suggestion: Run the same command again to RESUME the download.")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}\n  Suggestion: Run the same command again to RESUME the download.")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while writing the archive.
    #[error("IO error writing to {path}: {source}\n  Suggestion: Run the same command again to RESUME the download.")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The response body ended before the declared total size was reached.
    #[error(
        "incomplete download of {path}: expected {expected_bytes} bytes, got {actual_bytes}\n  Suggestion: Run the same command again to RESUME the download."
    )]
    Incomplete {
        /// Partial archive path.
        path: PathBuf,
        /// Declared total size in bytes.
        expected_bytes: u64,
        /// Bytes on disk.
        actual_bytes: u64,
    },

    /// The external download tool could not be started.
    #[error("failed to run {tool}: {source}\n  Suggestion: Run the same command again to RESUME the download.")]
    Spawn {
        /// Tool executable name.
        tool: &'static str,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The external download tool exited with a non-zero status.
    #[error("{tool} failed with exit code {code}\n  Suggestion: Run the same command again to RESUME the download.")]
    ExternalTool {
        /// Tool executable name.
        tool: &'static str,
        /// The tool's exit code.
        code: i32,
    },

    /// The built-in HTTP client could not be constructed.
    #[error("failed to initialise HTTP client: {source}")]
    ClientSetup {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// The transfer was stopped by an interrupt signal.
    #[error("download interrupted\n  Suggestion: Run the same command again to RESUME the download.")]
    Interrupted,
}

impl TransferError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an incomplete-body error.
    pub fn incomplete(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Incomplete {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Creates a tool spawn error.
    pub fn spawn(tool: &'static str, source: std::io::Error) -> Self {
        Self::Spawn { tool, source }
    }

    /// Creates a tool exit-status error.
    pub fn external_tool(tool: &'static str, code: i32) -> Self {
        Self::ExternalTool { tool, code }
    }

    /// Returns true when the operator interrupted the transfer.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

// No From<reqwest::Error> / From<std::io::Error>: every variant needs the URL
// or path for context, so callers go through the constructors above.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_error_http_status_display() {
        let error = TransferError::http_status("https://example.com/a.whl", 503);
        let msg = error.to_string();
        assert!(msg.contains("503"), "Expected '503' in: {msg}");
        assert!(msg.contains("https://example.com/a.whl"), "Expected URL in: {msg}");
        assert!(msg.contains("RESUME"), "Expected resume guidance in: {msg}");
    }

    #[test]
    fn test_transfer_error_external_tool_carries_exit_code() {
        let error = TransferError::external_tool("wget", 4);
        let msg = error.to_string();
        assert!(msg.contains("wget"), "Expected tool in: {msg}");
        assert!(msg.contains("exit code 4"), "Expected exit code in: {msg}");
        assert!(msg.contains("RESUME"), "Expected resume guidance in: {msg}");
    }

    #[test]
    fn test_transfer_error_incomplete_display() {
        let error = TransferError::incomplete("/tmp/a.whl", 100, 40);
        let msg = error.to_string();
        assert!(msg.contains("expected 100 bytes, got 40"), "got: {msg}");
    }

    #[test]
    fn test_transfer_error_interrupted_is_flagged() {
        assert!(TransferError::Interrupted.is_interrupted());
        assert!(!TransferError::external_tool("curl", 1).is_interrupted());
    }
}
