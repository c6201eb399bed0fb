//! Error types for the pip collaborators.
//!
//! Follows the What/Why/Fix pattern: each message ends with a suggestion.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while asking pip which archive to download.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The Python interpreter could not be started.
    #[error("failed to run {python}: {source}\n  Suggestion: Check the `python` setting or pass --python")]
    Spawn {
        /// Interpreter path.
        python: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// `pip install --dry-run --report` exited with a failure status.
    #[error("pip could not resolve '{spec}' (exit code {code}):\n{stderr}\n  Suggestion: Check the package name, version constraint and index options")]
    PipFailed {
        /// Package specification.
        spec: String,
        /// Exit code, `-1` when terminated by a signal.
        code: i32,
        /// Captured stderr of pip.
        stderr: String,
    },

    /// No JSON object was found in pip's output.
    #[error("could not find JSON report in pip output for '{spec}'\n  Suggestion: Upgrade pip (the --report option needs pip 22.2 or newer)")]
    MissingReport {
        /// Package specification.
        spec: String,
    },

    /// The JSON report could not be parsed.
    #[error("could not parse pip report for '{spec}': {source}\n  Suggestion: Upgrade pip or report the pip version in use")]
    MalformedReport {
        /// Package specification.
        spec: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// pip resolved nothing to install.
    #[error("no download candidate found for '{spec}'\n  Suggestion: Check that the package exists on the configured index")]
    NoCandidate {
        /// Package specification.
        spec: String,
    },

    /// The download URL has no usable file name.
    #[error("could not derive an archive filename for '{spec}' from {url}\n  Suggestion: Install this package with pip directly")]
    NoFilename {
        /// Package specification.
        spec: String,
        /// Download URL reported by pip.
        url: String,
    },
}

/// Errors that can occur while handing an archive to pip for installation.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The Python interpreter could not be started.
    #[error("failed to run {python}: {source}")]
    Spawn {
        /// Interpreter path.
        python: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// `pip install` exited with a failure status.
    #[error("installation of {target} failed with exit code {code}")]
    Failed {
        /// Archive path or editable source.
        target: String,
        /// pip's exit code, `-1` when terminated by a signal.
        code: i32,
    },
}

impl InstallError {
    /// Exit code reported by pip, if it ran.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Failed { code, .. } => Some(*code),
            Self::Spawn { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_pip_failed_includes_stderr() {
        let error = ResolveError::PipFailed {
            spec: "nosuchpkg".into(),
            code: 1,
            stderr: "ERROR: No matching distribution found".into(),
        };
        let msg = error.to_string();
        assert!(msg.contains("nosuchpkg"), "Expected spec in: {msg}");
        assert!(msg.contains("No matching distribution"), "Expected stderr in: {msg}");
        assert!(msg.contains("Suggestion:"), "Expected suggestion in: {msg}");
    }

    #[test]
    fn test_install_error_exit_code_is_verbatim() {
        let error = InstallError::Failed {
            target: "a.whl".into(),
            code: 23,
        };
        assert_eq!(error.exit_code(), Some(23));
        assert!(error.to_string().contains("23"));
    }
}
