//! Per-package error taxonomy.
//!
//! Every stage error is caught at the package boundary and wrapped here, so a
//! failing package never aborts a batch.

use std::path::PathBuf;

use thiserror::Error;

use crate::pip::{InstallError, ResolveError};
use crate::transfer::TransferError;
use crate::verify::VerifyError;

/// Why a single package failed.
#[derive(Debug, Error)]
pub enum PackageError {
    /// No usable download was located.
    #[error("{0}")]
    Resolution(ResolveError),

    /// Network, transport or download-tool failure. Always resumable.
    #[error("{0}")]
    Transfer(TransferError),

    /// Digest mismatch or missing artifact. Needs an operator decision.
    #[error("{0}")]
    Verification(VerifyError),

    /// The installer failed; the artifact is kept.
    #[error("{source}")]
    Installation {
        /// Preserved archive, `None` for editable installs.
        artifact: Option<PathBuf>,
        /// The installer error.
        #[source]
        source: InstallError,
    },

    /// Anything not covered above.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl PackageError {
    /// Whether the operator interrupted the transfer.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Transfer(e) if e.is_interrupted())
    }

    /// Actionable next step for the operator.
    ///
    /// `None` when the error message already ends with the resume suggestion.
    #[must_use]
    pub fn next_step(&self) -> Option<String> {
        let step = match self {
            Self::Resolution(_) => {
                "Check the package specification and the pip output above.".to_string()
            }
            Self::Transfer(TransferError::ClientSetup { .. }) | Self::Unexpected(_) => {
                "Re-run with -v for diagnostic detail.".to_string()
            }
            Self::Transfer(_) => return None,
            Self::Verification(VerifyError::Mismatch { path, .. }) => format!(
                "Inspect the digest values above; delete {} to download it again.",
                path.display()
            ),
            Self::Verification(_) => "Run the same command again to download it.".to_string(),
            Self::Installation {
                artifact: Some(path),
                ..
            } => format!(
                "The downloaded file is preserved: {}. Install it manually with pip.",
                path.display()
            ),
            Self::Installation { artifact: None, .. } => {
                "Check the pip output above and retry the editable install.".to_string()
            }
        };
        Some(step)
    }
}
