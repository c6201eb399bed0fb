//! Resumable archive transfer.
//!
//! This module turns a resolved download URL into a complete file on disk.
//! Resumability lives entirely in the partial file: every backend continues
//! from whatever bytes are already at the target path, so re-running the
//! same command after a failure never starts over unless the server forces it.
//!
//! # Backends
//!
//! - [`BackendChoice::Aria2c`], [`BackendChoice::Wget`], [`BackendChoice::Curl`] -
//!   external tools with native resume, driven by [`ExternalTransfer`]
//! - [`BackendChoice::Builtin`] - HTTP range-request fallback, [`BuiltinTransfer`]
//!
//! [`select_backend`] probes the search path in that order.
//!
//! # Example
//!
//! ```no_run
//! use rpip_core::output::ConsoleSink;
//! use rpip_core::transfer::{TransferRequest, TransferSettings, backend_for, select_backend};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = backend_for(select_backend(), &TransferSettings::default())?;
//! let request = TransferRequest::new(
//!     "https://example.com/demo-1.0-py3-none-any.whl",
//!     "./demo-1.0-py3-none-any.whl",
//!     None,
//!     false,
//! );
//! let report = backend.transfer(&request, &ConsoleSink::new(false)).await?;
//! println!("{} bytes on disk", report.state.bytes_on_disk);
//! # Ok(())
//! # }
//! ```

mod builtin;
pub mod constants;
mod error;
mod external;
mod selector;

pub use builtin::BuiltinTransfer;
pub use error::{RESUME_HINT, TransferError};
pub use external::{ExternalTransfer, external_command};
pub use selector::{
    preferred_backend, preferred_backend_with, select_backend, select_backend_with,
};

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;

use crate::output::OutputSink;
use crate::verify::DigestSpec;

/// Transfer mechanism, in selection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendChoice {
    /// `aria2c -c`
    Aria2c,
    /// `wget -c`
    Wget,
    /// `curl -C -`
    Curl,
    /// Built-in HTTP range-request fallback, always available.
    Builtin,
}

impl BackendChoice {
    /// External tools in probe order.
    pub const EXTERNAL: [Self; 3] = [Self::Aria2c, Self::Wget, Self::Curl];

    /// Executable name for external tools, `None` for the built-in fallback.
    #[must_use]
    pub fn executable(self) -> Option<&'static str> {
        match self {
            Self::Aria2c => Some("aria2c"),
            Self::Wget => Some("wget"),
            Self::Curl => Some("curl"),
            Self::Builtin => None,
        }
    }

    /// Stable label for display and configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aria2c => "aria2c",
            Self::Wget => "wget",
            Self::Curl => "curl",
            Self::Builtin => "builtin",
        }
    }
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendChoice {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "aria2c" => Ok(Self::Aria2c),
            "wget" => Ok(Self::Wget),
            "curl" => Ok(Self::Curl),
            "builtin" | "python" => Ok(Self::Builtin),
            other => Err(format!(
                "unknown backend '{other}' (expected aria2c, wget, curl or builtin)"
            )),
        }
    }
}

/// One archive to fetch. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Source URL.
    pub url: String,
    /// Target path; a partial file here is resumed.
    pub target: PathBuf,
    /// Expected digest of the finished file, if the resolver reported one.
    pub expected_digest: Option<DigestSpec>,
    /// Whether output is attached to a terminal.
    pub interactive: bool,
}

impl TransferRequest {
    /// Creates a transfer request.
    pub fn new(
        url: impl Into<String>,
        target: impl Into<PathBuf>,
        expected_digest: Option<DigestSpec>,
        interactive: bool,
    ) -> Self {
        Self {
            url: url.into(),
            target: target.into(),
            expected_digest,
            interactive,
        }
    }

    /// File name component of the target, for display.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.target
            .file_name()
            .map_or_else(|| self.target.display().to_string(), |name| {
                name.to_string_lossy().into_owned()
            })
    }
}

/// Mutable bookkeeping of a single transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferState {
    /// Bytes that were on disk before the transfer started.
    pub resume_offset: u64,
    /// Declared total size, once response headers are known.
    pub total_size: Option<u64>,
    /// Bytes on disk when the transfer finished.
    pub bytes_on_disk: u64,
    /// Backend that performed the transfer.
    pub backend: BackendChoice,
}

impl TransferState {
    /// Fresh state for `backend` with `resume_offset` bytes already present.
    #[must_use]
    pub fn new(backend: BackendChoice, resume_offset: u64) -> Self {
        Self {
            resume_offset,
            total_size: None,
            bytes_on_disk: resume_offset,
            backend,
        }
    }
}

/// How a successful transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Data was written starting at offset 0.
    Fresh,
    /// Data was appended after the existing partial file.
    Resumed,
    /// The server ignored the range request; the partial file was discarded.
    Restarted,
    /// The server reported the range unsatisfiable; nothing was written.
    AlreadyComplete,
    /// An external tool handled the file; offsets are not observed.
    Delegated,
}

/// Result of a successful transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    /// Final transfer bookkeeping.
    pub state: TransferState,
    /// How the transfer ended.
    pub outcome: TransferOutcome,
}

/// Tunables shared by all backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSettings {
    /// Connect timeout of the built-in fallback, in seconds.
    pub connect_timeout_secs: u64,
    /// Idle read timeout of the built-in fallback, in seconds.
    pub read_timeout_secs: u64,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: constants::CONNECT_TIMEOUT_SECS,
            read_timeout_secs: constants::READ_TIMEOUT_SECS,
        }
    }
}

/// A mechanism able to produce the file described by a [`TransferRequest`].
#[async_trait]
pub trait TransferBackend: Send + Sync {
    /// Which backend this is.
    fn choice(&self) -> BackendChoice;

    /// Transfers `request.url` to `request.target`, resuming any partial file.
    async fn transfer(
        &self,
        request: &TransferRequest,
        sink: &dyn OutputSink,
    ) -> Result<TransferReport, TransferError>;
}

/// Builds the backend implementation for `choice`.
///
/// # Errors
///
/// Returns [`TransferError::ClientSetup`] if the built-in HTTP client cannot be
/// constructed.
pub fn backend_for(
    choice: BackendChoice,
    settings: &TransferSettings,
) -> Result<Box<dyn TransferBackend>, TransferError> {
    Ok(match ExternalTransfer::new(choice) {
        Some(external) => Box::new(external),
        None => Box::new(BuiltinTransfer::new(settings)?),
    })
}

/// Size of the file at `path`, or 0 if it does not exist.
pub(crate) async fn existing_len(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_choice_parses_known_names() {
        assert_eq!("aria2c".parse::<BackendChoice>().unwrap(), BackendChoice::Aria2c);
        assert_eq!("WGET".parse::<BackendChoice>().unwrap(), BackendChoice::Wget);
        assert_eq!("curl".parse::<BackendChoice>().unwrap(), BackendChoice::Curl);
        assert_eq!("builtin".parse::<BackendChoice>().unwrap(), BackendChoice::Builtin);
        assert_eq!("python".parse::<BackendChoice>().unwrap(), BackendChoice::Builtin);
        assert!("axel".parse::<BackendChoice>().is_err());
    }

    #[test]
    fn test_backend_choice_executable_only_for_external_tools() {
        for tool in BackendChoice::EXTERNAL {
            assert_eq!(tool.executable(), Some(tool.as_str()));
        }
        assert_eq!(BackendChoice::Builtin.executable(), None);
    }

    #[test]
    fn test_transfer_request_display_name_is_file_name() {
        let request = TransferRequest::new("https://e.com/a.whl", "/tmp/dl/a.whl", None, false);
        assert_eq!(request.display_name(), "a.whl");
    }

    #[test]
    fn test_transfer_state_starts_at_resume_offset() {
        let state = TransferState::new(BackendChoice::Builtin, 42);
        assert_eq!(state.bytes_on_disk, 42);
        assert_eq!(state.total_size, None);
    }
}
