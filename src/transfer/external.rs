//! External download tools with native resume support.
//!
//! aria2c, wget and curl all continue from an existing partial file at the
//! output path when given their continue flag, so a failed run leaves the
//! same resumable state as the built-in fallback.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use super::{
    BackendChoice, TransferBackend, TransferError, TransferOutcome, TransferReport,
    TransferRequest, TransferState, existing_len,
};
use crate::output::OutputSink;

/// Transfer delegated to an external tool subprocess.
///
/// No timeout is applied: the tool owns its own timeout policy.
#[derive(Debug, Clone)]
pub struct ExternalTransfer {
    tool: BackendChoice,
    tool_name: &'static str,
    program: PathBuf,
}

impl ExternalTransfer {
    /// Creates an adapter that runs `tool` from the search path.
    ///
    /// Returns `None` for [`BackendChoice::Builtin`].
    #[must_use]
    pub fn new(tool: BackendChoice) -> Option<Self> {
        let tool_name = tool.executable()?;
        Some(Self {
            tool,
            tool_name,
            program: PathBuf::from(tool_name),
        })
    }

    /// Creates an adapter for `tool` that executes an explicit binary path.
    ///
    /// Returns `None` for [`BackendChoice::Builtin`].
    #[must_use]
    pub fn with_program(tool: BackendChoice, program: impl Into<PathBuf>) -> Option<Self> {
        let mut adapter = Self::new(tool)?;
        adapter.program = program.into();
        Some(adapter)
    }
}

#[async_trait]
impl TransferBackend for ExternalTransfer {
    fn choice(&self) -> BackendChoice {
        self.tool
    }

    #[instrument(skip(self, request, sink), fields(tool = self.tool_name, url = %request.url))]
    async fn transfer(
        &self,
        request: &TransferRequest,
        sink: &dyn OutputSink,
    ) -> Result<TransferReport, TransferError> {
        let resume_offset = existing_len(&request.target).await;
        let args = external_command(self.tool, &request.url, &request.target, request.interactive)
            .unwrap_or_default();
        debug!(program = %self.program.display(), ?args, resume_offset, "spawning download tool");

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .await
            .map_err(|e| TransferError::spawn(self.tool_name, e))?;

        if !status.success() {
            return Err(match status.code() {
                Some(code) => TransferError::external_tool(self.tool_name, code),
                // Killed by a signal (e.g. SIGINT forwarded from the terminal).
                None => TransferError::Interrupted,
            });
        }

        let mut state = TransferState::new(self.tool, resume_offset);
        state.bytes_on_disk = existing_len(&request.target).await;
        if !request.interactive {
            sink.status(&format!("   Download complete: {}", request.display_name()));
        }
        info!(bytes = state.bytes_on_disk, "external transfer complete");

        Ok(TransferReport {
            state,
            outcome: TransferOutcome::Delegated,
        })
    }
}

/// Builds the resume-enabled argument list for `tool`.
///
/// Quiet flags are appended when `interactive` is false so automated logs
/// stay compact. Returns `None` for [`BackendChoice::Builtin`].
#[must_use]
pub fn external_command(
    tool: BackendChoice,
    url: &str,
    target: &Path,
    interactive: bool,
) -> Option<Vec<OsString>> {
    let mut args: Vec<OsString> = match tool {
        BackendChoice::Aria2c => {
            // aria2c resolves -o relative to -d, so split the target path.
            let dir = target
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = target.file_name().unwrap_or(target.as_os_str());
            vec![
                "-c".into(),
                url.into(),
                "-d".into(),
                dir.as_os_str().to_owned(),
                "-o".into(),
                name.to_owned(),
            ]
        }
        BackendChoice::Wget => vec![
            "-c".into(),
            url.into(),
            "-O".into(),
            target.as_os_str().to_owned(),
        ],
        BackendChoice::Curl => vec![
            "-C".into(),
            "-".into(),
            "-L".into(),
            "-o".into(),
            target.as_os_str().to_owned(),
            url.into(),
        ],
        BackendChoice::Builtin => return None,
    };

    if !interactive {
        let quiet: &[&str] = match tool {
            BackendChoice::Aria2c => &["--summary-interval=0", "--quiet=true"],
            BackendChoice::Wget => &["-nv"],
            BackendChoice::Curl => &["-s", "-S"],
            BackendChoice::Builtin => &[],
        };
        args.extend(quiet.iter().map(OsString::from));
    }

    Some(args)
}
