//! Built-in HTTP fallback with byte-range resume.
//!
//! Protocol:
//! 1. Resume offset = current size of the target file (0 if absent).
//! 2. GET the URL, with `Range: bytes=<offset>-` when the offset is non-zero.
//! 3. `416` means the local file is already complete. `206` appends to the
//!    partial file. `200` in answer to a range request means the server
//!    ignored it, so the partial file is truncated and rewritten from zero.
//! 4. The body is written in [`CHUNK_SIZE`] pieces with a progress update
//!    after each piece.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_RANGE, HeaderMap, RANGE};
use reqwest::{Client, StatusCode};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use super::constants::{CHUNK_SIZE, USER_AGENT};
use super::{
    BackendChoice, TransferBackend, TransferError, TransferOutcome, TransferReport,
    TransferRequest, TransferSettings, TransferState, existing_len,
};
use crate::output::OutputSink;

/// HTTP client performing the range-request resume protocol.
///
/// Applies a fixed connect timeout and an idle read timeout so a hung server
/// cannot stall the batch forever.
#[derive(Debug, Clone)]
pub struct BuiltinTransfer {
    client: Client,
}

impl BuiltinTransfer {
    /// Creates the fallback transfer with the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ClientSetup`] if the HTTP client cannot be built.
    pub fn new(settings: &TransferSettings) -> Result<Self, TransferError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .read_timeout(Duration::from_secs(settings.read_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| TransferError::ClientSetup { source })?;
        Ok(Self { client })
    }

    async fn send(&self, url: &str, offset: u64) -> Result<reqwest::Response, TransferError> {
        let mut request = self.client.get(url);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        request
            .send()
            .await
            .map_err(|e| TransferError::network(url, e))
    }
}

#[async_trait]
impl TransferBackend for BuiltinTransfer {
    fn choice(&self) -> BackendChoice {
        BackendChoice::Builtin
    }

    #[instrument(skip(self, request, sink), fields(url = %request.url, path = %request.target.display()))]
    async fn transfer(
        &self,
        request: &TransferRequest,
        sink: &dyn OutputSink,
    ) -> Result<TransferReport, TransferError> {
        let name = request.display_name();
        let mut state = TransferState::new(BackendChoice::Builtin, existing_len(&request.target).await);

        if state.resume_offset > 0 {
            if request.interactive {
                sink.status(&format!("   Resuming from byte {}", state.resume_offset));
            } else {
                sink.status(&format!(
                    "   Resuming download for {name} from byte {}...",
                    state.resume_offset
                ));
            }
        }
        if !request.interactive {
            sink.status(&format!("   Downloading {name}..."));
        }

        let response = self.send(&request.url, state.resume_offset).await?;
        let status = response.status();
        debug!(status = status.as_u16(), offset = state.resume_offset, "response received");

        if status == StatusCode::RANGE_NOT_SATISFIABLE && state.resume_offset > 0 {
            state.total_size =
                content_range_total(response.headers()).or(Some(state.resume_offset));
            info!(bytes = state.bytes_on_disk, "range not satisfiable, file already complete");
            sink.status("   File already complete!");
            return Ok(TransferReport {
                state,
                outcome: TransferOutcome::AlreadyComplete,
            });
        }

        if !status.is_success() {
            return Err(TransferError::http_status(&request.url, status.as_u16()));
        }

        let resuming = state.resume_offset > 0 && status == StatusCode::PARTIAL_CONTENT;
        let outcome = if resuming {
            state.total_size = content_range_total(response.headers()).or_else(|| {
                response
                    .content_length()
                    .map(|remaining| state.resume_offset.saturating_add(remaining))
            });
            TransferOutcome::Resumed
        } else {
            let outcome = if state.resume_offset > 0 {
                warn!(
                    status = status.as_u16(),
                    discarded = state.resume_offset,
                    "server ignored range request, restarting from zero"
                );
                if request.interactive {
                    sink.status("   Server doesn't support resume, starting from beginning...");
                } else {
                    sink.status(&format!(
                        "   Server doesn't support resume for {name}, starting from beginning..."
                    ));
                }
                TransferOutcome::Restarted
            } else {
                TransferOutcome::Fresh
            };
            state.resume_offset = 0;
            state.bytes_on_disk = 0;
            state.total_size = response.content_length();
            outcome
        };

        let mut file = open_target(&request.target, resuming).await?;
        let stream_result = stream_to_file(&mut file, response, request, &mut state, sink).await;
        // Land whatever was written, even on error, so the next run resumes from it.
        let flush_result = file.flush().await;
        if request.interactive {
            sink.finish_progress();
        }
        stream_result?;
        flush_result.map_err(|e| TransferError::io(&request.target, e))?;

        if let Some(expected) = state.total_size {
            if state.bytes_on_disk < expected {
                return Err(TransferError::incomplete(
                    &request.target,
                    expected,
                    state.bytes_on_disk,
                ));
            }
            if state.bytes_on_disk > expected {
                warn!(
                    expected,
                    actual = state.bytes_on_disk,
                    "file is larger than the declared size"
                );
            }
        }

        if !request.interactive {
            sink.status(&format!("   Download complete: {name}"));
        }
        info!(
            bytes = state.bytes_on_disk,
            resumed_from = state.resume_offset,
            outcome = ?outcome,
            "transfer complete"
        );

        Ok(TransferReport { state, outcome })
    }
}

/// Opens the target in append mode when resuming, truncating otherwise.
async fn open_target(path: &Path, append: bool) -> Result<File, TransferError> {
    let result = if append {
        OpenOptions::new().create(true).append(true).open(path).await
    } else {
        File::create(path).await
    };
    result.map_err(|e| TransferError::io(path, e))
}

/// Streams the response body to `file` in fixed-size pieces.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    request: &TransferRequest,
    state: &mut TransferState,
    sink: &dyn OutputSink,
) -> Result<(), TransferError> {
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| TransferError::network(&request.url, e))?;
        for piece in chunk.chunks(CHUNK_SIZE) {
            file.write_all(piece)
                .await
                .map_err(|e| TransferError::io(&request.target, e))?;
            state.bytes_on_disk += piece.len() as u64;
            if request.interactive {
                sink.progress(state.bytes_on_disk, state.total_size);
            }
        }
    }

    Ok(())
}

/// Total resource size from a `Content-Range` header (`bytes 0-99/1234` or `bytes */1234`).
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_range_total)
}

fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse::<u64>().ok()
}
