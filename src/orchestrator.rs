//! Per-package pipeline and sequential batch loop.
//!
//! Each package moves through
//! `Resolving -> Selecting -> Transferring -> Verifying -> Installing -> Done`,
//! or stops in `Failed` at the first error. There is no checkpoint file: the
//! partial archive left at the target path is the resumable state.
//!
//! The artifact is deleted only after the installer succeeds. A transfer,
//! verification or installation failure leaves it on disk.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, error, info, instrument, warn};

use crate::error::PackageError;
use crate::output::OutputSink;
use crate::pip::{PackageInstaller, PackageResolver};
use crate::requirements::editable_source;
use crate::transfer::{TransferBackend, TransferReport, TransferRequest};
use crate::verify::{SkipReason, VerifyError, VerifyOutcome, verify_file};

const RULE: &str = "============================================================";

/// Pipeline stage of a single package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageStage {
    /// Asking the resolver for a download.
    Resolving,
    /// Picking the transfer backend.
    Selecting,
    /// Downloading the archive.
    Transferring,
    /// Checking the finished archive.
    Verifying,
    /// Running the installer.
    Installing,
    /// Installed (and cleaned up).
    Done,
    /// Stopped; see [`PackageOutcome::failed_stage`].
    Failed,
}

/// Result of one package.
#[derive(Debug)]
pub struct PackageOutcome {
    /// Package specification as given.
    pub spec: String,
    /// Terminal stage: [`PackageStage::Done`] or [`PackageStage::Failed`].
    pub stage: PackageStage,
    /// Stage that was active when the package failed.
    pub failed_stage: Option<PackageStage>,
    /// Why the package failed.
    pub error: Option<PackageError>,
    /// Local archive path, once known.
    pub artifact: Option<PathBuf>,
    /// Transfer report, when the transfer succeeded.
    pub transfer: Option<TransferReport>,
    /// Verification result, when verification ran.
    pub verification: Option<VerifyOutcome>,
    /// Whether the artifact was removed after installation.
    pub artifact_removed: bool,
}

impl PackageOutcome {
    fn new(spec: &str) -> Self {
        Self {
            spec: spec.to_string(),
            stage: PackageStage::Resolving,
            failed_stage: None,
            error: None,
            artifact: None,
            transfer: None,
            verification: None,
            artifact_removed: false,
        }
    }

    /// Whether the package was installed.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.stage == PackageStage::Done
    }

    /// Whether the operator interrupted this package.
    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.error.as_ref().is_some_and(PackageError::is_interrupted)
    }

    fn fail(&mut self, error: PackageError) {
        self.failed_stage = Some(self.stage);
        self.stage = PackageStage::Failed;
        self.error = Some(error);
    }
}

/// Aggregate result of a batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Packages in the batch.
    pub total: usize,
    /// Packages installed.
    pub succeeded: usize,
    /// Failed specifications, in order.
    pub failed: Vec<String>,
    /// The batch stopped early on an interrupt.
    pub interrupted: bool,
}

impl BatchReport {
    /// Whether every package was installed.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        !self.interrupted && self.failed.is_empty() && self.succeeded == self.total
    }
}

/// Sequences resolution, transfer, verification, installation and cleanup.
pub struct Orchestrator {
    resolver: Arc<dyn PackageResolver>,
    installer: Arc<dyn PackageInstaller>,
    backend: Box<dyn TransferBackend>,
    sink: Arc<dyn OutputSink>,
    download_dir: PathBuf,
}

impl Orchestrator {
    /// Creates an orchestrator downloading into the current directory.
    pub fn new(
        resolver: Arc<dyn PackageResolver>,
        installer: Arc<dyn PackageInstaller>,
        backend: Box<dyn TransferBackend>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            resolver,
            installer,
            backend,
            sink,
            download_dir: PathBuf::from("."),
        }
    }

    /// Sets the directory archives are downloaded into.
    #[must_use]
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    /// Installs one package. Never returns an error: every failure, panics
    /// included, is captured in the outcome.
    #[instrument(skip(self, options))]
    pub async fn install_one(&self, spec: &str, options: &[String]) -> PackageOutcome {
        let mut outcome = PackageOutcome::new(spec);
        let result = AssertUnwindSafe(self.drive(spec, options, &mut outcome))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(())) => outcome.stage = PackageStage::Done,
            Ok(Err(e)) => outcome.fail(e),
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                error!(spec, stage = ?outcome.stage, detail = %detail, "unexpected failure");
                outcome.fail(PackageError::Unexpected(detail));
            }
        }

        if let Some(e) = &outcome.error {
            self.sink.warning(&format!("Failed to install {spec}: {e}"));
            if let Some(step) = e.next_step() {
                self.sink.warning(&format!("   {step}"));
            }
        }
        outcome
    }

    async fn drive(
        &self,
        spec: &str,
        options: &[String],
        outcome: &mut PackageOutcome,
    ) -> Result<(), PackageError> {
        if let Some(source) = editable_source(spec) {
            outcome.stage = PackageStage::Installing;
            self.sink
                .status(&format!("Installing editable package: {spec}"));
            self.sink.status(&format!("   Source: {source}"));
            self.installer
                .install_editable(source, options)
                .await
                .map_err(|source| PackageError::Installation {
                    artifact: None,
                    source,
                })?;
            self.sink.status("Editable package installed successfully!");
            return Ok(());
        }

        self.sink.status(&format!("Resolving package: {spec}"));
        let resolved = self
            .resolver
            .resolve(spec, options)
            .await
            .map_err(PackageError::Resolution)?;
        debug!(url = %resolved.url, filename = %resolved.filename, "resolved");

        outcome.stage = PackageStage::Selecting;
        let target = self.download_dir.join(&resolved.filename);
        outcome.artifact = Some(target.clone());
        let interactive = self.sink.is_interactive();
        let request = TransferRequest::new(
            resolved.url.clone(),
            target.clone(),
            resolved.digest.clone(),
            interactive,
        );

        outcome.stage = PackageStage::Transferring;
        self.sink.status(&format!(
            "Starting resumable download via {}...",
            self.backend.choice()
        ));
        if interactive {
            self.sink.status(&format!("   Target URL: {}", request.url));
            self.sink
                .status(&format!("   Saving as: {}", target.display()));
        }
        let report = self
            .backend
            .transfer(&request, self.sink.as_ref())
            .await
            .map_err(PackageError::Transfer)?;
        info!(outcome = ?report.outcome, bytes = report.state.bytes_on_disk, "transfer finished");
        outcome.transfer = Some(report);

        outcome.stage = PackageStage::Verifying;
        let verification = self.verify(&request).await?;
        outcome.verification = Some(verification);

        outcome.stage = PackageStage::Installing;
        self.sink
            .status("Download complete. Installing via pip...");
        if let Err(source) = self.installer.install_archive(&target, options).await {
            if let Some(code) = source.exit_code() {
                self.sink
                    .warning(&format!("Installation failed with exit code {code}."));
            }
            return Err(PackageError::Installation {
                artifact: Some(target),
                source,
            });
        }
        self.sink.status("Installation successful!");

        outcome.artifact_removed = self.cleanup(&target).await;
        Ok(())
    }

    async fn verify(&self, request: &TransferRequest) -> Result<VerifyOutcome, PackageError> {
        if let Some(digest) = &request.expected_digest {
            self.sink.status(&format!(
                "Verifying file integrity ({})...",
                digest.algorithm
            ));
        }
        let verification = verify_file(&request.target, request.expected_digest.as_ref())
            .await
            .map_err(PackageError::Verification)?;

        match &verification {
            VerifyOutcome::Verified { .. } => self.sink.status("File integrity verified."),
            VerifyOutcome::Skipped(SkipReason::NoDigest) => self
                .sink
                .warning("No hash provided, skipping integrity check."),
            VerifyOutcome::Skipped(SkipReason::UnsupportedAlgorithm(name)) => {
                self.sink.warning(&format!(
                    "Unsupported hash algorithm: {name}, skipping verification."
                ));
            }
            VerifyOutcome::Mismatch {
                algorithm,
                expected,
                computed,
            } => {
                return Err(PackageError::Verification(VerifyError::mismatch(
                    &request.target,
                    algorithm,
                    expected.clone(),
                    computed.clone(),
                )));
            }
        }
        Ok(verification)
    }

    /// Removes the installed artifact; a failure is only a warning.
    async fn cleanup(&self, target: &Path) -> bool {
        match tokio::fs::remove_file(target).await {
            Ok(()) => {
                self.sink.status(&format!(
                    "Cleaned up temporary file: {}",
                    target.display()
                ));
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %target.display(), error = %e, "cleanup failed");
                self.sink.warning(&format!(
                    "Warning: Could not remove file {}: {e}",
                    target.display()
                ));
                false
            }
        }
    }

    /// Installs `specs` one after another and prints a summary.
    ///
    /// A failed package does not stop the batch; an interrupt does.
    pub async fn run_batch(&self, specs: &[String], options: &[String]) -> BatchReport {
        let total = specs.len();
        let mut report = BatchReport {
            total,
            ..BatchReport::default()
        };

        for (index, spec) in specs.iter().enumerate() {
            let position = index + 1;
            self.sink.status("");
            self.sink.status(RULE);
            self.sink
                .status(&format!("[{position}/{total}] Installing: {spec}"));
            self.sink.status(RULE);

            let outcome = self.install_one(spec, options).await;
            if outcome.succeeded() {
                report.succeeded += 1;
                self.sink.status(&format!(
                    "[{position}/{total}] Successfully installed: {spec}"
                ));
            } else {
                report.failed.push(spec.clone());
                self.sink
                    .status(&format!("[{position}/{total}] Failed to install: {spec}"));
                if outcome.interrupted() {
                    report.interrupted = true;
                    break;
                }
            }
        }

        self.print_summary(&report);
        report
    }

    fn print_summary(&self, report: &BatchReport) {
        self.sink.status("");
        self.sink.status(RULE);
        self.sink.status("Installation Summary");
        self.sink.status(RULE);
        self.sink.status(&format!(
            "Successful: {}/{}",
            report.succeeded, report.total
        ));
        if report.failed.is_empty() && !report.interrupted {
            self.sink.status("All packages installed successfully!");
            return;
        }
        self.sink.status(&format!(
            "Failed: {}/{}",
            report.failed.len(),
            report.total
        ));
        self.sink.status("");
        self.sink.status("Failed packages:");
        for spec in &report.failed {
            self.sink.status(&format!("  - {spec}"));
        }
        if report.interrupted {
            let skipped = report.total - report.succeeded - report.failed.len();
            self.sink
                .warning(&format!("Batch interrupted; {skipped} package(s) not attempted."));
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_report_all_succeeded() {
        let report = BatchReport {
            total: 2,
            succeeded: 2,
            ..BatchReport::default()
        };
        assert!(report.all_succeeded());
    }

    #[test]
    fn test_batch_report_with_failure_is_not_success() {
        let report = BatchReport {
            total: 3,
            succeeded: 2,
            failed: vec!["b".into()],
            interrupted: false,
        };
        assert!(!report.all_succeeded());
    }

    #[test]
    fn test_empty_batch_is_success() {
        assert!(BatchReport::default().all_succeeded());
    }

    #[test]
    fn test_panic_message_extracts_strings() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("bang")), "bang");
        assert_eq!(panic_message(&42_u8), "panic with non-string payload");
    }

    #[test]
    fn test_outcome_fail_records_stage() {
        let mut outcome = PackageOutcome::new("pkg");
        outcome.stage = PackageStage::Verifying;
        outcome.fail(PackageError::Unexpected("x".into()));
        assert_eq!(outcome.stage, PackageStage::Failed);
        assert_eq!(outcome.failed_stage, Some(PackageStage::Verifying));
        assert!(!outcome.succeeded());
    }
}
