//! rpip Core Library
//!
//! This library wraps pip's dependency resolver with resumable,
//! integrity-checked downloads of package archives. pip still chooses
//! the archive and installs it; rpip owns the bytes in between.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`transfer`] - Backend selection, built-in HTTP resume protocol, external tool adapter
//! - [`verify`] - Streaming digest verification of finished archives
//! - [`orchestrator`] - Per-package state machine and sequential batch loop
//! - [`pip`] - Resolver and installer collaborators backed by `python -m pip`
//! - [`requirements`] - Requirements-file parsing
//! - [`output`] - Operator-facing output sink (progress, status, warnings)
//! - [`filename`] - Stable archive filenames derived from download URLs

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod filename;
pub mod orchestrator;
pub mod output;
pub mod pip;
pub mod requirements;
pub mod transfer;
pub mod verify;

// Re-export commonly used types
pub use error::PackageError;
pub use orchestrator::{BatchReport, Orchestrator, PackageOutcome, PackageStage};
pub use output::{ConsoleSink, OutputSink, RecordingSink, SinkEvent};
pub use pip::{
    DEFAULT_PYTHON, InstallError, PackageInstaller, PackageResolver, PipInstaller, PipResolver,
    ResolveError, ResolvedPackage,
};
pub use requirements::{Requirements, RequirementsError, editable_source, parse_requirements_file};
pub use transfer::{
    BackendChoice, BuiltinTransfer, ExternalTransfer, TransferBackend, TransferError,
    TransferOutcome, TransferReport, TransferRequest, TransferSettings, TransferState, backend_for,
    preferred_backend, select_backend,
};
pub use verify::{
    DigestAlgorithm, DigestSpec, SkipReason, VerifyError, VerifyOutcome, verify_file,
};
