//! Exit code logic for the rpip process.
//!
//! Single responsibility: map package and batch results to the process exit outcome.

use rpip_core::{BatchReport, PackageOutcome};

use crate::ProcessExit;

/// Exit outcome of a single-package run.
pub(crate) fn exit_for_package(outcome: &PackageOutcome) -> ProcessExit {
    if outcome.succeeded() {
        ProcessExit::Success
    } else if outcome.interrupted() {
        ProcessExit::Interrupted
    } else {
        ProcessExit::Failure
    }
}

/// Exit outcome of a requirements batch. Any failure makes the run fail.
pub(crate) fn exit_for_batch(report: &BatchReport) -> ProcessExit {
    if report.interrupted {
        ProcessExit::Interrupted
    } else if report.failed.is_empty() {
        ProcessExit::Success
    } else {
        ProcessExit::Failure
    }
}
