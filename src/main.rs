//! CLI entry point for rpip.

use std::process::ExitCode;

mod app;
mod cli;

/// Process exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every package installed.
    Success,
    /// Resolution, transfer, verification or installation failed.
    Failure,
    /// The operator interrupted the run.
    Interrupted,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Interrupted => 130,
        }
    }
}

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("Error: failed to start async runtime: {error}");
            return ExitCode::from(ProcessExit::Failure.code());
        }
    };

    match runtime.block_on(app::runtime::run_rpip()) {
        Ok(exit) => ExitCode::from(exit.code()),
        Err(error) => {
            eprintln!("Error: {error:?}");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}
