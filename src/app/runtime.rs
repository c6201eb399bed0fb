use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::CommandFactory;
use rpip_core::{
    BackendChoice, ConsoleSink, Orchestrator, OutputSink, PipInstaller, PipResolver,
    backend_for, parse_requirements_file, preferred_backend, select_backend,
};
use tracing::{debug, info};

use crate::ProcessExit;
use crate::app::config::{BackendSetting, load_default_file_config};
use crate::app::{config_runtime, exit_handler, terminal};
use crate::cli::{Args, Invocation};

/// Packages to install in this run.
enum Plan {
    Single(String),
    Batch(Vec<String>),
}

const INTERRUPTED_MESSAGE: &str = "Download interrupted. Run the same command to resume.";

pub(crate) async fn run_rpip() -> Result<ProcessExit> {
    let (args, cli_sources) = config_runtime::parse_cli_with_sources();
    let file_config = load_default_file_config()?;
    let settings = config_runtime::resolve_settings(&args, &cli_sources, file_config.as_ref());
    terminal::init_tracing(settings.log_level, terminal::is_no_color_requested());

    debug!(?args, "CLI arguments parsed");

    let interactive = terminal::should_use_interactive_output(
        io::stdout().is_terminal(),
        args.non_interactive,
        terminal::is_dumb_terminal(),
    );
    let sink: Arc<dyn OutputSink> = Arc::new(ConsoleSink::new(interactive));

    let (plan, pip_options) = match args.invocation() {
        Invocation::Missing => {
            Args::command().print_help()?;
            return Ok(ProcessExit::Failure);
        }
        Invocation::Package { spec, pip_args } => (Plan::Single(spec), pip_args),
        Invocation::Requirements { file, pip_args } => {
            sink.status(&format!("Processing requirements file: {}", file.display()));
            let requirements = parse_requirements_file(&file)?;
            for warning in &requirements.warnings {
                sink.warning(&format!("Warning: {warning}"));
            }
            if requirements.packages.is_empty() {
                sink.warning("No packages found in requirements file.");
                return Ok(ProcessExit::Success);
            }
            if !requirements.pip_options.is_empty() {
                sink.status(&format!(
                    "Applying pip options: {}",
                    requirements.pip_options.join(" ")
                ));
            }
            sink.status(&format!(
                "Found {} package(s) to install",
                requirements.packages.len()
            ));
            let options = requirements.install_options(&pip_args);
            (Plan::Batch(requirements.packages), options)
        }
    };

    tokio::fs::create_dir_all(&settings.download_dir)
        .await
        .with_context(|| {
            format!(
                "Cannot create download directory '{}'",
                settings.download_dir.display()
            )
        })?;

    let choice = choose_backend(settings.backend, sink.as_ref());
    info!(backend = %choice, interactive, "transfer backend selected");
    let backend = backend_for(choice, &settings.transfer)?;

    let orchestrator = Orchestrator::new(
        Arc::new(PipResolver::new(&settings.python)),
        Arc::new(PipInstaller::new(&settings.python)),
        backend,
        Arc::clone(&sink),
    )
    .with_download_dir(&settings.download_dir);

    let work = async {
        match &plan {
            Plan::Single(spec) => {
                let outcome = orchestrator.install_one(spec, &pip_options).await;
                exit_handler::exit_for_package(&outcome)
            }
            Plan::Batch(specs) => {
                let report = orchestrator.run_batch(specs, &pip_options).await;
                exit_handler::exit_for_batch(&report)
            }
        }
    };

    let exit = tokio::select! {
        exit = work => exit,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for the interrupt signal")?;
            sink.finish_progress();
            sink.warning("");
            sink.warning(INTERRUPTED_MESSAGE);
            ProcessExit::Interrupted
        }
    };
    Ok(exit)
}

/// Applies a forced backend, falling back to automatic selection when the
/// forced tool is missing.
fn choose_backend(setting: BackendSetting, sink: &dyn OutputSink) -> BackendChoice {
    let BackendSetting::Forced(preferred) = setting else {
        return select_backend();
    };
    if let Some(choice) = preferred_backend(preferred) {
        return choice;
    }
    let fallback = select_backend();
    sink.warning(&format!(
        "Warning: {preferred} not found on PATH, using {fallback} instead."
    ));
    fallback
}
