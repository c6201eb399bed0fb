//! Merges CLI arguments over file configuration.
//!
//! A CLI value wins only when it was given on the command line; clap's
//! `ValueSource` tells defaults apart from explicit flags.

use std::path::PathBuf;

use clap::{ArgMatches, CommandFactory, FromArgMatches, parser::ValueSource};
use rpip_core::{DEFAULT_PYTHON, TransferSettings};

use crate::app::config::{BackendSetting, FileConfig};
use crate::cli::Args;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CliValueSources {
    pub(crate) backend: bool,
    pub(crate) python: bool,
    pub(crate) download_dir: bool,
    pub(crate) verbose: bool,
    pub(crate) quiet: bool,
}

/// Effective settings for one run.
#[derive(Debug, Clone)]
pub(crate) struct RunSettings {
    pub(crate) python: PathBuf,
    pub(crate) backend: BackendSetting,
    pub(crate) download_dir: PathBuf,
    pub(crate) transfer: TransferSettings,
    pub(crate) log_level: &'static str,
}

pub(crate) fn parse_cli_with_sources() -> (Args, CliValueSources) {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let sources = sources_from_matches(&matches);
    (args, sources)
}

fn sources_from_matches(matches: &ArgMatches) -> CliValueSources {
    CliValueSources {
        backend: is_commandline_value(matches, "backend"),
        python: is_commandline_value(matches, "python"),
        download_dir: is_commandline_value(matches, "download_dir"),
        verbose: is_commandline_value(matches, "verbose"),
        quiet: is_commandline_value(matches, "quiet"),
    }
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

pub(crate) fn resolve_settings(
    args: &Args,
    sources: &CliValueSources,
    file_config: Option<&FileConfig>,
) -> RunSettings {
    let file = file_config.cloned().unwrap_or_default();

    let python = match (&args.python, sources.python) {
        (Some(python), true) => python.clone(),
        _ => file
            .python
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PYTHON)),
    };

    let backend = match args.backend {
        Some(backend) if sources.backend => backend,
        _ => file.backend.unwrap_or_default(),
    };

    let download_dir = match (&args.download_dir, sources.download_dir) {
        (Some(dir), true) => dir.clone(),
        _ => file
            .download_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    let defaults = TransferSettings::default();
    let transfer = TransferSettings {
        connect_timeout_secs: file
            .connect_timeout_secs
            .unwrap_or(defaults.connect_timeout_secs),
        read_timeout_secs: file
            .read_timeout_secs
            .unwrap_or(defaults.read_timeout_secs),
    };

    RunSettings {
        python,
        backend,
        download_dir,
        transfer,
        log_level: resolve_log_level(args, sources, &file),
    }
}

/// Priority: `-q` > `-v`/`-vv` > config `verbosity` > warn.
/// `RUST_LOG`, when set, overrides all of these at subscriber setup.
fn resolve_log_level(args: &Args, sources: &CliValueSources, file: &FileConfig) -> &'static str {
    if sources.quiet && args.quiet {
        "error"
    } else if sources.verbose && args.verbose > 0 {
        match args.verbose {
            1 => "debug",
            _ => "trace",
        }
    } else if let Some(verbosity) = file.verbosity {
        verbosity.log_level()
    } else {
        "warn"
    }
}
