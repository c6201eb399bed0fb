//! CLI argument definitions using clap derive macros.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::app::config::BackendSetting;

/// Resumable package installer: pip resolution + resumable, verified download.
///
/// Any argument rpip does not recognise is passed through to `pip install`.
#[derive(Parser, Debug)]
#[command(name = "rpip")]
#[command(author, version, about)]
#[command(override_usage = "rpip [OPTIONS] <PACKAGE_OR_FILE> [PIP_ARGS]...\n       \
                            rpip [OPTIONS] -r <FILE> [PIP_ARGS]...")]
pub struct Args {
    /// Install from the given requirements file
    #[arg(short = 'r', long = "requirement", value_name = "FILE")]
    pub requirement: Option<PathBuf>,

    /// Download backend: auto, aria2c, wget, curl or builtin
    #[arg(long, value_name = "BACKEND")]
    pub backend: Option<BackendSetting>,

    /// Python interpreter whose pip resolves and installs packages
    #[arg(long, value_name = "PATH")]
    pub python: Option<PathBuf>,

    /// Directory archives are downloaded into
    #[arg(long, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Plain log-friendly output even when attached to a terminal
    #[arg(long)]
    pub non_interactive: bool,

    /// Increase diagnostic verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors from rpip's own diagnostics
    #[arg(short, long)]
    pub quiet: bool,

    /// Package spec or requirements file, followed by pip install options
    #[arg(
        value_name = "PACKAGE_OR_FILE",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub rest: Vec<String>,
}

/// What the command line asks rpip to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Install every package listed in a requirements file.
    Requirements {
        /// Requirements file path.
        file: PathBuf,
        /// Pass-through pip options.
        pip_args: Vec<String>,
    },
    /// Install one package specification.
    Package {
        /// Package specification (editable specs keep their `-e ` prefix).
        spec: String,
        /// Pass-through pip options.
        pip_args: Vec<String>,
    },
    /// Neither a package nor a requirements file was given.
    Missing,
}

impl Args {
    /// Splits the positional arguments into a target and pip pass-through options.
    ///
    /// The target is the first argument not starting with `-`. A `.txt` or
    /// `.in` target that names an existing file is a requirements file.
    #[must_use]
    pub fn invocation(&self) -> Invocation {
        if let Some(file) = &self.requirement {
            return Invocation::Requirements {
                file: file.clone(),
                pip_args: self.rest.clone(),
            };
        }

        let Some(index) = self.rest.iter().position(|arg| !arg.starts_with('-')) else {
            return Invocation::Missing;
        };
        let mut pip_args = self.rest.clone();
        let target = pip_args.remove(index);

        let editable = index > 0 && matches!(pip_args[index - 1].as_str(), "-e" | "--editable");
        if editable {
            pip_args.remove(index - 1);
            return Invocation::Package {
                spec: format!("-e {target}"),
                pip_args,
            };
        }

        if is_requirements_path(&target) {
            Invocation::Requirements {
                file: PathBuf::from(target),
                pip_args,
            }
        } else {
            Invocation::Package {
                spec: target,
                pip_args,
            }
        }
    }
}

fn is_requirements_path(target: &str) -> bool {
    let path = Path::new(target);
    let has_requirements_extension = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("in"));
    has_requirements_extension && path.is_file()
}
