//! pip collaborators.
//!
//! rpip does not resolve dependencies itself. It asks pip which archive it
//! would download ([`PackageResolver`]) and hands the verified archive back
//! to pip for installation ([`PackageInstaller`]). Both are traits so the
//! orchestrator can be driven by other implementations.

mod error;
mod installer;
mod resolver;

pub use error::{InstallError, ResolveError};
pub use installer::PipInstaller;
pub use resolver::{PipResolver, parse_report};

use std::path::Path;

use async_trait::async_trait;

use crate::verify::DigestSpec;

/// Default interpreter used to run pip.
pub const DEFAULT_PYTHON: &str = "python3";

/// Archive chosen by the resolver for one package specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    /// Download URL.
    pub url: String,
    /// Stable archive filename derived from the URL.
    pub filename: String,
    /// Expected digest, when the index publishes one.
    pub digest: Option<DigestSpec>,
}

/// Finds the archive to download for a package specification.
#[async_trait]
pub trait PackageResolver: Send + Sync {
    /// Resolves `spec` honouring the index-selection options in `options`.
    async fn resolve(&self, spec: &str, options: &[String])
    -> Result<ResolvedPackage, ResolveError>;
}

/// Installs local archives and editable sources.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Installs the archive at `archive` with pass-through `options`.
    async fn install_archive(&self, archive: &Path, options: &[String])
    -> Result<(), InstallError>;

    /// Installs `source` in editable mode with pass-through `options`.
    async fn install_editable(&self, source: &str, options: &[String])
    -> Result<(), InstallError>;
}

/// Options that change which candidate pip picks, and whether they take a value.
const RESOLUTION_OPTIONS: &[(&str, bool)] = &[
    ("--index-url", true),
    ("-i", true),
    ("--extra-index-url", true),
    ("--trusted-host", true),
    ("--find-links", true),
    ("-f", true),
    ("--no-binary", true),
    ("--only-binary", true),
    ("--no-index", false),
    ("--prefer-binary", false),
    ("--pre", false),
];

/// Selects the pass-through options the resolver must see so it picks the
/// same candidate the installer would.
#[must_use]
pub fn resolution_options(options: &[String]) -> Vec<String> {
    let mut selected = Vec::new();
    let mut tokens = options.iter();
    while let Some(token) = tokens.next() {
        let matched = RESOLUTION_OPTIONS.iter().find(|(name, _)| {
            token == name || (name.starts_with("--") && token.starts_with(&format!("{name}=")))
        });
        let Some((name, takes_value)) = matched else {
            continue;
        };
        selected.push(token.clone());
        if *takes_value
            && token == name
            && let Some(value) = tokens.next()
        {
            selected.push(value.clone());
        }
    }
    selected
}
