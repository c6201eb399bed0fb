//! Requirements-file parsing.
//!
//! Reads the subset of pip's requirements format that matters for a
//! download-then-install flow: package lines, editable lines, nested `-r`
//! includes and the index-selection options that must reach pip.
//! Nested files are expanded in place with an explicit work-list; a file
//! already included once is skipped, which also breaks include cycles.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Options kept from requirements files and forwarded to pip.
const PRESERVED_OPTIONS: &[&str] = &[
    "--index-url",
    "--extra-index-url",
    "--trusted-host",
    "--find-links",
    "--no-index",
    "--prefer-binary",
    "--pre",
    "--no-binary",
    "--only-binary",
];

/// Errors reading the top-level requirements file.
#[derive(Debug, Error)]
pub enum RequirementsError {
    /// The file does not exist.
    #[error("requirements file not found: {path}\n  Suggestion: Check the path passed to -r")]
    NotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("error reading requirements file {path}: {source}")]
    Io {
        /// Requested path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Parsed requirements: packages in file order plus preserved pip options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    /// Package specifications, editable lines included verbatim.
    pub packages: Vec<String>,
    /// Preserved options split into argv tokens.
    pub pip_options: Vec<String>,
    /// Non-fatal problems (missing or repeated nested files).
    pub warnings: Vec<String>,
}

impl Requirements {
    /// Preserved options followed by `cli_options`.
    #[must_use]
    pub fn install_options(&self, cli_options: &[String]) -> Vec<String> {
        self.pip_options
            .iter()
            .chain(cli_options)
            .cloned()
            .collect()
    }
}

/// One open file on the work-list.
struct Frame {
    path: PathBuf,
    lines: std::vec::IntoIter<String>,
}

impl Frame {
    fn open(path: PathBuf) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(&path)?;
        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        Ok(Self {
            path,
            lines: lines.into_iter(),
        })
    }
}

/// Parses the requirements file at `path`.
///
/// # Errors
///
/// Returns [`RequirementsError`] if the top-level file is missing or
/// unreadable. Problems with nested files are reported in
/// [`Requirements::warnings`] instead.
pub fn parse_requirements_file(path: &Path) -> Result<Requirements, RequirementsError> {
    let root = Frame::open(path.to_path_buf()).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            RequirementsError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            RequirementsError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let mut requirements = Requirements::default();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    visited.insert(identity(path));
    let mut stack = vec![root];

    while let Some(frame) = stack.last_mut() {
        let Some(raw) = frame.lines.next() else {
            stack.pop();
            continue;
        };
        let Some(line) = clean_line(&raw) else {
            continue;
        };

        if let Some(nested) = nested_requirement(line) {
            let nested_path = frame
                .path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(nested);
            if !nested_path.exists() {
                let message = format!(
                    "Nested requirements file not found: {}",
                    nested_path.display()
                );
                warn!(path = %nested_path.display(), "nested requirements file not found");
                requirements.warnings.push(message);
                continue;
            }
            if !visited.insert(identity(&nested_path)) {
                let message = format!(
                    "Skipping requirements file included more than once: {}",
                    nested_path.display()
                );
                warn!(path = %nested_path.display(), "requirements file already included");
                requirements.warnings.push(message);
                continue;
            }
            match Frame::open(nested_path.clone()) {
                Ok(nested_frame) => stack.push(nested_frame),
                Err(e) => {
                    warn!(path = %nested_path.display(), error = %e, "cannot read nested requirements file");
                    requirements.warnings.push(format!(
                        "Could not read nested requirements file {}: {e}",
                        nested_path.display()
                    ));
                }
            }
            continue;
        }

        if editable_source(line).is_some() {
            requirements.packages.push(line.to_string());
        } else if is_preserved_option(line) {
            requirements
                .pip_options
                .extend(line.split_whitespace().map(str::to_string));
        } else if line.starts_with('-') {
            debug!(option = line, "ignoring requirements option");
        } else {
            requirements.packages.push(line.to_string());
        }
    }

    Ok(requirements)
}

/// Source of an editable spec (`-e <src>`, `--editable <src>`, `--editable=<src>`).
#[must_use]
pub fn editable_source(spec: &str) -> Option<&str> {
    let rest = if let Some(rest) = spec.strip_prefix("--editable=") {
        rest
    } else if let Some(rest) = spec.strip_prefix("--editable") {
        rest.strip_prefix(char::is_whitespace)?
    } else {
        spec.strip_prefix("-e")?.strip_prefix(char::is_whitespace)?
    };
    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

/// Trims the line and strips comments; `None` when nothing remains.
///
/// Only a `#` at the start or preceded by whitespace opens a comment, so
/// URL fragments such as `#egg=name` survive.
fn clean_line(raw: &str) -> Option<&str> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let cut = line
        .char_indices()
        .zip(line.chars().skip(1))
        .find(|((_, c), next)| c.is_whitespace() && *next == '#')
        .map_or(line.len(), |((index, _), _)| index);
    let line = line[..cut].trim_end();
    (!line.is_empty()).then_some(line)
}

/// Path named by a `-r`/`--requirement` line.
fn nested_requirement(line: &str) -> Option<&str> {
    let rest = if let Some(rest) = line.strip_prefix("--requirement") {
        rest.strip_prefix('=').unwrap_or(rest)
    } else {
        line.strip_prefix("-r")?
    };
    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

fn is_preserved_option(line: &str) -> bool {
    let name = line
        .split(|c: char| c == '=' || c.is_whitespace())
        .next()
        .unwrap_or(line);
    PRESERVED_OPTIONS.contains(&name)
}

fn identity(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_packages_comments_and_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "requirements.txt",
            "# full line comment\n\nrequests>=2.0  # inline\n  numpy\n",
        );
        let parsed = parse_requirements_file(&path).unwrap();
        assert_eq!(parsed.packages, vec!["requests>=2.0", "numpy"]);
        assert!(parsed.pip_options.is_empty());
    }

    #[test]
    fn test_parse_keeps_hash_without_preceding_space() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "requirements.txt",
            "git+https://github.com/org/pkg.git#egg=pkg # vcs\n",
        );
        let parsed = parse_requirements_file(&path).unwrap();
        assert_eq!(
            parsed.packages,
            vec!["git+https://github.com/org/pkg.git#egg=pkg"]
        );
    }

    #[test]
    fn test_parse_preserved_options_are_split_into_tokens() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "requirements.txt",
            "--index-url https://download.pytorch.org/whl/cu118\n--pre\n--no-cache-dir\n--prefix /opt\n-c constraints.txt\ntorch\n",
        );
        let parsed = parse_requirements_file(&path).unwrap();
        assert_eq!(parsed.packages, vec!["torch"]);
        assert_eq!(
            parsed.pip_options,
            vec![
                "--index-url",
                "https://download.pytorch.org/whl/cu118",
                "--pre"
            ]
        );
    }

    #[test]
    fn test_parse_editable_lines_are_packages() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "requirements.txt",
            "-e ./local/pkg\n--editable=git+https://example.com/x.git#egg=x\n",
        );
        let parsed = parse_requirements_file(&path).unwrap();
        assert_eq!(
            parsed.packages,
            vec![
                "-e ./local/pkg",
                "--editable=git+https://example.com/x.git#egg=x"
            ]
        );
    }

    #[test]
    fn test_parse_nested_files_expand_in_place_relative_to_parent() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "sub/base.txt", "numpy\n--extra-index-url https://x/simple\n");
        let path = write(
            dir.path(),
            "requirements.txt",
            "first\n-r sub/base.txt\nlast\n",
        );
        let parsed = parse_requirements_file(&path).unwrap();
        assert_eq!(parsed.packages, vec!["first", "numpy", "last"]);
        assert_eq!(
            parsed.pip_options,
            vec!["--extra-index-url", "https://x/simple"]
        );
    }

    #[test]
    fn test_parse_include_cycle_is_skipped_with_warning() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.txt", "beta\n--requirement a.txt\n");
        let path = write(dir.path(), "a.txt", "alpha\n-r b.txt\n");
        let parsed = parse_requirements_file(&path).unwrap();
        assert_eq!(parsed.packages, vec!["alpha", "beta"]);
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.warnings[0].contains("more than once"));
    }

    #[test]
    fn test_parse_missing_nested_file_warns_and_continues() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "requirements.txt", "-r missing.txt\nrequests\n");
        let parsed = parse_requirements_file(&path).unwrap();
        assert_eq!(parsed.packages, vec!["requests"]);
        assert!(parsed.warnings[0].contains("not found"));
    }

    #[test]
    fn test_parse_missing_top_level_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = parse_requirements_file(&dir.path().join("nope.txt"));
        assert!(matches!(result, Err(RequirementsError::NotFound { .. })));
    }

    #[test]
    fn test_install_options_prepend_file_options() {
        let requirements = Requirements {
            pip_options: vec!["--pre".into()],
            ..Requirements::default()
        };
        assert_eq!(
            requirements.install_options(&["--user".into()]),
            vec!["--pre", "--user"]
        );
    }

    #[test]
    fn test_editable_source_forms() {
        assert_eq!(editable_source("-e ./pkg"), Some("./pkg"));
        assert_eq!(editable_source("--editable ./pkg"), Some("./pkg"));
        assert_eq!(editable_source("--editable=./pkg"), Some("./pkg"));
        assert_eq!(editable_source("requests"), None);
        assert_eq!(editable_source("-e"), None);
        assert_eq!(editable_source("-extra"), None);
    }
}
