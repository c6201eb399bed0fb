//! Candidate selection through `pip install --dry-run --report -`.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{PackageResolver, ResolveError, ResolvedPackage, resolution_options};
use crate::filename::archive_filename_from_url;
use crate::verify::DigestSpec;

/// Subset of pip's installation report that rpip reads.
#[derive(Debug, Deserialize)]
struct InstallReport {
    #[serde(default)]
    install: Vec<InstallItem>,
}

#[derive(Debug, Deserialize)]
struct InstallItem {
    download_info: DownloadInfo,
}

#[derive(Debug, Deserialize)]
struct DownloadInfo {
    url: String,
    #[serde(default)]
    archive_info: Option<ArchiveInfo>,
}

#[derive(Debug, Deserialize)]
struct ArchiveInfo {
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    hashes: HashMap<String, String>,
}

impl ArchiveInfo {
    /// `hash` when present, otherwise the strongest entry of `hashes`.
    fn digest(&self) -> Option<DigestSpec> {
        if let Some(hash) = self.hash.as_deref().filter(|h| !h.trim().is_empty()) {
            return Some(DigestSpec::parse(hash));
        }
        ["sha256", "sha512", "md5"].iter().find_map(|name| {
            self.hashes
                .get(*name)
                .map(|value| DigestSpec::parse(&format!("{name}={value}")))
        })
    }
}

/// Resolver backed by the target interpreter's pip.
#[derive(Debug, Clone)]
pub struct PipResolver {
    python: PathBuf,
}

impl PipResolver {
    /// Creates a resolver that runs `<python> -m pip`.
    #[must_use]
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }
}

#[async_trait]
impl PackageResolver for PipResolver {
    #[instrument(skip(self, options), fields(python = %self.python.display()))]
    async fn resolve(
        &self,
        spec: &str,
        options: &[String],
    ) -> Result<ResolvedPackage, ResolveError> {
        let forwarded = resolution_options(options);
        debug!(?forwarded, "resolving with pip dry-run report");

        let output = Command::new(&self.python)
            .args(["-m", "pip", "install", spec])
            .args(["--ignore-installed", "--dry-run", "--no-deps", "--report", "-"])
            .args(&forwarded)
            .output()
            .await
            .map_err(|source| ResolveError::Spawn {
                python: self.python.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ResolveError::PipFailed {
                spec: spec.to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            });
        }

        parse_report(spec, &String::from_utf8_lossy(&output.stdout))
    }
}

/// Extracts the chosen archive from pip's report output.
///
/// pip may print notices around the report, so only the text between the
/// first `{` and the last `}` is parsed.
///
/// # Errors
///
/// Returns a [`ResolveError`] when no JSON object is present, when it does
/// not parse, when nothing would be installed, or when the URL has no usable
/// file name.
pub fn parse_report(spec: &str, stdout: &str) -> Result<ResolvedPackage, ResolveError> {
    let json = match (stdout.find('{'), stdout.rfind('}')) {
        (Some(start), Some(end)) if start < end => &stdout[start..=end],
        _ => {
            return Err(ResolveError::MissingReport {
                spec: spec.to_string(),
            });
        }
    };

    let report: InstallReport =
        serde_json::from_str(json).map_err(|source| ResolveError::MalformedReport {
            spec: spec.to_string(),
            source,
        })?;

    let Some(item) = report.install.into_iter().next() else {
        return Err(ResolveError::NoCandidate {
            spec: spec.to_string(),
        });
    };

    let info = item.download_info;
    let Some(filename) = archive_filename_from_url(&info.url) else {
        return Err(ResolveError::NoFilename {
            spec: spec.to_string(),
            url: info.url,
        });
    };
    let digest = info.archive_info.as_ref().and_then(ArchiveInfo::digest);

    Ok(ResolvedPackage {
        url: info.url,
        filename,
        digest,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::verify::DigestAlgorithm;

    const WHEEL_URL: &str = "https://files.example.org/packages/ab/cd/requests-2.31.0-py3-none-any.whl";

    fn report(download_info: &str) -> String {
        format!(r#"{{"version": "1", "install": [{{"download_info": {download_info}}}]}}"#)
    }

    #[test]
    fn test_parse_report_extracts_url_filename_and_hash() {
        let stdout = report(&format!(
            r#"{{"url": "{WHEEL_URL}", "archive_info": {{"hash": "sha256=ABC123"}}}}"#
        ));
        let resolved = parse_report("requests", &stdout).unwrap();
        assert_eq!(resolved.url, WHEEL_URL);
        assert_eq!(resolved.filename, "requests-2.31.0-py3-none-any.whl");
        let digest = resolved.digest.unwrap();
        assert_eq!(digest.algorithm, DigestAlgorithm::Sha256);
        assert_eq!(digest.expected, "abc123");
    }

    #[test]
    fn test_parse_report_ignores_surrounding_noise() {
        let stdout = format!(
            "WARNING: pip is out of date\n{}\n[notice] done\n",
            report(&format!(r#"{{"url": "{WHEEL_URL}"}}"#))
        );
        let resolved = parse_report("requests", &stdout).unwrap();
        assert_eq!(resolved.filename, "requests-2.31.0-py3-none-any.whl");
        assert!(resolved.digest.is_none());
    }

    #[test]
    fn test_parse_report_falls_back_to_hashes_map() {
        let stdout = report(&format!(
            r#"{{"url": "{WHEEL_URL}", "archive_info": {{"hashes": {{"sha512": "ff"}}}}}}"#
        ));
        let digest = parse_report("requests", &stdout).unwrap().digest.unwrap();
        assert_eq!(digest.algorithm, DigestAlgorithm::Sha512);
        assert_eq!(digest.expected, "ff");
    }

    #[test]
    fn test_parse_report_decodes_percent_escapes_in_filename() {
        let stdout = report(
            r#"{"url": "https://download.pytorch.org/whl/cu118/torch-2.1.0%2Bcu118-cp311-cp311-linux_x86_64.whl"}"#,
        );
        let resolved = parse_report("torch", &stdout).unwrap();
        assert_eq!(
            resolved.filename,
            "torch-2.1.0+cu118-cp311-cp311-linux_x86_64.whl"
        );
    }

    #[test]
    fn test_parse_report_without_json_is_missing_report() {
        let result = parse_report("requests", "ERROR: something went wrong");
        assert!(matches!(result, Err(ResolveError::MissingReport { .. })));
    }

    #[test]
    fn test_parse_report_with_broken_json_is_malformed() {
        let result = parse_report("requests", "{ not json }");
        assert!(matches!(result, Err(ResolveError::MalformedReport { .. })));
    }

    #[test]
    fn test_parse_report_with_empty_install_is_no_candidate() {
        let result = parse_report("requests", r#"{"install": []}"#);
        assert!(matches!(result, Err(ResolveError::NoCandidate { .. })));
    }

    #[test]
    fn test_parse_report_without_download_info_is_malformed() {
        let result = parse_report("requests", r#"{"install": [{"metadata": {}}]}"#);
        assert!(matches!(result, Err(ResolveError::MalformedReport { .. })));
    }

    #[test]
    fn test_parse_report_with_directory_url_has_no_filename() {
        let stdout = report(r#"{"url": "https://example.com/simple/"}"#);
        let result = parse_report("requests", &stdout);
        assert!(matches!(result, Err(ResolveError::NoFilename { .. })));
    }
}
