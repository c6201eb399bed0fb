//! Integrity verification of finished archives.
//!
//! Digests arrive from the resolver as `algorithm=hex` strings (pip's
//! `archive_info.hash`). The file is streamed through the named algorithm
//! and compared as lowercase hex. Only complete files are verified.
//!
//! Missing or unsupported digests are a warning, not a failure: an archive
//! without a usable digest is installed unchecked rather than refused.

mod error;

pub use error::VerifyError;

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256, Sha512};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument, warn};

use crate::transfer::constants::CHUNK_SIZE;

/// Digest algorithm named in a digest string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    /// SHA-256, also the default when no prefix is given.
    Sha256,
    /// SHA-512.
    Sha512,
    /// MD5.
    Md5,
    /// Any other name; verification is skipped.
    Unknown(String),
}

impl DigestAlgorithm {
    fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "sha256" => Self::Sha256,
            "sha512" => Self::Sha512,
            "md5" => Self::Md5,
            _ => Self::Unknown(name.trim().to_string()),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => f.write_str("sha256"),
            Self::Sha512 => f.write_str("sha512"),
            Self::Md5 => f.write_str("md5"),
            Self::Unknown(name) => f.write_str(name),
        }
    }
}

/// Expected digest: algorithm plus lowercase hex value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestSpec {
    /// Algorithm to hash with.
    pub algorithm: DigestAlgorithm,
    /// Expected hex digest, lowercased.
    pub expected: String,
}

impl DigestSpec {
    /// Parses `algorithm=hexvalue`; a bare value is taken as sha256.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (algorithm, value) = match raw.split_once('=') {
            Some((name, value)) => (DigestAlgorithm::from_name(name), value),
            None => (DigestAlgorithm::Sha256, raw),
        };
        Self {
            algorithm,
            expected: value.trim().to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for DigestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.algorithm, self.expected)
    }
}

/// Why verification was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The resolver reported no digest.
    NoDigest,
    /// The digest names an algorithm this tool does not implement.
    UnsupportedAlgorithm(String),
}

/// Verification result. `Verified` and `Skipped` both let installation proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Computed digest equals the expected one.
    Verified {
        /// Algorithm used.
        algorithm: DigestAlgorithm,
    },
    /// Computed digest differs.
    Mismatch {
        /// Algorithm used.
        algorithm: DigestAlgorithm,
        /// Expected hex digest.
        expected: String,
        /// Computed hex digest.
        computed: String,
    },
    /// No check was performed.
    Skipped(SkipReason),
}

/// Verifies the file at `path` against `digest`.
///
/// # Errors
///
/// Returns [`VerifyError::MissingFile`] if `path` does not exist (only when a
/// supported digest requires reading it) and [`VerifyError::Io`] for read
/// failures. A mismatch is an `Ok` outcome, not an error.
#[instrument(skip(digest), fields(path = %path.display()))]
pub async fn verify_file(
    path: &Path,
    digest: Option<&DigestSpec>,
) -> Result<VerifyOutcome, VerifyError> {
    let Some(digest) = digest else {
        debug!("no digest available");
        return Ok(VerifyOutcome::Skipped(SkipReason::NoDigest));
    };

    let computed = match &digest.algorithm {
        DigestAlgorithm::Sha256 => hash_file::<Sha256>(path).await?,
        DigestAlgorithm::Sha512 => hash_file::<Sha512>(path).await?,
        DigestAlgorithm::Md5 => md5_file(path).await?,
        DigestAlgorithm::Unknown(name) => {
            warn!(algorithm = %name, "unsupported digest algorithm, skipping verification");
            return Ok(VerifyOutcome::Skipped(SkipReason::UnsupportedAlgorithm(
                name.clone(),
            )));
        }
    };

    if computed == digest.expected {
        debug!(algorithm = %digest.algorithm, "digest matches");
        Ok(VerifyOutcome::Verified {
            algorithm: digest.algorithm.clone(),
        })
    } else {
        warn!(
            algorithm = %digest.algorithm,
            expected = %digest.expected,
            computed = %computed,
            "digest mismatch"
        );
        Ok(VerifyOutcome::Mismatch {
            algorithm: digest.algorithm.clone(),
            expected: digest.expected.clone(),
            computed,
        })
    }
}

async fn open(path: &Path) -> Result<File, VerifyError> {
    File::open(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            VerifyError::missing_file(path)
        } else {
            VerifyError::io(path, e)
        }
    })
}

async fn hash_file<D: Digest>(path: &Path) -> Result<String, VerifyError> {
    let mut file = open(path).await?;
    let mut hasher = D::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file
            .read(&mut buffer)
            .await
            .map_err(|e| VerifyError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(to_hex(&hasher.finalize()))
}

async fn md5_file(path: &Path) -> Result<String, VerifyError> {
    let mut file = open(path).await?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file
            .read(&mut buffer)
            .await
            .map_err(|e| VerifyError::io(path, e))?;
        if n == 0 {
            break;
        }
        context.consume(&buffer[..n]);
    }
    Ok(format!("{:x}", context.compute()))
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;
    use tempfile::NamedTempFile;

    const HELLO_SHA256: &str = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";
    const HELLO_MD5: &str = "65a8e27d8879283831b664bd8b7f0ad4";

    fn hello_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Hello, World!").unwrap();
        file
    }

    #[test]
    fn test_parse_prefixed_digest() {
        let spec = DigestSpec::parse("sha512=ABCdef");
        assert_eq!(spec.algorithm, DigestAlgorithm::Sha512);
        assert_eq!(spec.expected, "abcdef");
    }

    #[test]
    fn test_parse_bare_digest_defaults_to_sha256() {
        let spec = DigestSpec::parse(HELLO_SHA256);
        assert_eq!(spec.algorithm, DigestAlgorithm::Sha256);
        assert_eq!(spec.expected, HELLO_SHA256);
    }

    #[test]
    fn test_parse_unknown_algorithm_is_kept() {
        let spec = DigestSpec::parse("foo=bar");
        assert_eq!(spec.algorithm, DigestAlgorithm::Unknown("foo".to_string()));
        assert_eq!(spec.to_string(), "foo=bar");
    }

    #[tokio::test]
    async fn test_verify_sha256_match() {
        let file = hello_file();
        let spec = DigestSpec::parse(&format!("sha256={HELLO_SHA256}"));
        let outcome = verify_file(file.path(), Some(&spec)).await.unwrap();
        assert_eq!(
            outcome,
            VerifyOutcome::Verified {
                algorithm: DigestAlgorithm::Sha256
            }
        );
    }

    #[tokio::test]
    async fn test_verify_is_case_insensitive() {
        let file = hello_file();
        let spec = DigestSpec::parse(&format!("SHA256={}", HELLO_SHA256.to_uppercase()));
        let outcome = verify_file(file.path(), Some(&spec)).await.unwrap();
        assert!(matches!(outcome, VerifyOutcome::Verified { .. }));
    }

    #[tokio::test]
    async fn test_verify_every_flipped_character_mismatches() {
        let file = hello_file();
        for index in [0, 17, HELLO_SHA256.len() - 1] {
            let mut chars: Vec<char> = HELLO_SHA256.chars().collect();
            chars[index] = if chars[index] == '0' { '1' } else { '0' };
            let wrong: String = chars.into_iter().collect();
            let spec = DigestSpec::parse(&format!("sha256={wrong}"));
            let outcome = verify_file(file.path(), Some(&spec)).await.unwrap();
            match outcome {
                VerifyOutcome::Mismatch {
                    expected, computed, ..
                } => {
                    assert_eq!(expected, wrong);
                    assert_eq!(computed, HELLO_SHA256);
                }
                other => panic!("expected mismatch at {index}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_verify_md5_match() {
        let file = hello_file();
        let spec = DigestSpec::parse(&format!("md5={HELLO_MD5}"));
        let outcome = verify_file(file.path(), Some(&spec)).await.unwrap();
        assert!(matches!(outcome, VerifyOutcome::Verified { .. }));
    }

    #[tokio::test]
    async fn test_verify_sha512_matches_direct_hash() {
        let file = hello_file();
        let expected = to_hex(&Sha512::digest(b"Hello, World!"));
        let spec = DigestSpec::parse(&format!("sha512={expected}"));
        let outcome = verify_file(file.path(), Some(&spec)).await.unwrap();
        assert!(matches!(outcome, VerifyOutcome::Verified { .. }));
    }

    #[tokio::test]
    async fn test_verify_absent_digest_is_skipped() {
        let outcome = verify_file(Path::new("does-not-matter.whl"), None)
            .await
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::Skipped(SkipReason::NoDigest));
    }

    #[tokio::test]
    async fn test_verify_unknown_algorithm_is_skipped() {
        let file = hello_file();
        let spec = DigestSpec::parse("foo=bar");
        let outcome = verify_file(file.path(), Some(&spec)).await.unwrap();
        assert_eq!(
            outcome,
            VerifyOutcome::Skipped(SkipReason::UnsupportedAlgorithm("foo".to_string()))
        );
    }

    #[tokio::test]
    async fn test_verify_missing_file_is_distinct_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let spec = DigestSpec::parse(HELLO_SHA256);
        let result = verify_file(&dir.path().join("gone.whl"), Some(&spec)).await;
        assert!(matches!(result, Err(VerifyError::MissingFile { .. })));
    }
}
