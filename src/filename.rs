//! Archive filename derivation.
//!
//! Resuming depends on the same package spec producing the same target
//! path on every run, so the name is taken from the URL alone and never
//! from response headers or timestamps.

use std::path::{Component, Path};

use tracing::debug;
use url::Url;

/// Derives the archive filename from the last URL path segment, percent-decoded.
///
/// Returns `None` when the URL cannot be parsed or its path ends without a
/// usable segment (e.g. `https://host/simple/`).
#[must_use]
pub fn archive_filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }

    let decoded = urlencoding::decode(last).unwrap_or_else(|e| {
        debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
        last.into()
    });
    let sanitized = sanitize_filename(&decoded);
    if sanitized.trim_matches('_').is_empty() {
        return None;
    }
    Some(sanitized)
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_filename_uses_last_segment() {
        let url = "https://files.pythonhosted.org/packages/ab/cd/torch-2.1.0-cp311-cp311-manylinux1_x86_64.whl";
        assert_eq!(
            archive_filename_from_url(url).unwrap(),
            "torch-2.1.0-cp311-cp311-manylinux1_x86_64.whl"
        );
    }

    #[test]
    fn test_archive_filename_is_percent_decoded() {
        let url = "https://download.pytorch.org/whl/cu118/torch-2.1.0%2Bcu118-cp311-cp311-linux_x86_64.whl";
        assert_eq!(
            archive_filename_from_url(url).unwrap(),
            "torch-2.1.0+cu118-cp311-cp311-linux_x86_64.whl"
        );
    }

    #[test]
    fn test_archive_filename_ignores_query_and_fragment() {
        let url = "https://example.com/pkg/demo-1.0.tar.gz?token=abc#sha256=00";
        assert_eq!(archive_filename_from_url(url).unwrap(), "demo-1.0.tar.gz");
    }

    #[test]
    fn test_archive_filename_rejects_trailing_slash() {
        assert!(archive_filename_from_url("https://example.com/simple/").is_none());
    }

    #[test]
    fn test_archive_filename_rejects_unparsable_url() {
        assert!(archive_filename_from_url("not a url").is_none());
    }

    #[test]
    fn test_archive_filename_cannot_escape_directory() {
        let name = archive_filename_from_url("https://example.com/x/..%2F..%2Fetc%2Fpasswd").unwrap();
        assert!(!name.contains('/'), "separator survived: {name}");
        assert_eq!(name, ".._.._etc_passwd");
    }

    #[test]
    fn test_archive_filename_is_stable_across_calls() {
        let url = "https://example.com/a/numpy-1.26.0.tar.gz";
        assert_eq!(archive_filename_from_url(url), archive_filename_from_url(url));
    }

    #[test]
    fn test_sanitize_filename_rewrites_dot_segments() {
        assert_eq!(sanitize_filename("."), "_");
        assert_eq!(sanitize_filename(".."), "__");
    }

    #[test]
    fn test_sanitize_filename_replaces_control_chars() {
        assert_eq!(sanitize_filename("a\u{0}b.whl"), "a_b.whl");
    }
}
