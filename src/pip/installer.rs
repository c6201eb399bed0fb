//! Installation through `<python> -m pip install`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{InstallError, PackageInstaller};

/// Installer backed by the target interpreter's pip.
///
/// pip inherits the terminal so its own progress and errors stay visible.
#[derive(Debug, Clone)]
pub struct PipInstaller {
    python: PathBuf,
}

impl PipInstaller {
    /// Creates an installer that runs `<python> -m pip install`.
    #[must_use]
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }

    async fn run_pip(&self, target: String, args: Vec<OsString>) -> Result<(), InstallError> {
        debug!(?args, "running pip install");
        let status = Command::new(&self.python)
            .args(["-m", "pip", "install"])
            .args(&args)
            .status()
            .await
            .map_err(|source| InstallError::Spawn {
                python: self.python.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(InstallError::Failed {
                target,
                code: status.code().unwrap_or(-1),
            })
        }
    }
}

#[async_trait]
impl PackageInstaller for PipInstaller {
    #[instrument(skip(self, options), fields(archive = %archive.display()))]
    async fn install_archive(
        &self,
        archive: &Path,
        options: &[String],
    ) -> Result<(), InstallError> {
        let mut args = vec![archive.as_os_str().to_owned()];
        args.extend(options.iter().map(OsString::from));
        self.run_pip(archive.display().to_string(), args).await
    }

    #[instrument(skip(self, options))]
    async fn install_editable(&self, source: &str, options: &[String]) -> Result<(), InstallError> {
        let mut args = vec![OsString::from("-e"), OsString::from(source)];
        args.extend(options.iter().map(OsString::from));
        self.run_pip(source.to_string(), args).await
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::*;
    use tempfile::TempDir;

    /// Writes a stand-in interpreter that records its argv and exits with `code`.
    fn fake_python(dir: &Path, code: i32) -> PathBuf {
        let script = dir.join("python");
        let log = dir.join("argv.log");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$@\" > '{}'\nexit {code}\n", log.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[tokio::test]
    async fn test_install_archive_passes_archive_then_options() {
        let dir = TempDir::new().unwrap();
        let installer = PipInstaller::new(fake_python(dir.path(), 0));

        installer
            .install_archive(Path::new("pkg-1.0-py3-none-any.whl"), &["--user".into()])
            .await
            .unwrap();
        let argv = std::fs::read_to_string(dir.path().join("argv.log")).unwrap();
        assert_eq!(argv.trim(), "-m pip install pkg-1.0-py3-none-any.whl --user");

        let failing_dir = TempDir::new().unwrap();
        let failing = PipInstaller::new(fake_python(failing_dir.path(), 7));
        let error = failing
            .install_editable("./src/pkg", &[])
            .await
            .unwrap_err();
        assert_eq!(error.exit_code(), Some(7));
        let argv = std::fs::read_to_string(failing_dir.path().join("argv.log")).unwrap();
        assert_eq!(argv.trim(), "-m pip install -e ./src/pkg");
    }

    #[tokio::test]
    async fn test_install_with_missing_interpreter_is_spawn_error() {
        let installer = PipInstaller::new("/nonexistent/python-for-rpip-tests");
        let error = installer
            .install_archive(Path::new("a.whl"), &[])
            .await
            .unwrap_err();
        assert!(matches!(error, InstallError::Spawn { .. }));
    }
}
