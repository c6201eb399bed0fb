//! Backend selection by probing the command search path.

use tracing::debug;

use super::BackendChoice;

/// Picks the first external tool found on `PATH`, else the built-in fallback.
///
/// Probe order is fixed: aria2c, wget, curl. Never fails.
#[must_use]
pub fn select_backend() -> BackendChoice {
    select_backend_with(|program| which::which(program).is_ok())
}

/// Same as [`select_backend`] with a caller-supplied presence probe.
#[must_use]
pub fn select_backend_with(is_present: impl Fn(&str) -> bool) -> BackendChoice {
    for tool in BackendChoice::EXTERNAL {
        if let Some(program) = tool.executable()
            && is_present(program)
        {
            debug!(backend = %tool, "selected external download tool");
            return tool;
        }
    }
    debug!("no external download tool found, using built-in transfer");
    BackendChoice::Builtin
}

/// Honours a forced backend when it is usable.
///
/// Returns `None` when `preferred` is an external tool that is not on `PATH`;
/// the caller then falls back to [`select_backend`].
#[must_use]
pub fn preferred_backend(preferred: BackendChoice) -> Option<BackendChoice> {
    preferred_backend_with(preferred, |program| which::which(program).is_ok())
}

/// Same as [`preferred_backend`] with a caller-supplied presence probe.
#[must_use]
pub fn preferred_backend_with(
    preferred: BackendChoice,
    is_present: impl Fn(&str) -> bool,
) -> Option<BackendChoice> {
    match preferred.executable() {
        None => Some(preferred),
        Some(program) if is_present(program) => Some(preferred),
        Some(program) => {
            debug!(program, "forced download tool not found");
            None
        }
    }
}
