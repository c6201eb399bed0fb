//! Configuration file loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use rpip_core::BackendChoice;

/// Backend requested by configuration or `--backend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendSetting {
    /// Probe the search path.
    #[default]
    Auto,
    /// Use this backend when available.
    Forced(BackendChoice),
}

impl FromStr for BackendSetting {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        value.parse::<BackendChoice>().map(Self::Forced)
    }
}

/// `config.toml` values; every field is optional.
#[derive(Debug, Clone, Default)]
pub(crate) struct FileConfig {
    /// Interpreter whose pip resolves and installs packages.
    pub(crate) python: Option<PathBuf>,
    /// Transfer backend.
    pub(crate) backend: Option<BackendSetting>,
    /// Where archives are downloaded.
    pub(crate) download_dir: Option<PathBuf>,
    /// Built-in transfer connect timeout in seconds.
    pub(crate) connect_timeout_secs: Option<u64>,
    /// Built-in transfer read timeout in seconds.
    pub(crate) read_timeout_secs: Option<u64>,
    /// Default verbosity mode.
    pub(crate) verbosity: Option<VerbositySetting>,
}

fn validate_timeout_secs(field: &str, value: u64, line_number: usize) -> Result<u64> {
    if !(1..=3600).contains(&value) {
        bail!(
            "Invalid config value for `{field}` on line {line_number}: {value}. Expected range: 1..=3600"
        );
    }
    Ok(value)
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Log level this setting maps to.
    #[must_use]
    pub(crate) fn log_level(self) -> &'static str {
        match self {
            Self::Default => "warn",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Resolves the config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/rpip/config.toml`
/// 2. `$HOME/.config/rpip/config.toml`
#[must_use]
pub(crate) fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("rpip").join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("rpip")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path; a missing file yields `None`.
pub(crate) fn load_default_file_config() -> Result<Option<FileConfig>> {
    let Some(path) = resolve_default_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    load_file_config(&path).map(Some)
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_number = line_index + 1;

        match key {
            "python" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `python` value on line {line_number}"))?;
                cfg.python = Some(PathBuf::from(parsed));
            }
            "backend" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `backend` value on line {line_number}"))?;
                let setting = parsed.parse::<BackendSetting>().map_err(|reason| {
                    anyhow::anyhow!("Invalid `backend` value on line {line_number}: {reason}")
                })?;
                cfg.backend = Some(setting);
            }
            "download_dir" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `download_dir` value on line {line_number}")
                })?;
                cfg.download_dir = Some(PathBuf::from(parsed));
            }
            "connect_timeout_secs" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!("Invalid `connect_timeout_secs` value on line {line_number}")
                })?;
                cfg.connect_timeout_secs =
                    Some(validate_timeout_secs("connect_timeout_secs", parsed, line_number)?);
            }
            "read_timeout_secs" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!("Invalid `read_timeout_secs` value on line {line_number}")
                })?;
                cfg.read_timeout_secs =
                    Some(validate_timeout_secs("read_timeout_secs", parsed, line_number)?);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `verbosity` value on line {line_number}"))?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_number}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_number}");
            }
        }
    }
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}
