//! Interpreter settings and the settings-file loader.
//!
//! [`Settings`] is a plain value handed to
//! [`Interpreter::new`](crate::script::Interpreter::new); nothing is read
//! from global state while a script runs.
//!
//! A settings file holds `key=value` lines:
//!
//! | Key          | Value                          |
//! |--------------|--------------------------------|
//! | `quiet`      | `off`, `exit` or `skip`        |
//! | `decimals`   | number of decimals, or `none`  |
//! | `metadata`   | boolean                        |
//! | `debug`      | boolean                        |
//! | `basepath`   | directory                      |
//! | `outputpath` | directory                      |
//!
//! Lines starting with `;` or `#` are comments.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

// ── Public API ────────────────────────────────────────────────────────────────

/// How a missing file or variable is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuietMode {
    /// Fatal error.
    #[default]
    Off,
    /// Stop the whole run without reporting a failure.
    SilentExit,
    /// Warn, leave the target unbound and continue.
    SilentSkip,
}

impl FromStr for QuietMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "0" | "no" => Ok(QuietMode::Off),
            "exit" | "1" => Ok(QuietMode::SilentExit),
            "skip" | "2" => Ok(QuietMode::SilentSkip),
            other => Err(format!("invalid quiet mode '{other}' (expected off, exit or skip)")),
        }
    }
}

/// A non-fatal error encountered while loading a settings file.
#[derive(Debug, Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// Everything the interpreter needs to know besides the script itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub quiet: QuietMode,
    /// Round computed grids to this many decimals before writing.
    pub decimal_count: Option<u32>,
    /// Write a `.MET` sidecar next to each computed grid.
    pub write_metadata: bool,
    /// Log comments and skipped lines; write an `_expanded` script copy.
    pub debug: bool,
    /// Base for relative input paths.  Defaults to the script directory.
    pub base_path: Option<PathBuf>,
    /// Root for written grids.  Defaults to the base path.
    pub output_path: Option<PathBuf>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a settings string.  Bad lines are collected, not fatal.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut settings = Settings::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                errors.push(ConfigError {
                    line: i + 1,
                    message: format!("expected key=value, got '{line}'"),
                });
                continue;
            };
            if let Err(message) = settings.apply(key.trim(), value.trim()) {
                errors.push(ConfigError { line: i + 1, message });
            }
        }

        (settings, errors)
    }

    /// Read and parse a settings file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    /// Set one key.  Keys are case-insensitive.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key.to_ascii_lowercase().as_str() {
            "quiet" => self.quiet = value.parse()?,
            "decimals" | "decimalcount" => {
                self.decimal_count = if value.eq_ignore_ascii_case("none") || value.is_empty() {
                    None
                } else {
                    Some(
                        value
                            .parse()
                            .map_err(|_| format!("invalid decimal count '{value}'"))?,
                    )
                };
            }
            "metadata" => self.write_metadata = parse_bool(value)?,
            "debug" => self.debug = parse_bool(value)?,
            "basepath" => self.base_path = Some(PathBuf::from(value)),
            "outputpath" => self.output_path = Some(PathBuf::from(value)),
            other => return Err(format!("unknown setting '{other}'")),
        }
        Ok(())
    }

    /// The effective base path for a script at `script` (if any).
    pub fn resolved_base(&self, script: Option<&Path>) -> PathBuf {
        if let Some(base) = &self.base_path {
            return base.clone();
        }
        script
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// The effective output root, given the resolved base path.
    pub fn resolved_output(&self, base: &Path) -> PathBuf {
        match &self.output_path {
            Some(out) if out.is_absolute() => out.clone(),
            Some(out) => base.join(out),
            None => base.to_path_buf(),
        }
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("invalid boolean '{other}'")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
