//! Command-line argument parsing.
//!
//! Usage:
//!   idfexp [-d] [-m] [-q|-s] [-r<n>] [-b<dir>] [-o<dir>] [-c<file>] <script> [<outputdir>]
//!
//! | Flag       | Effect                                             |
//! |------------|----------------------------------------------------|
//! | `-d`       | debug logging and an `_expanded` script copy       |
//! | `-m`       | write `.MET` metadata next to computed grids       |
//! | `-q`       | quiet: stop silently on a missing file or variable |
//! | `-s`       | quiet: skip the assignment and continue            |
//! | `-r<n>`    | round computed grids to `n` decimals               |
//! | `-b<dir>`  | base path for relative inputs                      |
//! | `-o<dir>`  | output directory                                   |
//! | `-c<file>` | settings file, applied before the other flags      |

use std::path::PathBuf;

use crate::config::{QuietMode, Settings};

pub const USAGE: &str =
    "Usage: idfexp [-d] [-m] [-q|-s] [-r<n>] [-b<dir>] [-o<dir>] [-c<file>] <script> [<outputdir>]";

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default, PartialEq)]
pub struct CliArgs {
    pub script: PathBuf,
    /// Settings file (`-c<file>`).
    pub config: Option<PathBuf>,
    pub debug: bool,
    pub metadata: bool,
    pub quiet: Option<QuietMode>,
    pub decimals: Option<u32>,
    pub base: Option<PathBuf>,
    /// `-o<dir>`, or the second positional argument.
    pub output: Option<PathBuf>,
}

impl CliArgs {
    /// Overlay the flags onto `settings` (usually loaded from `-c`).
    pub fn apply(&self, settings: &mut Settings) {
        if self.debug {
            settings.debug = true;
        }
        if self.metadata {
            settings.write_metadata = true;
        }
        if let Some(q) = self.quiet {
            settings.quiet = q;
        }
        if let Some(d) = self.decimals {
            settings.decimal_count = Some(d);
        }
        if let Some(b) = &self.base {
            settings.base_path = Some(b.clone());
        }
        if let Some(o) = &self.output {
            settings.output_path = Some(o.clone());
        }
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or(&[]))
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            positional.extend(argv[i + 1..].iter().cloned());
            break;
        }

        // Non-flag argument.
        if !arg.starts_with('-') || arg == "-" {
            positional.push(arg.to_owned());
            i += 1;
            continue;
        }

        // Flag argument: iterate over characters after the leading `-`.
        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'd' => args.debug = true,
                'm' => args.metadata = true,
                'q' => set_quiet(&mut args, QuietMode::SilentExit)?,
                's' => set_quiet(&mut args, QuietMode::SilentSkip)?,

                // Flags taking a value: -x<value> or -x <value>.
                flag @ ('r' | 'b' | 'o' | 'c') => {
                    let value = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err(format!("-{flag} requires an argument"));
                    };
                    match flag {
                        'r' => {
                            let n = value
                                .parse()
                                .map_err(|_| format!("invalid decimal count: {value}"))?;
                            args.decimals = Some(n);
                        }
                        'b' => args.base = Some(PathBuf::from(value)),
                        'o' => args.output = Some(PathBuf::from(value)),
                        _ => args.config = Some(PathBuf::from(value)),
                    }
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    // Positional arguments → script and optional output directory.
    let mut positional = positional.into_iter();
    match positional.next() {
        Some(script) => args.script = PathBuf::from(script),
        None => return Err("no script given".to_owned()),
    }
    if let Some(out) = positional.next() {
        args.output = Some(PathBuf::from(out));
    }
    let extra = positional.count();
    if extra > 0 {
        return Err(format!("too many arguments ({})", extra + 2));
    }

    Ok(args)
}

fn set_quiet(args: &mut CliArgs, mode: QuietMode) -> Result<(), String> {
    match args.quiet {
        Some(existing) if existing != mode => Err("-q and -s are mutually exclusive".to_owned()),
        _ => {
            args.quiet = Some(mode);
            Ok(())
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn script_only() {
        let a = parse_argv(&argv(&["run.ini"])).unwrap();
        assert_eq!(a.script, PathBuf::from("run.ini"));
        assert_eq!(a.output, None);
        assert_eq!(a.quiet, None);
    }

    #[test]
    fn missing_script() {
        assert!(parse_argv(&argv(&[])).is_err());
        assert!(parse_argv(&argv(&["-d"])).is_err());
    }

    #[test]
    fn bool_flags() {
        let a = parse_argv(&argv(&["-d", "-m", "run.ini"])).unwrap();
        assert!(a.debug);
        assert!(a.metadata);
    }

    #[test]
    fn combined_bool_flags() {
        let a = parse_argv(&argv(&["-dms", "run.ini"])).unwrap();
        assert!(a.debug && a.metadata);
        assert_eq!(a.quiet, Some(QuietMode::SilentSkip));
    }

    #[test]
    fn quiet_modes_exclude_each_other() {
        assert!(parse_argv(&argv(&["-q", "-s", "run.ini"])).is_err());
        assert!(parse_argv(&argv(&["-qq", "run.ini"])).is_ok());
    }

    #[test]
    fn value_flags_embedded_and_separate() {
        let a = parse_argv(&argv(&["-r2", "-b", "/data", "-o/out", "-csettings.ini", "run.ini"]))
            .unwrap();
        assert_eq!(a.decimals, Some(2));
        assert_eq!(a.base, Some(PathBuf::from("/data")));
        assert_eq!(a.output, Some(PathBuf::from("/out")));
        assert_eq!(a.config, Some(PathBuf::from("settings.ini")));
    }

    #[test]
    fn positional_output_overrides_flag() {
        let a = parse_argv(&argv(&["-o", "a", "run.ini", "b"])).unwrap();
        assert_eq!(a.output, Some(PathBuf::from("b")));
    }

    #[test]
    fn bad_values() {
        assert!(parse_argv(&argv(&["-rx", "run.ini"])).is_err());
        assert!(parse_argv(&argv(&["run.ini", "-o"])).is_err());
    }

    #[test]
    fn too_many_positional() {
        assert!(parse_argv(&argv(&["a", "b", "c"])).is_err());
    }

    #[test]
    fn unknown_flag() {
        assert!(parse_argv(&argv(&["-z", "run.ini"])).is_err());
    }

    #[test]
    fn double_dash_ends_flags() {
        let a = parse_argv(&argv(&["--", "-odd.ini"])).unwrap();
        assert_eq!(a.script, PathBuf::from("-odd.ini"));
    }

    #[test]
    fn apply_overrides_settings() {
        let mut s = Settings { decimal_count: Some(4), ..Settings::new() };
        let a = parse_argv(&argv(&["-d", "-q", "run.ini", "out"])).unwrap();
        a.apply(&mut s);
        assert!(s.debug);
        assert_eq!(s.quiet, QuietMode::SilentExit);
        assert_eq!(s.decimal_count, Some(4));
        assert_eq!(s.output_path, Some(PathBuf::from("out")));
    }
}
