//! `#IF [NOT] EXIST <path>:` line guards.
//!
//! The guard ends at the last `:` before the first assignment sign, so
//! drive letters and other colons inside the path are kept:
//!
//! ```text
//! #IF EXIST C:\data\kh.asc: K=C:\data\kh.asc
//! #IF NOT EXIST out\K.ASC: #IF EXIST kh.asc: K=kh.asc * 2
//! ```

use std::fmt;
use std::path::Path;

use super::expand::{escape_operators, expand_env, restore_operators, strip_quotes};
use crate::error::ScriptError;
use crate::grid::resolve_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Exist,
}

/// A parsed guard clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precondition {
    pub negated: bool,
    pub keyword: Keyword,
    pub argument: String,
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let not = if self.negated { "NOT " } else { "" };
        match self.keyword {
            Keyword::Exist => write!(f, "{not}EXIST {}", self.argument),
        }
    }
}

impl Precondition {
    /// Evaluate the guard; relative paths hang off `base`.
    pub fn holds(&self, base: &Path) -> bool {
        let result = match self.keyword {
            Keyword::Exist => {
                let arg = expand_env(strip_quotes(&self.argument));
                resolve_path(base, &arg).exists()
            }
        };
        result != self.negated
    }
}

/// Outcome of peeling the guards off a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// All guards hold (or there were none); run the residual text.
    Proceed(String),
    /// This guard failed; the line is skipped.
    Skip(Precondition),
}

pub fn has_precondition(line: &str) -> bool {
    line.trim_start()
        .get(..3)
        .map_or(false, |h| h.eq_ignore_ascii_case("#IF"))
}

/// Split `#IF <clause>: <rest>` into the parsed clause and `<rest>`.
pub fn split_precondition(line: &str) -> Result<(Precondition, String), ScriptError> {
    if !has_precondition(line) {
        return Err(ScriptError::syntax(format!("not a precondition: {}", line.trim())));
    }
    let escaped = escape_operators(line.trim_start());
    let body = &escaped[3..];
    let limit = body.find('=').unwrap_or(body.len());
    let last = body[..limit]
        .rfind(':')
        .ok_or_else(|| ScriptError::syntax(format!("precondition without ':' in {}", line.trim())))?;
    // A nested guard ends this clause at the colon in front of it.
    let colon = body[..last]
        .match_indices(':')
        .map(|(i, _)| i)
        .find(|&i| has_precondition(&body[i + 1..]))
        .unwrap_or(last);
    let clause = parse_clause(&restore_operators(&body[..colon]))?;
    let rest = restore_operators(body[colon + 1..].trim());
    Ok((clause, rest))
}

/// Parse `[NOT] EXIST <path>`.
pub fn parse_clause(clause: &str) -> Result<Precondition, ScriptError> {
    let mut rest = clause.trim();
    let mut negated = false;
    if let Some(after) = strip_keyword(rest, "NOT") {
        negated = true;
        rest = after;
    }
    let Some(argument) = strip_keyword(rest, "EXIST") else {
        return Err(ScriptError::syntax(format!("unknown precondition '{}'", clause.trim())));
    };
    if argument.is_empty() {
        return Err(ScriptError::syntax("EXIST needs a path"));
    }
    Ok(Precondition { negated, keyword: Keyword::Exist, argument: argument.to_owned() })
}

/// Strip a leading keyword followed by whitespace (or the end).
fn strip_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    let head = s.get(..keyword.len())?;
    let tail = &s[keyword.len()..];
    (head.eq_ignore_ascii_case(keyword) && (tail.is_empty() || tail.starts_with(char::is_whitespace)))
        .then(|| tail.trim_start())
}

/// Peel every leading guard off `line`, evaluating each in turn.
pub fn resolve(line: &str, base: &Path) -> Result<Resolution, ScriptError> {
    let mut current = line.trim().to_owned();
    while has_precondition(&current) {
        let (clause, rest) = split_precondition(&current)?;
        if !clause.holds(base) {
            return Ok(Resolution::Skip(clause));
        }
        current = rest;
    }
    Ok(Resolution::Proceed(current))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colon_before_assignment_is_the_split() {
        let (c, rest) = split_precondition(r"#IF EXIST C:\missing\file.txt: X=1").unwrap();
        assert_eq!(c.argument, r"C:\missing\file.txt");
        assert!(!c.negated);
        assert_eq!(rest, "X=1");
    }

    #[test]
    fn comparison_operators_do_not_end_the_clause() {
        let (c, rest) = split_precondition("#if not exist a.asc: X = if(A==1, B, C)").unwrap();
        assert!(c.negated);
        assert_eq!(c.argument, "a.asc");
        assert_eq!(rest, "X = if(A==1, B, C)");
    }

    #[test]
    fn missing_colon_is_syntax_error() {
        let e = split_precondition("#IF EXIST a.asc X=1").unwrap_err();
        assert!(matches!(e, ScriptError::Syntax { .. }));
    }

    #[test]
    fn unknown_keyword_is_syntax_error() {
        assert!(parse_clause("DEFINED K").is_err());
        assert!(parse_clause("NOT").is_err());
        assert!(parse_clause("EXISTS a").is_err());
    }

    #[test]
    fn missing_path_skips() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolve("#IF EXIST nowhere/file.txt: X=1", dir.path()).unwrap();
        assert!(matches!(r, Resolution::Skip(_)));
    }

    #[test]
    fn negated_existing_path_skips() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("k.asc"), "x").unwrap();
        let r = resolve("#IF NOT EXIST k.asc: X=1", dir.path()).unwrap();
        assert_eq!(
            r,
            Resolution::Skip(Precondition {
                negated: true,
                keyword: Keyword::Exist,
                argument: "k.asc".into(),
            })
        );
    }

    #[test]
    fn directories_count_as_existing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let r = resolve(r#"#IF EXIST "sub": X=1"#, dir.path()).unwrap();
        assert_eq!(r, Resolution::Proceed("X=1".into()));
    }

    #[test]
    fn nested_guards_resolve_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.asc"), "x").unwrap();
        let r = resolve("#IF EXIST a.asc: #IF NOT EXIST b.asc: X=a.asc", dir.path()).unwrap();
        assert_eq!(r, Resolution::Proceed("X=a.asc".into()));

        let r = resolve("#IF EXIST a.asc: #IF EXIST b.asc: X=a.asc", dir.path()).unwrap();
        assert!(matches!(r, Resolution::Skip(Precondition { negated: false, .. })));
    }

    #[test]
    fn display_round_trips_clause() {
        let c = parse_clause("not exist x.asc").unwrap();
        assert_eq!(c.to_string(), "NOT EXIST x.asc");
    }
}
