//! Script lines and line classification.
//!
//! A script is a sequence of lines.  A line whose text ends in `_` continues
//! on the next line.  After substitution every non-blank line is one of:
//!
//! | Form                          | Meaning                          |
//! |-------------------------------|----------------------------------|
//! | `REM …`, `// …`, `' …`        | comment                          |
//! | `FOR <var>=<start> TO <end>`  | loop header                      |
//! | `ENDFOR`                      | loop end                         |
//! | `<name>=<expression>`         | assignment                       |
//!
//! Preconditions (`#IF …:`) are peeled off by
//! [`precond`](super::precond) before classification.

use std::sync::OnceLock;

use regex::Regex;

use super::expand::{escape_operators, restore_operators};
use crate::error::ScriptError;

/// A logical script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    /// 1-based number of the first physical line.
    pub number: usize,
    pub text: String,
}

/// A classified line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    For(ForHeader),
    EndFor,
    Assignment(Assignment),
}

/// `FOR <var>=<start> TO <end>` with the bounds still as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForHeader {
    pub var: String,
    pub start: String,
    pub end: String,
}

/// `<target>=<expression>` with comparison operators restored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub target: String,
    pub expression: String,
}

// ── Reading ───────────────────────────────────────────────────────────────────

/// Split `src` into logical lines, joining `_` continuations.
pub fn join_continuations(src: &str) -> Vec<ScriptLine> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut first: Option<usize> = None;

    for (i, line) in src.lines().enumerate() {
        let trimmed = line.trim_end();
        first.get_or_insert(i + 1);
        if let Some(stripped) = trimmed.strip_suffix('_') {
            current.push_str(stripped);
        } else {
            current.push_str(trimmed);
            lines.push(ScriptLine {
                number: first.take().unwrap_or(i + 1),
                text: std::mem::take(&mut current),
            });
        }
    }
    if let Some(number) = first {
        lines.push(ScriptLine { number, text: current });
    }
    lines
}

// ── Classification ────────────────────────────────────────────────────────────

/// If `line` is a comment, return its text with the marker stripped.
pub fn comment_text(line: &str) -> Option<&str> {
    let t = line.trim_start();
    if let Some(rest) = t.strip_prefix("//").or_else(|| t.strip_prefix('\'')) {
        return Some(rest.trim());
    }
    let head = t.get(..3)?;
    if head.eq_ignore_ascii_case("REM") {
        let rest = &t[3..];
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return Some(rest.trim());
        }
    }
    None
}

fn for_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^FOR\s+([A-Za-z_]\w*)\s*=\s*(.+?)\s+TO\s+(.+?)\s*$")
            .expect("FOR pattern is valid")
    })
}

/// Whether `line` starts a loop (used by the skip scan on raw lines).
pub fn is_for(line: &str) -> bool {
    let t = line.trim_start();
    t.get(..3).map_or(false, |h| h.eq_ignore_ascii_case("FOR"))
        && t[3..].starts_with(char::is_whitespace)
}

pub fn is_endfor(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("ENDFOR")
}

/// Parse a FOR header.
pub fn parse_for(line: &str) -> Result<ForHeader, ScriptError> {
    let caps = for_regex()
        .captures(line.trim())
        .ok_or_else(|| ScriptError::syntax(format!("invalid FOR statement: {}", line.trim())))?;
    Ok(ForHeader {
        var: caps[1].to_owned(),
        start: caps[2].to_owned(),
        end: caps[3].to_owned(),
    })
}

/// Split `line` at the first assignment sign.
pub fn parse_assignment(line: &str) -> Option<Assignment> {
    let escaped = escape_operators(line);
    let (target, expression) = escaped.split_once('=')?;
    Some(Assignment {
        target: restore_operators(target.trim()),
        expression: restore_operators(expression.trim()),
    })
}

/// Classify a substituted, precondition-free line.
pub fn classify(line: &str) -> Result<Statement, ScriptError> {
    if is_endfor(line) {
        return Ok(Statement::EndFor);
    }
    if is_for(line) {
        return parse_for(line).map(Statement::For);
    }
    parse_assignment(line)
        .map(Statement::Assignment)
        .ok_or_else(|| ScriptError::syntax(format!("unrecognised statement: {}", line.trim())))
}

/// Index of the `ENDFOR` matching the `FOR` at `for_index`, balancing
/// nested loops.  Comments are ignored.
pub fn find_matching_endfor(lines: &[ScriptLine], for_index: usize) -> Result<usize, ScriptError> {
    let mut depth = 1usize;
    for (i, line) in lines.iter().enumerate().skip(for_index + 1) {
        let text = line.text.trim();
        if comment_text(text).is_some() {
            continue;
        }
        if is_for(text) {
            depth += 1;
        } else if is_endfor(text) {
            depth -= 1;
            if depth == 0 {
                return Ok(i);
            }
        }
    }
    Err(ScriptError::syntax("FOR without matching ENDFOR"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[ScriptLine]) -> Vec<(usize, &str)> {
        lines.iter().map(|l| (l.number, l.text.as_str())).collect()
    }

    #[test]
    fn continuation_keeps_first_line_number() {
        let lines = join_continuations("A=1\nB=A + _\n  2 + _\n  3\nC=B\n");
        assert_eq!(texts(&lines), vec![(1, "A=1"), (2, "B=A +   2 +   3"), (5, "C=B")]);
    }

    #[test]
    fn trailing_continuation_is_kept() {
        let lines = join_continuations("A=1 + _");
        assert_eq!(texts(&lines), vec![(1, "A=1 + ")]);
    }

    #[test]
    fn identifiers_ending_in_underscore_continue() {
        // A trailing underscore always continues, even after a name.
        let lines = join_continuations("X=K_\n+1");
        assert_eq!(texts(&lines), vec![(1, "X=K+1")]);
    }

    #[test]
    fn comment_markers() {
        assert_eq!(comment_text("REM  layer loop "), Some("layer loop"));
        assert_eq!(comment_text("rem"), Some(""));
        assert_eq!(comment_text("// note"), Some("note"));
        assert_eq!(comment_text("' note"), Some("note"));
        assert_eq!(comment_text("REMAINDER=K"), None);
        assert_eq!(comment_text("K=1"), None);
    }

    #[test]
    fn parse_for_header() {
        let h = parse_for("for ilay = 1 to count(kh, *.asc)").unwrap();
        assert_eq!(h.var, "ilay");
        assert_eq!(h.start, "1");
        assert_eq!(h.end, "count(kh, *.asc)");
    }

    #[test]
    fn malformed_for_is_syntax_error() {
        let e = parse_for("FOR i 1 TO 3").unwrap_err();
        assert!(matches!(e, ScriptError::Syntax { .. }));
    }

    #[test]
    fn classify_lines() {
        assert_eq!(classify("ENDFOR").unwrap(), Statement::EndFor);
        assert!(matches!(classify("FOR i=1 TO 3").unwrap(), Statement::For(_)));
        assert_eq!(
            classify("X = if(A==1, B, C)").unwrap(),
            Statement::Assignment(Assignment {
                target: "X".into(),
                expression: "if(A==1, B, C)".into(),
            })
        );
        assert!(classify("FORMULA=1").is_ok());
        assert!(classify("just words").is_err());
    }

    #[test]
    fn comparison_only_line_is_not_an_assignment() {
        assert!(classify("A==B").is_err());
    }

    #[test]
    fn matching_endfor_balances_nesting() {
        let lines = join_continuations(
            "FOR i=1 TO 0\n  FOR j=1 TO 2\n  REM ENDFOR\n  X=1\n  ENDFOR\nENDFOR\nY=2\n",
        );
        assert_eq!(find_matching_endfor(&lines, 0).unwrap(), 5);
        assert_eq!(find_matching_endfor(&lines, 1).unwrap(), 4);
    }

    #[test]
    fn unbalanced_loop_is_syntax_error() {
        let lines = join_continuations("FOR i=1 TO 0\nX=1\n");
        assert!(find_matching_endfor(&lines, 0).is_err());
    }
}
