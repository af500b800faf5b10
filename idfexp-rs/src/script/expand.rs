//! Environment-variable expansion and comparison-operator escaping.
//!
//! | Sequence  | Meaning                                                   |
//! |-----------|-----------------------------------------------------------|
//! | `%NAME%`  | Value of environment variable `NAME`; left as-is if unset |
//! | `==` `!=` `>=` `<=` | Escaped while a line is split on `=` and `:`    |
//!
//! Expansion follows the Windows rules scripts are written against: the
//! text between two `%` signs is looked up, and when it is not a defined
//! variable the first `%` is copied literally and scanning resumes at the
//! second one.  `%%` therefore never expands.

use std::sync::OnceLock;

use aho_corasick::AhoCorasick;

/// Comparison operators that contain `=`.
const OPERATORS: [&str; 4] = ["==", "!=", ">=", "<="];

/// Private-use stand-ins; they contain neither `=` nor `:`.
const PLACEHOLDERS: [&str; 4] = ["\u{E000}", "\u{E001}", "\u{E002}", "\u{E003}"];

fn escaper() -> &'static AhoCorasick {
    static AC: OnceLock<AhoCorasick> = OnceLock::new();
    AC.get_or_init(|| AhoCorasick::new(OPERATORS))
}

fn restorer() -> &'static AhoCorasick {
    static AC: OnceLock<AhoCorasick> = OnceLock::new();
    AC.get_or_init(|| AhoCorasick::new(PLACEHOLDERS))
}

/// Replace `==`, `!=`, `>=`, `<=` with placeholders so that a plain `=`
/// search finds only the assignment sign.
pub fn escape_operators(text: &str) -> String {
    escaper().replace_all(text, &PLACEHOLDERS)
}

/// Undo [`escape_operators`].
pub fn restore_operators(text: &str) -> String {
    restorer().replace_all(text, &OPERATORS)
}

/// Expand `%NAME%` references from the process environment.
pub fn expand_env(src: &str) -> String {
    expand_env_with(src, |name| std::env::var(name).ok())
}

/// Expand `%NAME%` references using `lookup` (exposed for testing).
pub fn expand_env_with<F>(src: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(src.len());
    let mut rest = src;

    while let Some(open) = rest.find('%') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('%') {
            Some(close) => {
                let name = &after[..close];
                match lookup_name(name, &lookup) {
                    Some(value) => {
                        out.push_str(&value);
                        rest = &after[close + 1..];
                    }
                    None => {
                        out.push('%');
                        rest = after;
                    }
                }
            }
            None => {
                out.push('%');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn lookup_name<F>(name: &str, lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if name.is_empty() || name.contains(['\n', '=']) {
        return None;
    }
    lookup(name)
}

/// Strip one pair of matching surrounding quotes.
pub fn strip_quotes(s: &str) -> &str {
    let t = s.trim();
    for q in ['"', '\''] {
        if t.len() >= 2 && t.starts_with(q) && t.ends_with(q) {
            return &t[1..t.len() - 1];
        }
    }
    t
}

// ── Tests ─────────────────────────────────────────────────────────────────────
