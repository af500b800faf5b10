//! File-name filters for `count(<dir>,<filter>)`.
//!
//! Filters use the usual wildcard syntax, always case-insensitive:
//!
//! | Glob      | Meaning                                  |
//! |-----------|------------------------------------------|
//! | `*`       | any run of characters                    |
//! | `?`       | exactly one character                    |
//! | `[…]`     | character class; `[!…]`/`[^…]` negated   |
//!
//! A filter is translated once into an anchored [`regex`] and then reused.

use regex::{Regex, RegexBuilder};

/// A compiled file-name filter.
#[derive(Debug, Clone)]
pub struct FileFilter {
    src: String,
    regex: Regex,
}

impl FileFilter {
    pub fn new(glob: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(&glob_to_regex(glob))
            .case_insensitive(true)
            .build()?;
        Ok(FileFilter { src: glob.to_owned(), regex })
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// Translate a wildcard pattern into an anchored regex source.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                // Copy the class through, translating `!` negation.
                let mut class = String::from("[");
                if matches!(chars.peek(), Some('!' | '^')) {
                    chars.next();
                    class.push('^');
                }
                let mut closed = false;
                for cc in chars.by_ref() {
                    if cc == ']' {
                        closed = true;
                        break;
                    }
                    if cc == '\\' || cc == '[' {
                        class.push('\\');
                    }
                    class.push(cc);
                }
                if closed && class.len() > 1 {
                    class.push(']');
                    out.push_str(&class);
                } else {
                    // Unterminated or empty class: match literally.
                    out.push_str(&regex::escape("["));
                    out.push_str(&regex::escape(&class[1..]));
                }
            }
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
