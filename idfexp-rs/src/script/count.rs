//! `count(<dir>[,<filter>])` loop bounds.
//!
//! The file counter sits behind the [`FileCounter`] trait so scripts can be
//! tested without touching the disk.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ScriptError;
use crate::pattern::FileFilter;

/// Filter used when none is given.
pub const DEFAULT_FILTER: &str = "*";

pub trait FileCounter {
    /// Number of regular files in `dir` whose names match `filter`.
    fn count(&self, dir: &Path, filter: &str) -> Result<usize, ScriptError>;
}

/// Counts files on the local filesystem.  A missing directory counts 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryCounter;

impl FileCounter for DirectoryCounter {
    fn count(&self, dir: &Path, filter: &str) -> Result<usize, ScriptError> {
        let filter = FileFilter::new(filter).map_err(ScriptError::unexpected)?;
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(ScriptError::unexpected(e)),
        };

        let mut n = 0;
        for entry in entries {
            let entry = entry.map_err(ScriptError::unexpected)?;
            let is_file = entry.file_type().map_err(ScriptError::unexpected)?.is_file();
            if is_file && filter.matches(&entry.file_name().to_string_lossy()) {
                n += 1;
            }
        }
        Ok(n)
    }
}

/// A parsed `count(...)` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountCall {
    pub dir: String,
    pub filter: String,
}

fn count_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^count\s*\(\s*([^,]+?)\s*(?:,\s*(.+?)\s*)?\)$")
            .expect("count pattern is valid")
    })
}

/// Recognise `count(<dir>[,<filter>])`; quotes around either part are removed.
pub fn parse_count_call(text: &str) -> Option<CountCall> {
    let caps = count_regex().captures(text.trim())?;
    let dir = super::expand::strip_quotes(&caps[1]).to_owned();
    let filter = caps
        .get(2)
        .map(|m| super::expand::strip_quotes(m.as_str()).to_owned())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_owned());
    Some(CountCall { dir, filter })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_forms() {
        assert_eq!(
            parse_count_call("count(kh)"),
            Some(CountCall { dir: "kh".into(), filter: "*".into() })
        );
        assert_eq!(
            parse_count_call(r#"COUNT( "D:\model\kh" , kh_l*.asc )"#),
            Some(CountCall { dir: r"D:\model\kh".into(), filter: "kh_l*.asc".into() })
        );
        assert_eq!(parse_count_call("count()"), None);
        assert_eq!(parse_count_call("3"), None);
    }

    #[test]
    fn counts_matching_regular_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["kh_l1.asc", "kh_l2.ASC", "kh_l3.asc", "notes.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.asc")).unwrap();

        let c = DirectoryCounter;
        assert_eq!(c.count(dir.path(), "*.asc").unwrap(), 3);
        assert_eq!(c.count(dir.path(), "*").unwrap(), 4);
        assert_eq!(c.count(dir.path(), "kh_l[12].asc").unwrap(), 2);
    }

    #[test]
    fn missing_directory_counts_zero() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(DirectoryCounter.count(&dir.path().join("nope"), "*").unwrap(), 0);
    }
}
