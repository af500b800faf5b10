//! Script execution errors.
//!
//! Every error raised while a line is processed bubbles up to the script
//! driver, which stamps it with the logical line number exactly once via
//! [`ScriptError::at_line`].  [`ScriptError::QuietAbort`] is never stamped:
//! callers use it to tell an intentional early stop from a failure.

use std::path::PathBuf;

use thiserror::Error;

use crate::grid::GridError;

/// Boxed cause carried by [`ScriptError::Unexpected`].
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ScriptError {
    /// Malformed FOR / precondition / assignment / index expression.
    #[error("{}syntax error: {message}", at(.line))]
    Syntax { line: Option<usize>, message: String },

    /// A referenced file or variable does not exist.
    #[error("{}missing {what}", at(.line))]
    MissingResource { line: Option<usize>, what: String },

    /// Deliberate stop requested by the silent-exit quiet mode.
    #[error("stopped: {reason}")]
    QuietAbort { reason: String },

    /// Anything else that went wrong while reading, writing or evaluating.
    #[error("{}{source}", at(.line))]
    Unexpected {
        line: Option<usize>,
        #[source]
        source: Cause,
    },

    /// The script file itself could not be read.
    #[error("cannot read script {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn at(line: &Option<usize>) -> String {
    match line {
        Some(n) => format!("line {n}: "),
        None => String::new(),
    }
}

impl ScriptError {
    pub fn syntax(message: impl Into<String>) -> Self {
        ScriptError::Syntax { line: None, message: message.into() }
    }

    pub fn missing(what: impl Into<String>) -> Self {
        ScriptError::MissingResource { line: None, what: what.into() }
    }

    pub fn unexpected(source: impl Into<Cause>) -> Self {
        ScriptError::Unexpected { line: None, source: source.into() }
    }

    /// Attach a line number if none is present yet.  Quiet aborts and
    /// script-level I/O errors pass through unchanged.
    pub fn at_line(self, n: usize) -> Self {
        match self {
            ScriptError::Syntax { line: None, message } => {
                ScriptError::Syntax { line: Some(n), message }
            }
            ScriptError::MissingResource { line: None, what } => {
                ScriptError::MissingResource { line: Some(n), what }
            }
            ScriptError::Unexpected { line: None, source } => {
                ScriptError::Unexpected { line: Some(n), source }
            }
            other => other,
        }
    }

    /// The line this error was stamped with, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            ScriptError::Syntax { line, .. }
            | ScriptError::MissingResource { line, .. }
            | ScriptError::Unexpected { line, .. } => *line,
            ScriptError::QuietAbort { .. } | ScriptError::Io { .. } => None,
        }
    }

    pub fn is_quiet_abort(&self) -> bool {
        matches!(self, ScriptError::QuietAbort { .. })
    }
}

impl From<GridError> for ScriptError {
    fn from(e: GridError) -> Self {
        ScriptError::unexpected(e)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
