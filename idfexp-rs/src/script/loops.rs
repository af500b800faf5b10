//! FOR-loop frames and `%%` index substitution.
//!
//! | Sequence        | Meaning                                              |
//! |-----------------|------------------------------------------------------|
//! | `%%i`           | Current iterate of loop variable `i`                 |
//! | `%%000i`        | Iterate zero-padded to the number of zeros (3 here)  |
//! | `%%(i+1)`       | Integer arithmetic on the iterate (`+ - * /`)        |
//!
//! A line is first cut into literal text and `%%` references by
//! [`lex_index_refs`]; each active frame, outermost first, then replaces the
//! references that name its variable.  References to unknown variables are
//! written back untouched.
//!
//! `%%(i/n)` adds `n` to the iterate instead of dividing.  Existing scripts
//! are written against that behaviour, so it is kept.

use std::borrow::Cow;

use crate::error::ScriptError;

// ── Loop frame ────────────────────────────────────────────────────────────────

/// One iteration of an active FOR-loop.  Frames are never mutated; moving to
/// the next iteration produces a new frame via [`LoopFrame::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopFrame {
    var: String,
    start: i64,
    /// Number of iterates (`end - start + 1`).
    len: u64,
    index: u64,
    /// Line index to jump back to (the line after the FOR).
    resume: usize,
}

impl LoopFrame {
    /// Frame for `var = start TO end`, or `None` when the range is empty.
    /// A range with more iterates than a `u64` can count is an error.
    pub fn new(
        var: impl Into<String>,
        start: i64,
        end: i64,
        resume: usize,
    ) -> Result<Option<Self>, ScriptError> {
        if end < start {
            return Ok(None);
        }
        let len = u64::try_from(i128::from(end) - i128::from(start) + 1)
            .map_err(|_| ScriptError::syntax(format!("loop range {start} TO {end} is too large")))?;
        Ok(Some(LoopFrame { var: var.into(), start, len, index: 0, resume }))
    }

    pub fn var(&self) -> &str {
        &self.var
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn resume(&self) -> usize {
        self.resume
    }

    /// The current iterate as it appears in substituted text.
    pub fn current(&self) -> String {
        (self.start as i128 + self.index as i128).to_string()
    }

    /// The frame for the next iteration, or `None` when the loop is done.
    pub fn advance(&self) -> Option<LoopFrame> {
        (self.index + 1 < self.len).then(|| LoopFrame { index: self.index + 1, ..self.clone() })
    }
}

// ── Loop stack ────────────────────────────────────────────────────────────────

/// Active loops, innermost last.
#[derive(Debug, Default, Clone)]
pub struct LoopStack {
    frames: Vec<LoopFrame>,
}

impl LoopStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: LoopFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<LoopFrame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&LoopFrame> {
        self.frames.last()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[LoopFrame] {
        &self.frames
    }

    /// Replace every live `%%` reference in `line`.
    pub fn substitute<'a>(&self, line: &'a str) -> Result<Cow<'a, str>, ScriptError> {
        let mut text = Cow::Borrowed(line);
        for frame in &self.frames {
            if text.contains("%%") {
                text = Cow::Owned(substitute_frame(&text, frame)?);
            }
        }
        Ok(text)
    }
}

// ── `%%` lexer ────────────────────────────────────────────────────────────────

/// Arithmetic operator inside `%%( … )`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// One piece of a lexed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece<'a> {
    /// Text with no `%%` reference.
    Text(&'a str),
    /// `%%<ident>`; `ident` is the longest run of word characters.
    Bare { ident: &'a str, raw: &'a str },
    /// `%%<zeros><ident>`.
    Padded { width: usize, ident: &'a str, raw: &'a str },
    /// `%%( … )`; `inner` is the text between the parentheses.
    Arith { inner: &'a str, raw: &'a str },
}

impl<'a> Piece<'a> {
    fn raw(&self) -> &'a str {
        match self {
            Piece::Text(raw)
            | Piece::Bare { raw, .. }
            | Piece::Padded { raw, .. }
            | Piece::Arith { raw, .. } => raw,
        }
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Cut `line` into literal text and `%%` references.
pub fn lex_index_refs(line: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while let Some(found) = line[pos..].find("%%") {
        let at = pos + found;
        match lex_ref(line, at) {
            Some(piece) => {
                if text_start < at {
                    pieces.push(Piece::Text(&line[text_start..at]));
                }
                pos = at + piece.raw().len();
                text_start = pos;
                pieces.push(piece);
            }
            None => pos = at + 2,
        }
    }
    if text_start < line.len() {
        pieces.push(Piece::Text(&line[text_start..]));
    }
    pieces
}

/// Lex the reference starting at the `%%` at byte `at`, if there is one.
fn lex_ref(line: &str, at: usize) -> Option<Piece<'_>> {
    let after = &line[at + 2..];
    if let Some(body) = after.strip_prefix('(') {
        let close = body.find(')')?;
        let raw = &line[at..at + 2 + 1 + close + 1];
        return Some(Piece::Arith { inner: &body[..close], raw });
    }

    let digits = after.trim_start_matches('0');
    let width = after.len() - digits.len();
    let ident_len = digits.find(|c: char| !is_word(c)).unwrap_or(digits.len());
    let ident = &digits[..ident_len];
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let raw = &line[at..at + 2 + width + ident_len];
    Some(if width > 0 {
        Piece::Padded { width, ident, raw }
    } else {
        Piece::Bare { ident, raw }
    })
}

/// Parse the inside of `%%( … )` as `<var> <op> <operand>`.
pub fn parse_index_expr(inner: &str) -> Option<(&str, IndexOp, &str)> {
    let s = inner.trim();
    let name_len = s.find(|c: char| !is_word(c))?;
    let name = &s[..name_len];
    let rest = s[name_len..].trim_start();
    let mut chars = rest.chars();
    let op = match chars.next()? {
        '+' => IndexOp::Add,
        '-' => IndexOp::Sub,
        '*' => IndexOp::Mul,
        '/' => IndexOp::Div,
        _ => return None,
    };
    let operand = chars.as_str().trim();
    if name.is_empty() || operand.is_empty() {
        return None;
    }
    Some((name, op, operand))
}

/// Apply `%%(var op operand)` to the iterate `value`.
pub fn apply_index_op(value: &str, op: IndexOp, operand: &str) -> Result<String, ScriptError> {
    let v: i64 = value.trim().parse().map_err(|_| {
        ScriptError::syntax(format!("loop value '{value}' is not an integer"))
    })?;
    let n: i64 = operand.trim().parse().map_err(|_| {
        ScriptError::syntax(format!("index operand '{operand}' is not an integer"))
    })?;
    let result = match op {
        IndexOp::Add => v.checked_add(n),
        IndexOp::Sub => v.checked_sub(n),
        IndexOp::Mul => v.checked_mul(n),
        // Adds, see module docs.
        IndexOp::Div => v.checked_add(n),
    };
    result
        .map(|r| r.to_string())
        .ok_or_else(|| ScriptError::syntax(format!("index arithmetic overflows for value {v}")))
}

/// Replace the references in `line` that belong to `frame`.
pub fn substitute_frame(line: &str, frame: &LoopFrame) -> Result<String, ScriptError> {
    let var = frame.var();
    let value = frame.current();
    let mut out = String::with_capacity(line.len() + 8);

    for piece in lex_index_refs(line) {
        match piece {
            Piece::Arith { inner, raw } => match parse_index_expr(inner) {
                Some((name, op, operand)) if name == var => {
                    out.push_str(&apply_index_op(&value, op, operand)?);
                }
                _ => out.push_str(raw),
            },
            Piece::Padded { width, ident, raw } => match ident.strip_prefix(var) {
                Some(tail) => {
                    out.push_str(&format!("{value:0>width$}"));
                    out.push_str(tail);
                }
                None => out.push_str(raw),
            },
            Piece::Bare { ident, raw } => match ident.strip_prefix(var) {
                Some(tail) => {
                    out.push_str(&value);
                    out.push_str(tail);
                }
                None => out.push_str(raw),
            },
            Piece::Text(text) => out.push_str(text),
        }
    }
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
