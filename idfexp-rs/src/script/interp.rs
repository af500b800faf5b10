//! IDFexp script interpreter.
//!
//! The [`Interpreter`] owns the variable table and the loop stack and runs a
//! script line by line.  Each logical line goes through the same pipeline:
//!
//! 1. loop-index substitution (`%%i`, `%%00i`, `%%(i+1)`)
//! 2. environment expansion (`%NAME%`)
//! 3. comment check
//! 4. precondition resolution (`#IF [NOT] EXIST …:`)
//! 5. classification into `FOR`, `ENDFOR` or an assignment
//!
//! After every assignment the memory manager ([`Interpreter::reclaim`])
//! writes dirty grids and drops cached cells, so at most the grids of one
//! expression are held in memory at a time.
//!
//! The interpreter implements [`EvalContext`] so the expression evaluator
//! can look up variables and open raster files relative to the base path.

use std::path::{Path, PathBuf};

use tracing::{debug, debug_span, info, trace, warn};

use super::{
    count::{parse_count_call, DirectoryCounter, FileCounter},
    expand::{expand_env, strip_quotes},
    expr::{self, EvalContext},
    loops::{LoopFrame, LoopStack},
    precond::{self, Resolution},
    stmt::{
        classify, comment_text, find_matching_endfor, join_continuations, Assignment, ForHeader,
        ScriptLine, Statement,
    },
    value::Value,
    vars::{Binding, ExprKind, VariableTable},
};
use crate::config::{QuietMode, Settings};
use crate::error::ScriptError;
use crate::grid::{
    is_raster_path, normalize_path, resolve_path, Grid, Metadata, Released, GRID_EXTENSION,
    RASTER_EXTENSIONS,
};

// ── RunStats ──────────────────────────────────────────────────────────────────

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Non-blank logical lines processed, loop repetitions included.
    pub lines: usize,
    pub assignments: usize,
    pub grids_written: usize,
    /// Computed grids rounded to the configured decimal count.
    pub roundings: usize,
    /// Lines skipped by a failing precondition, plus loops with no iterates.
    pub skipped: usize,
}

// ── Interpreter ───────────────────────────────────────────────────────────────

pub struct Interpreter {
    settings: Settings,
    vars: VariableTable,
    loops: LoopStack,
    counter: Box<dyn FileCounter>,
    stats: RunStats,
    /// Base for relative input paths.
    base: PathBuf,
    /// Root for written grids.
    output: PathBuf,
}

impl Interpreter {
    pub fn new(settings: Settings) -> Self {
        let base = settings.resolved_base(None);
        let output = settings.resolved_output(&base);
        Interpreter {
            settings,
            vars: VariableTable::new(),
            loops: LoopStack::new(),
            counter: Box::new(DirectoryCounter),
            stats: RunStats::default(),
            base,
            output,
        }
    }

    /// Replace the file counter used by `count(...)` loop bounds.
    pub fn with_counter(mut self, counter: impl FileCounter + 'static) -> Self {
        self.counter = Box::new(counter);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn variables(&self) -> &VariableTable {
        &self.vars
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    /// Run the script at `path`.  Relative inputs resolve against the
    /// script's directory unless a base path is configured.
    pub fn run_file(&mut self, path: &Path) -> Result<RunStats, ScriptError> {
        let src = std::fs::read_to_string(path)
            .map_err(|source| ScriptError::Io { path: path.to_path_buf(), source })?;

        self.base = self.settings.resolved_base(Some(path));
        self.output = self.settings.resolved_output(&self.base);
        info!(script = %path.display(), output = %self.output.display(), "running script");

        if self.settings.debug {
            let copy = expanded_path(path);
            let text: String = src.lines().map(|l| expand_env(l) + "\n").collect();
            std::fs::write(&copy, text).map_err(ScriptError::unexpected)?;
            debug!(path = %copy.display(), "wrote expanded script");
        }

        let stats = self.run_str(&src)?;
        info!(
            lines = stats.lines,
            assignments = stats.assignments,
            grids_written = stats.grids_written,
            "script finished"
        );
        Ok(stats)
    }

    /// Run script source text.
    pub fn run_str(&mut self, src: &str) -> Result<RunStats, ScriptError> {
        self.run_lines(&join_continuations(src))
    }

    /// Run already-joined logical lines.
    pub fn run_lines(&mut self, lines: &[ScriptLine]) -> Result<RunStats, ScriptError> {
        let mut pc = 0;
        while pc < lines.len() {
            let line = &lines[pc];
            let span = debug_span!("line", n = line.number, depth = self.loops.depth());
            let _enter = span.enter();
            pc = self.exec_line(lines, pc).map_err(|e| e.at_line(line.number))?;
        }

        if let Some(frame) = self.loops.top() {
            let for_line = lines
                .get(frame.resume().saturating_sub(1))
                .map_or(0, |l| l.number);
            return Err(ScriptError::syntax(format!(
                "FOR {} without matching ENDFOR",
                frame.var()
            ))
            .at_line(for_line));
        }
        Ok(self.stats)
    }

    /// Execute the line at `pc` and return the index of the next line.
    fn exec_line(&mut self, lines: &[ScriptLine], pc: usize) -> Result<usize, ScriptError> {
        let raw = lines[pc].text.trim();
        if raw.is_empty() {
            return Ok(pc + 1);
        }
        self.stats.lines += 1;

        let substituted = self.loops.substitute(raw)?;
        let text = expand_env(&substituted);
        if let Some(comment) = comment_text(&text) {
            debug!("REM {comment}");
            return Ok(pc + 1);
        }

        let body = match precond::resolve(&text, &self.base)? {
            Resolution::Proceed(rest) => rest,
            Resolution::Skip(clause) => {
                debug!(%clause, "precondition not met, line skipped");
                self.stats.skipped += 1;
                return Ok(pc + 1);
            }
        };
        if comment_text(&body).is_some() {
            return Ok(pc + 1);
        }

        match classify(&body)? {
            Statement::For(header) => self.exec_for(lines, pc, &header),
            Statement::EndFor => self.exec_endfor(pc),
            Statement::Assignment(assignment) => {
                self.assign(&assignment)?;
                Ok(pc + 1)
            }
        }
    }

    fn exec_for(
        &mut self,
        lines: &[ScriptLine],
        pc: usize,
        header: &ForHeader,
    ) -> Result<usize, ScriptError> {
        let start = parse_bound(&header.start)?;
        let end = self.loop_end(&header.end)?;
        match LoopFrame::new(&header.var, start, end, pc + 1)? {
            Some(frame) => {
                debug!(var = %header.var, start, end, "loop entered");
                self.loops.push(frame);
                Ok(pc + 1)
            }
            None => {
                let close = find_matching_endfor(lines, pc)?;
                debug!(var = %header.var, start, end, "loop has no iterates, skipped");
                self.stats.skipped += 1;
                Ok(close + 1)
            }
        }
    }

    fn exec_endfor(&mut self, pc: usize) -> Result<usize, ScriptError> {
        let frame = self
            .loops
            .pop()
            .ok_or_else(|| ScriptError::syntax("ENDFOR without FOR"))?;
        match frame.advance() {
            Some(next) => {
                let resume = next.resume();
                self.loops.push(next);
                Ok(resume)
            }
            None => {
                debug!(var = frame.var(), "loop finished");
                Ok(pc + 1)
            }
        }
    }

    /// Upper loop bound: an integer or `count(<dir>[,<filter>])`.
    fn loop_end(&self, text: &str) -> Result<i64, ScriptError> {
        let Some(call) = parse_count_call(text) else {
            return parse_bound(text);
        };
        let dir = resolve_path(&self.base, &call.dir);
        let n = self.counter.count(&dir, &call.filter)?;
        debug!(dir = %dir.display(), filter = %call.filter, n, "counted files");
        i64::try_from(n).map_err(ScriptError::unexpected)
    }

    // ── Assignment ────────────────────────────────────────────────────────────

    fn assign(&mut self, assignment: &Assignment) -> Result<(), ScriptError> {
        let (name, subdir) = parse_target(&assignment.target)?;
        self.stats.assignments += 1;

        let binding = match self.resolve(&assignment.expression) {
            Ok((mut value, kind)) => {
                if kind.is_output() {
                    if let Value::Grid(grid) = &mut value {
                        self.prepare_output(grid, &name, subdir.as_deref(), &assignment.expression)?;
                    }
                }
                trace!(variable = %name, ?kind, "bound");
                Binding { name, value: Some(value), kind, subdir }
            }
            Err(e @ ScriptError::MissingResource { .. }) => {
                self.on_missing(&name, e)?;
                Binding { subdir, ..Binding::null(name) }
            }
            Err(e) => return Err(e),
        };

        self.vars.bind(binding);
        self.reclaim()
    }

    /// Evaluate the right-hand side of an assignment.
    fn resolve(&self, expression: &str) -> Result<(Value, ExprKind), ScriptError> {
        let text = strip_quotes(expression);
        // A lone path may contain spaces the expression lexer would split.
        if is_raster_path(text) {
            return Ok((self.open_grid(text)?, ExprKind::File));
        }
        expr::evaluate(expression, self)
    }

    /// Quiet-mode handling of an unresolvable reference.
    fn on_missing(&self, name: &str, err: ScriptError) -> Result<(), ScriptError> {
        match self.settings.quiet {
            QuietMode::Off => Err(err),
            QuietMode::SilentExit => Err(ScriptError::QuietAbort { reason: err.to_string() }),
            QuietMode::SilentSkip => {
                warn!(variable = %name, "{err}; variable left unbound");
                Ok(())
            }
        }
    }

    fn prepare_output(
        &mut self,
        grid: &mut Grid,
        name: &str,
        subdir: Option<&str>,
        expression: &str,
    ) -> Result<(), ScriptError> {
        let mut path = self.output.clone();
        if let Some(sub) = subdir {
            path.push(normalize_path(sub));
        }
        path.push(format!("{name}.{GRID_EXTENSION}"));
        grid.set_output(path);

        let decimals = self.settings.decimal_count;
        if let Some(d) = decimals {
            grid.round(d)?;
            self.stats.roundings += 1;
        }
        if self.settings.write_metadata {
            grid.set_metadata(Metadata::for_expression(name, expression, decimals));
        }
        Ok(())
    }

    // ── Memory manager ────────────────────────────────────────────────────────

    /// Write every dirty grid and drop cached cells.
    pub fn reclaim(&mut self) -> Result<(), ScriptError> {
        let mut written = 0;
        for (name, grid) in self.vars.grids_mut() {
            match grid.release()? {
                Released::Written(path) => {
                    info!(variable = name, path = %path.display(), "grid written");
                    written += 1;
                }
                Released::Dropped => trace!(variable = name, "cells released"),
                Released::Idle => {}
            }
        }
        self.stats.grids_written += written;
        Ok(())
    }
}

impl EvalContext for Interpreter {
    fn variable(&self, name: &str) -> Option<Value> {
        self.vars.value(name).cloned()
    }

    fn open_grid(&self, path: &str) -> Result<Value, ScriptError> {
        let text = strip_quotes(path);
        let full = resolve_path(&self.base, text);
        if !full.is_file() {
            return Err(ScriptError::missing(format!("file '{text}'")));
        }
        Ok(Value::Grid(Grid::from_file(full)))
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn parse_bound(text: &str) -> Result<i64, ScriptError> {
    text.trim()
        .parse()
        .map_err(|_| ScriptError::syntax(format!("loop bound '{}' is not an integer", text.trim())))
}

/// Split an assignment target into variable name and output subdirectory.
/// A trailing raster extension is dropped: `out\KD.ASC` → (`KD`, `out`).
pub fn parse_target(text: &str) -> Result<(String, Option<String>), ScriptError> {
    let t = strip_quotes(text);
    let (subdir, file) = match t.rfind(['\\', '/']) {
        Some(i) => (Some(&t[..i]), &t[i + 1..]),
        None => (None, t),
    };
    let name = match file.rsplit_once('.') {
        Some((stem, ext)) if RASTER_EXTENSIONS.iter().any(|r| ext.eq_ignore_ascii_case(r)) => stem,
        _ => file,
    };

    let valid = name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(ScriptError::syntax(format!("invalid variable name '{t}'")));
    }
    let subdir = subdir.filter(|s| !s.is_empty()).map(str::to_owned);
    Ok((name.to_owned(), subdir))
}

/// `<dir>/<stem>_expanded.<ext>` next to the script.
pub fn expanded_path(script: &Path) -> PathBuf {
    let stem = script.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let name = match script.extension() {
        Some(ext) => format!("{stem}_expanded.{}", ext.to_string_lossy()),
        None => format!("{stem}_expanded"),
    };
    script.with_file_name(name)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
