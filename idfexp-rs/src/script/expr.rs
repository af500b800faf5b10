//! Grid-expression lexer, AST, parser, and evaluator.
//!
//! Expressions combine scalars, variables and raster files cell by cell.
//!
//! Operator precedence (lowest → highest):
//!   or  →  and  →  relational  →  additive  →  multiplicative  →
//!   unary  →  power  →  primary
//!
//! Raster files may be written bare (`kh_l1.asc`, `C:\data\kh.asc`) or
//! quoted (`"my data\kh.asc"`).  `NoData` and `NaN` name the missing
//! value; every operator propagates it, and `x == NoData` tests for it.

use super::value::{combine_n, Value};
use super::vars::{is_reserved, ExprKind};
use crate::error::ScriptError;
use crate::grid::{is_raster_path, round_decimals};

// ── EvalContext ───────────────────────────────────────────────────────────────

/// Dependency-injection interface used by the expression evaluator.
///
/// The [`Interpreter`](super::interp::Interpreter) implements this trait to
/// give the evaluator access to bound variables and raster files.
pub trait EvalContext {
    /// Value bound to `name`, or `None` if it is unknown or unresolved.
    fn variable(&self, name: &str) -> Option<Value>;

    /// Open the raster `path` as written in the script.
    fn open_grid(&self, path: &str) -> Result<Value, ScriptError>;
}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    /// Quoted raster path.
    Str(String),
    Ident(String),
    /// Unquoted raster path.
    Path(String),

    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Bang,

    Eq, // ==
    Ne, // !=
    Lt,
    Le,
    Gt,
    Ge,

    And, // &&
    Or,  // ||

    Comma,
    LParen,
    RParen,
    /// Unrecognised input byte, reported instead of masking as EOF.
    Unknown(char),
    Eof,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    text: &'a str,
    src: &'a [u8],
    pos: usize,
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'\\' | b'/' | b':')
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Lexer { text, src: text.as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn eat(&mut self, ch: u8) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn skip_while(&mut self, pred: impl Fn(u8) -> bool) {
        while self.peek().map_or(false, &pred) {
            self.pos += 1;
        }
    }

    /// A maximal run of path characters that names a raster file.
    fn try_path(&mut self) -> Option<Token> {
        let start = self.pos;
        let mut end = start;
        while self.src.get(end).map_or(false, |&b| is_word_byte(b)) {
            end += 1;
        }
        let word = &self.text[start..end];
        if end > start && is_raster_path(word) {
            self.pos = end;
            Some(Token::Path(word.to_owned()))
        } else {
            None
        }
    }

    fn read_number(&mut self) -> Token {
        let start = self.pos;
        self.skip_while(|b| b.is_ascii_digit());
        if self.peek() == Some(b'.') {
            self.pos += 1;
            self.skip_while(|b| b.is_ascii_digit());
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if matches!(self.peek(), Some(b'0'..=b'9')) {
                self.skip_while(|b| b.is_ascii_digit());
            } else {
                self.pos = mark;
            }
        }
        match self.text[start..self.pos].parse() {
            Ok(n) => Token::Number(n),
            Err(_) => Token::Unknown('.'),
        }
    }

    fn read_string(&mut self, quote: u8) -> Token {
        let start = self.pos;
        while !matches!(self.peek(), None | Some(b'\n')) && self.peek() != Some(quote) {
            self.pos += 1;
        }
        let s = self.text[start..self.pos].to_owned();
        self.eat(quote);
        Token::Str(s)
    }

    fn read_ident(&mut self) -> Token {
        let start = self.pos;
        self.skip_while(|b| b.is_ascii_alphanumeric() || b == b'_');
        Token::Ident(self.text[start..self.pos].to_owned())
    }

    fn next_token(&mut self) -> Token {
        self.skip_ws();
        let Some(ch) = self.peek() else {
            return Token::Eof;
        };
        if is_word_byte(ch) {
            if let Some(path) = self.try_path() {
                return path;
            }
        }

        match ch {
            b'0'..=b'9' => return self.read_number(),
            b'.' if matches!(self.peek2(), Some(b'0'..=b'9')) => return self.read_number(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => return self.read_ident(),
            _ => {}
        }

        self.pos += 1;
        match ch {
            b'"' | b'\'' => self.read_string(ch),
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'^' => Token::Caret,
            b'!' => {
                if self.eat(b'=') {
                    Token::Ne
                } else {
                    Token::Bang
                }
            }
            b'=' => {
                if self.eat(b'=') {
                    Token::Eq
                } else {
                    Token::Unknown('=')
                }
            }
            b'<' => {
                if self.eat(b'=') {
                    Token::Le
                } else if self.eat(b'>') {
                    Token::Ne
                } else {
                    Token::Lt
                }
            }
            b'>' => {
                if self.eat(b'=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            b'&' => {
                if self.eat(b'&') {
                    Token::And
                } else {
                    Token::Unknown('&')
                }
            }
            b'|' => {
                if self.eat(b'|') {
                    Token::Or
                } else {
                    Token::Unknown('|')
                }
            }
            b',' => Token::Comma,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            _ => {
                // Report the whole character, not just its first byte.
                let c = self.text[self.pos - 1..].chars().next().unwrap_or('?');
                self.pos += c.len_utf8() - 1;
                Token::Unknown(c)
            }
        }
    }

    fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token();
            let done = matches!(t, Token::Eof);
            tokens.push(t);
            if done {
                break;
            }
            // Keep the byte cursor on a character boundary.
            while !self.text.is_char_boundary(self.pos) {
                self.advance();
            }
        }
        tokens
    }
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Var(String),
    Path(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> Result<Expr, ScriptError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_relational()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinOp::Eq,
                Token::Ne => BinOp::Ne,
                Token::Lt => BinOp::Lt,
                Token::Le => BinOp::Le,
                Token::Gt => BinOp::Gt,
                Token::Ge => BinOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ScriptError> {
        match self.peek() {
            Token::Minus => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)))
            }
            Token::Plus => {
                self.pos += 1;
                self.parse_unary()
            }
            Token::Bang => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_power(),
        }
    }

    /// `^` is right-associative and binds tighter than unary minus.
    fn parse_power(&mut self) -> Result<Expr, ScriptError> {
        let base = self.parse_primary()?;
        if self.eat(&Token::Caret) {
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ScriptError> {
        match self.advance() {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) | Token::Path(s) => Ok(Expr::Path(s)),
            Token::Ident(name) => {
                if !self.eat(&Token::LParen) {
                    return Ok(Expr::Var(name));
                }
                let mut args = Vec::new();
                if self.peek() != &Token::RParen {
                    args.push(self.parse_expr()?);
                    while self.eat(&Token::Comma) {
                        args.push(self.parse_expr()?);
                    }
                }
                if !self.eat(&Token::RParen) {
                    return Err(ScriptError::syntax(format!("expected ')' after arguments to {name}")));
                }
                Ok(Expr::Call(name, args))
            }
            Token::LParen => {
                let inner = self.parse_expr()?;
                if !self.eat(&Token::RParen) {
                    return Err(ScriptError::syntax("expected ')'"));
                }
                Ok(inner)
            }
            Token::Eof => Err(ScriptError::syntax("unexpected end of expression")),
            Token::Unknown(c) => Err(ScriptError::syntax(format!("unexpected character '{c}'"))),
            other => Err(ScriptError::syntax(format!("unexpected token {other:?}"))),
        }
    }
}

/// Parse an expression string into an AST.
pub fn parse_expr(src: &str) -> Result<Expr, ScriptError> {
    let tokens = Lexer::new(src).tokenize();
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        Token::Unknown(c) => Err(ScriptError::syntax(format!("unexpected character '{c}'"))),
        other => Err(ScriptError::syntax(format!("unexpected {other:?} after expression"))),
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

fn truth(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Overflow and division by zero yield NoData rather than infinities.
fn finite(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        f64::NAN
    }
}

impl BinOp {
    /// Apply the operator to one pair of cells.
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinOp::Add => finite(a + b),
            BinOp::Sub => finite(a - b),
            BinOp::Mul => finite(a * b),
            BinOp::Div => finite(a / b),
            BinOp::Pow => finite(a.powf(b)),
            // Equality treats NoData as a comparable value.
            BinOp::Eq => truth(a == b || (a.is_nan() && b.is_nan())),
            BinOp::Ne => truth(!(a == b || (a.is_nan() && b.is_nan()))),
            _ if a.is_nan() || b.is_nan() => f64::NAN,
            BinOp::Lt => truth(a < b),
            BinOp::Le => truth(a <= b),
            BinOp::Gt => truth(a > b),
            BinOp::Ge => truth(a >= b),
            BinOp::And => truth(a != 0.0 && b != 0.0),
            BinOp::Or => truth(a != 0.0 || b != 0.0),
        }
    }
}

/// Evaluate an [`Expr`] AST node against the given context.
pub fn eval_expr(expr: &Expr, ctx: &dyn EvalContext) -> Result<Value, ScriptError> {
    match expr {
        Expr::Number(n) => Ok(Value::Scalar(*n)),

        Expr::Var(name) => ctx
            .variable(name)
            .ok_or_else(|| ScriptError::missing(format!("variable '{name}'"))),

        Expr::Path(path) => ctx.open_grid(path),

        Expr::Unary(op, inner) => {
            let v = eval_expr(inner, ctx)?;
            let out = match op {
                UnaryOp::Neg => v.map(|x| -x)?,
                UnaryOp::Not => v.map(|x| if x.is_nan() { x } else { truth(x == 0.0) })?,
            };
            Ok(out)
        }

        Expr::Binary(op, lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            let r = eval_expr(rhs, ctx)?;
            Ok(l.zip_with(&r, |a, b| op.apply(a, b))?)
        }

        Expr::Call(name, arg_exprs) => {
            let mut args = Vec::with_capacity(arg_exprs.len());
            for ae in arg_exprs {
                args.push(eval_expr(ae, ctx)?);
            }
            call_function(name, &args)
        }
    }
}

fn arity(name: &str, args: &[Value], want: usize) -> Result<(), ScriptError> {
    if args.len() == want {
        Ok(())
    } else {
        Err(ScriptError::syntax(format!(
            "{name}() takes {want} argument{}, got {}",
            if want == 1 { "" } else { "s" },
            args.len()
        )))
    }
}

fn call_function(name: &str, args: &[Value]) -> Result<Value, ScriptError> {
    let lower = name.to_ascii_lowercase();
    let unary = |f: fn(f64) -> f64| -> Result<Value, ScriptError> {
        arity(name, args, 1)?;
        Ok(args[0].map(|x| finite(f(x)))?)
    };

    let value = match lower.as_str() {
        "if" => {
            arity(name, args, 3)?;
            combine_n(args, |v| match v[0] {
                c if c.is_nan() => f64::NAN,
                c if c != 0.0 => v[1],
                _ => v[2],
            })?
        }
        "min" | "max" => {
            if args.is_empty() {
                return Err(ScriptError::syntax(format!("{name}() needs at least one argument")));
            }
            let pick_max = lower == "max";
            combine_n(args, |v| {
                v.iter().copied().fold(v[0], |acc, x| {
                    if acc.is_nan() || x.is_nan() {
                        f64::NAN
                    } else if pick_max {
                        acc.max(x)
                    } else {
                        acc.min(x)
                    }
                })
            })?
        }
        "abs" => unary(f64::abs)?,
        "sqrt" => unary(f64::sqrt)?,
        "exp" => unary(f64::exp)?,
        "ln" => unary(f64::ln)?,
        "log10" => unary(f64::log10)?,
        "round" => {
            arity(name, args, 2)?;
            let Some(digits) = args[1].as_scalar().filter(|d| d.is_finite()) else {
                return Err(ScriptError::syntax("round() needs a scalar number of decimals"));
            };
            let digits = digits.round() as i64;
            args[0].map(|x| round_decimals(x, digits))?
        }
        "clip" => {
            arity(name, args, 3)?;
            combine_n(args, |v| {
                if v.iter().any(|x| x.is_nan()) {
                    f64::NAN
                } else {
                    v[0].max(v[1]).min(v[2])
                }
            })?
        }
        "isnodata" => {
            arity(name, args, 1)?;
            args[0].map(|x| truth(x.is_nan()))?
        }
        _ => return Err(ScriptError::syntax(format!("unknown function '{name}'"))),
    };
    Ok(value)
}

/// Parse and evaluate `src`, tagging the result with how it was produced.
pub fn evaluate(src: &str, ctx: &dyn EvalContext) -> Result<(Value, ExprKind), ScriptError> {
    let expr = parse_expr(src)?;
    let value = eval_expr(&expr, ctx)?;
    let kind = match &expr {
        Expr::Number(_) => ExprKind::Constant,
        // A shadowed `NoData`/`NaN` behaves like any other variable.
        Expr::Var(name) if is_reserved(name) && matches!(value, Value::Scalar(x) if x.is_nan()) => {
            ExprKind::Constant
        }
        Expr::Var(_) => ExprKind::Variable,
        Expr::Path(_) => ExprKind::File,
        _ if value.is_grid() => ExprKind::Computed,
        _ => ExprKind::Constant,
    };
    Ok((value, kind))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Grid, GridData, GridHeader};
    use std::collections::HashMap;

    // ── Minimal EvalContext for tests ─────────────────────────────────────────

    struct TestCtx {
        vars: HashMap<String, Value>,
        files: HashMap<String, Value>,
    }

    impl TestCtx {
        fn new() -> Self {
            let mut vars = HashMap::new();
            vars.insert("NoData".to_owned(), Value::Scalar(f64::NAN));
            TestCtx { vars, files: HashMap::new() }
        }
        fn with(mut self, k: &str, v: Value) -> Self {
            self.vars.insert(k.into(), v);
            self
        }
        fn file(mut self, k: &str, v: Value) -> Self {
            self.files.insert(k.into(), v);
            self
        }
    }

    impl EvalContext for TestCtx {
        fn variable(&self, name: &str) -> Option<Value> {
            self.vars.get(name).cloned()
        }
        fn open_grid(&self, path: &str) -> Result<Value, ScriptError> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| ScriptError::missing(format!("file '{path}'")))
        }
    }

    fn grid(cells: Vec<f64>) -> Value {
        let header = GridHeader::new(cells.len(), 1, 25.0);
        Value::Grid(Grid::from_data(GridData::new(header, cells)))
    }

    fn cells(v: &Value) -> Vec<f64> {
        v.as_grid().expect("grid").data().unwrap().cells.clone()
    }

    fn num(src: &str) -> f64 {
        eval_expr(&parse_expr(src).unwrap(), &TestCtx::new())
            .unwrap()
            .as_scalar()
            .unwrap()
    }

    // ── Lexer ─────────────────────────────────────────────────────────────────

    #[test]
    fn lex_paths_and_identifiers() {
        let toks = Lexer::new(r"K * C:\data\kh_l1.ASC + top.idf").tokenize();
        assert_eq!(
            toks,
            vec![
                Token::Ident("K".into()),
                Token::Star,
                Token::Path(r"C:\data\kh_l1.ASC".into()),
                Token::Plus,
                Token::Path("top.idf".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn lex_division_between_names() {
        let toks = Lexer::new("A/B").tokenize();
        assert_eq!(
            toks,
            vec![Token::Ident("A".into()), Token::Slash, Token::Ident("B".into()), Token::Eof]
        );
    }

    #[test]
    fn lex_numbers() {
        let toks = Lexer::new("1.5e3 .25 7").tokenize();
        assert_eq!(
            toks,
            vec![Token::Number(1500.0), Token::Number(0.25), Token::Number(7.0), Token::Eof]
        );
    }

    #[test]
    fn lex_quoted_path() {
        let toks = Lexer::new(r#""my data\k.asc""#).tokenize();
        assert_eq!(toks, vec![Token::Str(r"my data\k.asc".into()), Token::Eof]);
    }

    // ── Parser / scalar arithmetic ────────────────────────────────────────────

    #[test]
    fn precedence() {
        assert_eq!(num("1 + 2 * 3"), 7.0);
        assert_eq!(num("(1 + 2) * 3"), 9.0);
        assert_eq!(num("-2^2"), -4.0);
        assert_eq!(num("2^3^2"), 512.0);
        assert_eq!(num("2^-1"), 0.5);
        assert_eq!(num("1 < 2 && 3 >= 3"), 1.0);
        assert_eq!(num("0 || !1"), 0.0);
    }

    #[test]
    fn division_by_zero_is_nodata() {
        assert!(num("1 / 0").is_nan());
    }

    #[test]
    fn nodata_comparisons() {
        assert_eq!(num("NoData == NoData"), 1.0);
        assert_eq!(num("1 == NoData"), 0.0);
        assert_eq!(num("1 != NoData"), 1.0);
        assert!(num("1 < NoData").is_nan());
        assert!(num("NoData + 1").is_nan());
    }

    #[test]
    fn functions() {
        assert_eq!(num("if(1, 2, 3)"), 2.0);
        assert_eq!(num("IF(0, 2, 3)"), 3.0);
        assert_eq!(num("min(4, 2, 8)"), 2.0);
        assert_eq!(num("max(4, 2, 8)"), 8.0);
        assert_eq!(num("abs(-3)"), 3.0);
        assert_eq!(num("sqrt(16)"), 4.0);
        assert_eq!(num("round(2.345, 2)"), 2.35);
        assert_eq!(num("round(1.5, 400)"), 1.5);
        assert_eq!(num("round(1250, -2)"), 1300.0);
        assert_eq!(num("clip(12, 0, 10)"), 10.0);
        assert_eq!(num("isnodata(NoData)"), 1.0);
        assert!(num("ln(0)").is_nan());
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(parse_expr("1 +"), Err(ScriptError::Syntax { .. })));
        assert!(matches!(parse_expr("(1"), Err(ScriptError::Syntax { .. })));
        assert!(matches!(parse_expr("1 2"), Err(ScriptError::Syntax { .. })));
        assert!(matches!(parse_expr("a = b"), Err(ScriptError::Syntax { .. })));
        assert!(matches!(parse_expr("K § 2"), Err(ScriptError::Syntax { .. })));
    }

    #[test]
    fn unknown_function_and_arity() {
        let ctx = TestCtx::new();
        assert!(evaluate("frobnicate(1)", &ctx).is_err());
        assert!(evaluate("if(1, 2)", &ctx).is_err());
        assert!(evaluate("round(1, K)", &ctx.with("K", grid(vec![1.0]))).is_err());
    }

    // ── Grids ─────────────────────────────────────────────────────────────────

    #[test]
    fn grid_arithmetic_broadcasts() {
        let ctx = TestCtx::new().with("K", grid(vec![1.0, 2.0, f64::NAN]));
        let (v, kind) = evaluate("K * 10 + 1", &ctx).unwrap();
        assert_eq!(kind, ExprKind::Computed);
        let c = cells(&v);
        assert_eq!(&c[..2], &[11.0, 21.0]);
        assert!(c[2].is_nan());
    }

    #[test]
    fn conditional_on_grid() {
        let ctx = TestCtx::new()
            .with("A", grid(vec![1.0, 5.0, f64::NAN]))
            .with("B", grid(vec![9.0, 9.0, 9.0]));
        let (v, _) = evaluate("if(A == NoData, 0, if(A > 2, B, A))", &ctx).unwrap();
        assert_eq!(cells(&v), vec![1.0, 9.0, 0.0]);
    }

    #[test]
    fn mismatched_grids_fail() {
        let ctx = TestCtx::new().with("A", grid(vec![1.0])).with("B", grid(vec![1.0, 2.0]));
        let e = evaluate("A + B", &ctx).unwrap_err();
        assert!(matches!(e, ScriptError::Unexpected { .. }));
    }

    #[test]
    fn missing_variable_and_file() {
        let ctx = TestCtx::new();
        assert!(matches!(evaluate("Q + 1", &ctx), Err(ScriptError::MissingResource { .. })));
        assert!(matches!(evaluate("q.asc", &ctx), Err(ScriptError::MissingResource { .. })));
    }

    // ── Kind tagging ──────────────────────────────────────────────────────────

    #[test]
    fn kinds() {
        let ctx = TestCtx::new()
            .with("K", grid(vec![1.0]))
            .with("S", Value::Scalar(2.0))
            .file("k.asc", grid(vec![1.0]));
        assert_eq!(evaluate("3", &ctx).unwrap().1, ExprKind::Constant);
        assert_eq!(evaluate("NoData", &ctx).unwrap().1, ExprKind::Constant);
        assert_eq!(evaluate("K", &ctx).unwrap().1, ExprKind::Variable);
        assert_eq!(evaluate("k.asc", &ctx).unwrap().1, ExprKind::File);
        assert_eq!(evaluate("k.asc * 2", &ctx).unwrap().1, ExprKind::Computed);
        assert_eq!(evaluate("S * 2", &ctx).unwrap().1, ExprKind::Constant);
    }

    #[test]
    fn shadowed_nodata_is_a_variable() {
        let ctx = TestCtx::new().with("NoData", grid(vec![4.0]));
        assert_eq!(evaluate("NoData", &ctx).unwrap().1, ExprKind::Variable);
        let ctx = TestCtx::new().with("NaN", Value::Scalar(5.0));
        let (v, kind) = evaluate("NaN", &ctx).unwrap();
        assert_eq!(v.as_scalar(), Some(5.0));
        assert_eq!(kind, ExprKind::Variable);
    }
}
