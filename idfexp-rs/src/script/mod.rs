//! IDFexp script language.
//!
//! A script is a line-oriented list of grid assignments, loops and guarded
//! lines:
//!
//! ```text
//! REM transmissivity per layer
//! FOR i=1 TO count(%MODEL%\kh, kh_l*.asc)
//!   #IF EXIST kh_l%%i.asc: KD_L%%i = kh_l%%i.asc * D_L%%i
//! ENDFOR
//! ```
//!
//! | Module      | Role                                              |
//! |-------------|---------------------------------------------------|
//! | [`stmt`]    | continuation joining, line classification         |
//! | [`expand`]  | `%NAME%` expansion, comparison-operator escaping  |
//! | [`loops`]   | loop frames and `%%` index substitution           |
//! | [`precond`] | `#IF [NOT] EXIST` guards                          |
//! | [`count`]   | `count(<dir>[,<filter>])` loop bounds             |
//! | [`expr`]    | grid-expression parser and evaluator              |
//! | [`value`]   | scalar/grid values                                |
//! | [`vars`]    | variable table                                    |
//! | [`interp`]  | the line dispatcher and memory manager            |
//!
//! # Quick start
//!
//! ```rust
//! use idfexp::config::Settings;
//! use idfexp::script::Interpreter;
//!
//! let mut interp = Interpreter::new(Settings::new());
//! interp.run_str("FOR i=1 TO 3\n  X%%i = %%i * 2\nENDFOR\n").unwrap();
//! assert_eq!(interp.variables().value("X3").unwrap().as_scalar(), Some(6.0));
//! ```

pub mod count;
pub mod expand;
pub mod expr;
pub mod interp;
pub mod loops;
pub mod precond;
pub mod stmt;
pub mod value;
pub mod vars;

// Re-exports for convenience.
pub use expr::EvalContext;
pub use interp::{Interpreter, RunStats};
pub use value::Value;
pub use vars::{Binding, ExprKind, VariableTable};
