//! IDFexp: a grid-expression script interpreter.
//!
//! | Module      | Contents                                          |
//! |-------------|---------------------------------------------------|
//! | [`cli`]     | command-line parsing                              |
//! | [`config`]  | [`Settings`](config::Settings) and settings files |
//! | [`error`]   | [`ScriptError`](error::ScriptError)               |
//! | [`grid`]    | lazily loaded ESRI ASCII rasters                  |
//! | [`logging`] | tracing subscriber set-up                         |
//! | [`pattern`] | file-name filters for `count()`                   |
//! | [`script`]  | the script interpreter                            |

pub mod cli;
pub mod config;
pub mod error;
pub mod grid;
pub mod logging;
pub mod pattern;
pub mod script;
