//! Script variable table.
//!
//! Names are case-sensitive.  The table remembers insertion order so the
//! memory manager visits grids in a stable order; rebinding a name keeps
//! its original position.  `NoData` and `NaN` are pre-registered constants.

use std::collections::HashMap;

use super::value::Value;
use crate::grid::Grid;

/// Names pre-bound to the NoData scalar.  Scripts may rebind them.
pub const RESERVED: [&str; 2] = ["NoData", "NaN"];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

/// How a bound value came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprKind {
    /// Nothing could be resolved (silent-skip quiet mode).
    Undefined,
    /// A literal or a scalar result.
    Constant,
    /// A raster file reference.
    File,
    /// A copy of another variable.
    Variable,
    /// A composite expression with a grid result.
    Computed,
}

impl ExprKind {
    /// Whether a grid of this kind is written to the output directory.
    pub fn is_output(self) -> bool {
        matches!(self, ExprKind::Variable | ExprKind::Computed)
    }
}

/// One named entry in the table.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    /// `None` when the right-hand side could not be resolved.
    pub value: Option<Value>,
    pub kind: ExprKind,
    /// Output subdirectory taken from the assignment target.
    pub subdir: Option<String>,
}

impl Binding {
    pub fn new(name: impl Into<String>, value: Value, kind: ExprKind) -> Self {
        Binding { name: name.into(), value: Some(value), kind, subdir: None }
    }

    pub fn null(name: impl Into<String>) -> Self {
        Binding { name: name.into(), value: None, kind: ExprKind::Undefined, subdir: None }
    }
}

#[derive(Debug)]
pub struct VariableTable {
    bindings: Vec<Binding>,
    index: HashMap<String, usize>,
}

impl Default for VariableTable {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableTable {
    pub fn new() -> Self {
        let mut table = VariableTable { bindings: Vec::new(), index: HashMap::new() };
        for name in RESERVED {
            table.bind(Binding::new(name, Value::Scalar(f64::NAN), ExprKind::Constant));
        }
        table
    }

    /// Insert or replace a binding.  Last write wins.
    pub fn bind(&mut self, binding: Binding) {
        match self.index.get(&binding.name) {
            Some(&i) => self.bindings[i] = binding,
            None => {
                self.index.insert(binding.name.clone(), self.bindings.len());
                self.bindings.push(binding);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.index.get(name).map(|&i| &self.bindings[i])
    }

    /// The bound value, if the name exists and is not null.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name)?.value.as_ref()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    /// Every bound grid, in insertion order.
    pub fn grids_mut(&mut self) -> impl Iterator<Item = (&str, &mut Grid)> {
        self.bindings.iter_mut().filter_map(|b| match &mut b.value {
            Some(Value::Grid(g)) => Some((b.name.as_str(), g)),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
