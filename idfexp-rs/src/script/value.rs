//! Runtime values of the grid-expression language.
//!
//! A value is either a scalar or a grid.  Operators apply cell by cell;
//! scalars broadcast over every cell.  `NaN` stands for NoData and
//! propagates through arithmetic.

use std::fmt;

use crate::grid::{Grid, GridData, GridError, GridHeader};

/// A script runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Scalar(f64),
    Grid(Grid),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(x) if x.is_nan() => write!(f, "NoData"),
            Value::Scalar(x) => write!(f, "{x}"),
            Value::Grid(g) => match (g.output(), g.source()) {
                (Some(p), _) | (None, Some(p)) => write!(f, "grid {}", p.display()),
                (None, None) => write!(f, "grid (in memory)"),
            },
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Scalar(x)
    }
}

impl From<Grid> for Value {
    fn from(g: Grid) -> Self {
        Value::Grid(g)
    }
}

impl Value {
    pub fn is_grid(&self) -> bool {
        matches!(self, Value::Grid(_))
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(x) => Some(*x),
            Value::Grid(_) => None,
        }
    }

    pub fn as_grid(&self) -> Option<&Grid> {
        match self {
            Value::Grid(g) => Some(g),
            Value::Scalar(_) => None,
        }
    }

    pub fn as_grid_mut(&mut self) -> Option<&mut Grid> {
        match self {
            Value::Grid(g) => Some(g),
            Value::Scalar(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Grid(_) => "grid",
        }
    }

    // ── Cell-wise application ─────────────────────────────────────────────────

    /// Apply `f` to every cell (or to the scalar).
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Result<Value, GridError> {
        combine_n(std::slice::from_ref(self), |v| f(v[0]))
    }

    /// Apply `f` cell by cell to `self` and `rhs`.
    pub fn zip_with(&self, rhs: &Value, f: impl Fn(f64, f64) -> f64) -> Result<Value, GridError> {
        combine_n(&[self.clone(), rhs.clone()], |v| f(v[0], v[1]))
    }
}

/// Apply `f` cell by cell across `args`.
///
/// All grid operands must share a shape; the first grid's header is used
/// for the result.  Without any grid operand the result is a scalar.
pub fn combine_n(args: &[Value], f: impl Fn(&[f64]) -> f64) -> Result<Value, GridError> {
    let mut grids = Vec::with_capacity(args.len());
    for arg in args {
        grids.push(match arg {
            Value::Grid(g) => Some(g.data()?),
            Value::Scalar(_) => None,
        });
    }

    let Some(first) = grids.iter().flatten().next() else {
        let scalars: Vec<f64> = args.iter().filter_map(Value::as_scalar).collect();
        return Ok(Value::Scalar(f(&scalars)));
    };
    let header: GridHeader = first.header.clone();
    for data in grids.iter().flatten() {
        if !header.same_shape(&data.header) {
            return Err(GridError::ShapeMismatch {
                left: header.describe(),
                right: data.header.describe(),
            });
        }
    }

    let mut cells = Vec::with_capacity(header.cell_count());
    let mut buf = vec![0.0; args.len()];
    for i in 0..header.cell_count() {
        for (slot, (arg, data)) in buf.iter_mut().zip(args.iter().zip(&grids)) {
            *slot = match (arg, data) {
                (_, Some(d)) => d.cells[i],
                (Value::Scalar(x), None) => *x,
                (Value::Grid(_), None) => f64::NAN,
            };
        }
        cells.push(f(&buf));
    }
    Ok(Value::Grid(Grid::from_data(GridData::new(header, cells))))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(cells: Vec<f64>) -> Value {
        let header = GridHeader::new(cells.len(), 1, 10.0);
        Value::Grid(Grid::from_data(GridData::new(header, cells)))
    }

    fn cells(v: &Value) -> Vec<f64> {
        v.as_grid().unwrap().data().unwrap().cells.clone()
    }

    #[test]
    fn scalars_stay_scalar() {
        let v = Value::Scalar(2.0).zip_with(&Value::Scalar(3.0), |a, b| a * b).unwrap();
        assert_eq!(v.as_scalar(), Some(6.0));
    }

    #[test]
    fn scalar_broadcasts_over_grid() {
        let v = Value::Scalar(10.0).zip_with(&grid(vec![1.0, 2.0]), |a, b| a - b).unwrap();
        assert_eq!(cells(&v), vec![9.0, 8.0]);
    }

    #[test]
    fn nodata_propagates() {
        let v = grid(vec![1.0, f64::NAN]).map(|x| x * 2.0).unwrap();
        let c = cells(&v);
        assert_eq!(c[0], 2.0);
        assert!(c[1].is_nan());
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let e = grid(vec![1.0, 2.0]).zip_with(&grid(vec![1.0]), |a, b| a + b).unwrap_err();
        assert!(matches!(e, GridError::ShapeMismatch { .. }));
    }

    #[test]
    fn combined_grid_is_unsaved() {
        let v = grid(vec![1.0]).map(|x| x).unwrap();
        let g = v.as_grid().unwrap();
        assert!(g.is_dirty());
        assert!(g.source().is_none());
    }

    #[test]
    fn display() {
        assert_eq!(Value::Scalar(1.5).to_string(), "1.5");
        assert_eq!(Value::Scalar(f64::NAN).to_string(), "NoData");
        assert_eq!(grid(vec![1.0]).to_string(), "grid (in memory)");
    }
}
