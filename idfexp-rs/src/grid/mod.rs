//! Raster grid collaborator.
//!
//! A [`Grid`] is a lazily loaded raster: it remembers the file its cells can
//! be (re)read from, caches the cells once touched, and can be asked to
//! persist itself to an output path and drop the cache again.  The script
//! interpreter relies on exactly that contract to keep its working set small.
//!
//! On disk grids are ESRI ASCII rasters (see [`ascii`]).  In memory NoData
//! cells are `NaN`; the header keeps the on-disk NoData value for writing.

pub mod ascii;
pub mod metadata;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;

pub use metadata::Metadata;

/// File extension written for computed grids.
pub const GRID_EXTENSION: &str = "ASC";

/// Extensions recognised as raster references (case-insensitive).
pub const RASTER_EXTENSIONS: &[&str] = &["asc", "idf"];

/// Default NoData value used when a header omits `NODATA_value`.
pub const DEFAULT_NODATA: f64 = -9999.0;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: line {line}: {message}", .path.display())]
    Parse { path: PathBuf, line: usize, message: String },

    #[error("grid extents differ: {left} vs {right}")]
    ShapeMismatch { left: String, right: String },

    #[error("unsupported raster format: {}", .0.display())]
    Unsupported(PathBuf),

    #[error("grid has no backing file and no cells")]
    Unbacked,
}

// ── Header / data ─────────────────────────────────────────────────────────────

/// Georeferencing and shape of a raster.
#[derive(Debug, Clone, PartialEq)]
pub struct GridHeader {
    pub ncols: usize,
    pub nrows: usize,
    pub xll: f64,
    pub yll: f64,
    pub cellsize: f64,
    pub nodata: f64,
    /// `true` when `xll`/`yll` describe the centre of the lower-left cell.
    pub centered: bool,
}

impl GridHeader {
    pub fn new(ncols: usize, nrows: usize, cellsize: f64) -> Self {
        GridHeader {
            ncols,
            nrows,
            xll: 0.0,
            yll: 0.0,
            cellsize,
            nodata: DEFAULT_NODATA,
            centered: false,
        }
    }

    pub fn cell_count(&self) -> usize {
        self.ncols.saturating_mul(self.nrows)
    }

    /// Whether two grids can be combined cell by cell.
    pub fn same_shape(&self, other: &GridHeader) -> bool {
        self.ncols == other.ncols && self.nrows == other.nrows
    }

    pub fn describe(&self) -> String {
        format!("{}x{} @ {}", self.ncols, self.nrows, self.cellsize)
    }
}

/// A fully loaded raster.
#[derive(Debug, Clone, PartialEq)]
pub struct GridData {
    pub header: GridHeader,
    /// Row-major, top row first.  NoData is `NaN`.
    pub cells: Vec<f64>,
}

impl GridData {
    pub fn new(header: GridHeader, cells: Vec<f64>) -> Self {
        debug_assert_eq!(header.cell_count(), cells.len());
        GridData { header, cells }
    }

    /// A grid with every cell set to `value`.
    pub fn filled(header: GridHeader, value: f64) -> Self {
        let cells = vec![value; header.cell_count()];
        GridData { header, cells }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.header.nrows || col >= self.header.ncols {
            return None;
        }
        self.cells.get(row * self.header.ncols + col).copied()
    }

    /// Round every data cell to `decimals` places; NoData stays NoData.
    pub fn rounded(&self, decimals: u32) -> GridData {
        let cells = self.cells.iter().map(|&v| round_decimals(v, i64::from(decimals))).collect();
        GridData { header: self.header.clone(), cells }
    }
}

/// Round `value` to `decimals` places (negative rounds to tens, hundreds...).
/// A value whose scaled form is not finite is returned unchanged, so very
/// large decimal counts are a no-op rather than NoData.
pub fn round_decimals(value: f64, decimals: i64) -> f64 {
    let factor = 10f64.powi(decimals.clamp(-308, 308) as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

// ── Grid ──────────────────────────────────────────────────────────────────────

/// What a call to [`Grid::release`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Released {
    /// The grid was dirty and has been written to this path.
    Written(PathBuf),
    /// Cached cells were dropped; they reload from the backing file.
    Dropped,
    /// Nothing to do (already released, or nothing to reload from).
    Idle,
}

/// A lazily loaded, releasable raster value.
#[derive(Debug, Clone)]
pub struct Grid {
    /// File the cells can be reloaded from.
    source: Option<PathBuf>,
    /// Where the grid is written when it is released while dirty.
    output: Option<PathBuf>,
    cache: RefCell<Option<Rc<GridData>>>,
    dirty: bool,
    metadata: Option<Metadata>,
}

impl Grid {
    /// A grid backed by an existing raster file; nothing is read yet.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Grid {
            source: Some(path.into()),
            output: None,
            cache: RefCell::new(None),
            dirty: false,
            metadata: None,
        }
    }

    /// An in-memory grid, e.g. the result of an expression.
    pub fn from_data(data: GridData) -> Self {
        Grid {
            source: None,
            output: None,
            cache: RefCell::new(Some(Rc::new(data))),
            dirty: true,
            metadata: None,
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.borrow().is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The grid's cells, loading them from the backing file on first use.
    pub fn data(&self) -> Result<Rc<GridData>, GridError> {
        if let Some(data) = self.cache.borrow().as_ref() {
            return Ok(Rc::clone(data));
        }
        let path = self.source.as_deref().ok_or(GridError::Unbacked)?;
        let data = Rc::new(ascii::read(path)?);
        *self.cache.borrow_mut() = Some(Rc::clone(&data));
        Ok(data)
    }

    pub fn header(&self) -> Result<GridHeader, GridError> {
        Ok(self.data()?.header.clone())
    }

    pub fn nodata(&self) -> Result<f64, GridError> {
        Ok(self.data()?.header.nodata)
    }

    /// Give the grid a destination; it becomes dirty until written.
    pub fn set_output(&mut self, path: impl Into<PathBuf>) {
        self.output = Some(path.into());
        self.dirty = true;
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = Some(metadata);
        self.dirty = true;
    }

    /// Round all cells in place to `decimals` places.
    pub fn round(&mut self, decimals: u32) -> Result<(), GridError> {
        let rounded = self.data()?.rounded(decimals);
        *self.cache.borrow_mut() = Some(Rc::new(rounded));
        self.dirty = true;
        Ok(())
    }

    /// Write the grid (and its metadata sidecar, if any) to `path`.  The
    /// written file becomes the grid's backing source.
    pub fn write(&mut self, path: &Path) -> Result<(), GridError> {
        let data = self.data()?;
        ascii::write(path, &data)?;
        if let Some(meta) = &self.metadata {
            meta.write_sidecar(path)?;
        }
        self.source = Some(path.to_path_buf());
        self.dirty = false;
        Ok(())
    }

    /// Persist if dirty, then drop the cached cells if they can be reloaded.
    /// Repeated calls are no-ops.
    pub fn release(&mut self) -> Result<Released, GridError> {
        let mut written = None;
        if self.dirty {
            if let Some(out) = self.output.clone() {
                self.write(&out)?;
                written = Some(out);
            }
        }
        if self.dirty || self.source.is_none() {
            // Unnamed in-memory result: the cache is the only copy.
            return Ok(Released::Idle);
        }
        let had_cache = self.cache.borrow_mut().take().is_some();
        Ok(match (written, had_cache) {
            (Some(path), _) => Released::Written(path),
            (None, true) => Released::Dropped,
            (None, false) => Released::Idle,
        })
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Whether `text` names a raster file by extension.
pub fn is_raster_path(text: &str) -> bool {
    Path::new(text.trim())
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| RASTER_EXTENSIONS.iter().any(|r| e.eq_ignore_ascii_case(r)))
        .unwrap_or(false)
}

/// Turn a script path into a platform path.  Scripts are usually written
/// with `\` separators; elsewhere those become `/`.
pub fn normalize_path(text: &str) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(text)
    } else {
        PathBuf::from(text.replace('\\', "/"))
    }
}

/// Resolve `text` against `base` unless it is already absolute.
pub fn resolve_path(base: &Path, text: &str) -> PathBuf {
    let path = normalize_path(text.trim());
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GridData {
        GridData::new(GridHeader::new(2, 2, 25.0), vec![1.234, 2.5, f64::NAN, -0.006])
    }

    #[test]
    fn rounding_keeps_nodata() {
        let r = sample().rounded(2);
        assert_eq!(r.cells[0], 1.23);
        assert_eq!(r.cells[1], 2.5);
        assert!(r.cells[2].is_nan());
        assert_eq!(r.cells[3], -0.01);
    }

    #[test]
    fn huge_decimal_counts_leave_values_alone() {
        let r = sample().rounded(400);
        assert_eq!(r.cells[0], 1.234);
        assert!(r.cells[2].is_nan());
        assert_eq!(sample().rounded(u32::MAX).cells[1], 2.5);
        assert_eq!(round_decimals(1.5, 308), 1.5);
        assert_eq!(round_decimals(1234.0, -2), 1200.0);
        assert_eq!(round_decimals(1234.0, -400), 0.0);
        assert_eq!(round_decimals(f64::MAX, 2), f64::MAX);
    }

    #[test]
    fn cell_count_saturates() {
        let h = GridHeader::new(usize::MAX, 2, 1.0);
        assert_eq!(h.cell_count(), usize::MAX);
    }

    #[test]
    fn raster_extension_detection() {
        assert!(is_raster_path("heads.ASC"));
        assert!(is_raster_path(r"sub\top_l1.idf"));
        assert!(!is_raster_path("notes.txt"));
        assert!(!is_raster_path("K"));
    }

    #[test]
    fn in_memory_grid_is_not_dropped_without_output() {
        let mut g = Grid::from_data(sample());
        assert_eq!(g.release().unwrap(), Released::Idle);
        assert!(g.is_loaded());
    }

    #[test]
    fn release_writes_then_drops_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out").join("X.ASC");
        let mut g = Grid::from_data(sample());
        g.set_output(&out);

        assert_eq!(g.release().unwrap(), Released::Written(out.clone()));
        assert!(!g.is_loaded());
        assert!(out.is_file());
        // Second release is a no-op.
        assert_eq!(g.release().unwrap(), Released::Idle);

        let data = g.data().unwrap();
        assert_eq!(data.cells[1], 2.5);
        assert!(data.cells[2].is_nan());
        assert_eq!(g.release().unwrap(), Released::Dropped);
    }

    #[test]
    fn unbacked_grid_cannot_load() {
        let g = Grid {
            source: None,
            output: None,
            cache: RefCell::new(None),
            dirty: false,
            metadata: None,
        };
        assert!(matches!(g.data(), Err(GridError::Unbacked)));
    }

    #[test]
    fn resolve_relative_against_base() {
        let p = resolve_path(Path::new("/data"), r"sub\a.asc");
        if cfg!(windows) {
            assert_eq!(p, Path::new("/data").join(r"sub\a.asc"));
        } else {
            assert_eq!(p, PathBuf::from("/data/sub/a.asc"));
        }
    }
}
