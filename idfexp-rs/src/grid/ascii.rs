//! ESRI ASCII raster reader and writer.
//!
//! ```text
//! ncols        3
//! nrows        2
//! xllcorner    155000
//! yllcorner    463000
//! cellsize     25
//! NODATA_value -9999
//! 1 2 3
//! 4 -9999 6
//! ```
//!
//! Header keys are case-insensitive; `xllcenter`/`yllcenter` are accepted in
//! place of the corner keys.  Writes go through a temporary file in the
//! target directory and are renamed into place.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use super::{GridData, GridError, GridHeader, DEFAULT_NODATA};

/// Read a raster file.
pub fn read(path: &Path) -> Result<GridData, GridError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext.eq_ignore_ascii_case("idf") {
        return Err(GridError::Unsupported(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|source| GridError::Io { path: path.to_path_buf(), source })?;
    parse_str(&text, path)
}

/// Parse raster text.  `path` is only used in error messages.
pub fn parse_str(text: &str, path: &Path) -> Result<GridData, GridError> {
    let err = |line: usize, message: String| GridError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    };
    let bad_dim = |line: usize| err(line, "ncols and nrows must be positive integers".into());

    let mut ncols = None;
    let mut nrows = None;
    let mut xll = None;
    let mut yll = None;
    let mut cellsize = None;
    let mut nodata = None;
    let mut centered = false;

    let mut lines = text.lines().enumerate().peekable();

    // Header: leading lines whose first token is alphabetic.
    while let Some(&(i, raw)) = lines.peek() {
        let mut parts = raw.split_whitespace();
        let Some(key) = parts.next() else {
            lines.next();
            continue;
        };
        if !key.starts_with(|c: char| c.is_ascii_alphabetic()) {
            break;
        }
        lines.next();
        let value = parts
            .next()
            .ok_or_else(|| err(i + 1, format!("header key '{key}' has no value")))?;
        let number: f64 = value
            .parse()
            .map_err(|_| err(i + 1, format!("invalid value '{value}' for '{key}'")))?;
        match key.to_ascii_lowercase().as_str() {
            "ncols" => ncols = Some(dimension(number).ok_or_else(|| bad_dim(i + 1))?),
            "nrows" => nrows = Some(dimension(number).ok_or_else(|| bad_dim(i + 1))?),
            "xllcorner" => xll = Some(number),
            "yllcorner" => yll = Some(number),
            "xllcenter" => {
                xll = Some(number);
                centered = true;
            }
            "yllcenter" => {
                yll = Some(number);
                centered = true;
            }
            "cellsize" => cellsize = Some(number),
            "nodata_value" => nodata = Some(number),
            other => return Err(err(i + 1, format!("unknown header key '{other}'"))),
        }
    }

    let (Some(ncols), Some(nrows), Some(cellsize)) = (ncols, nrows, cellsize) else {
        return Err(err(1, "header needs ncols, nrows and cellsize".into()));
    };
    let header = GridHeader {
        ncols,
        nrows,
        xll: xll.unwrap_or(0.0),
        yll: yll.unwrap_or(0.0),
        cellsize,
        nodata: nodata.unwrap_or(DEFAULT_NODATA),
        centered,
    };

    let Some(expected) = ncols.checked_mul(nrows) else {
        return Err(err(1, format!("{ncols} x {nrows} cells do not fit in memory")));
    };

    let mut cells = Vec::new();
    let mut last_line = 1;
    for (i, raw) in lines {
        last_line = i + 1;
        for tok in raw.split_whitespace() {
            let v: f64 = tok
                .parse()
                .map_err(|_| err(i + 1, format!("invalid cell value '{tok}'")))?;
            cells.push(if v == header.nodata { f64::NAN } else { v });
        }
    }
    if cells.len() != expected {
        return Err(err(last_line, format!("expected {expected} cells, found {}", cells.len())));
    }

    Ok(GridData { header, cells })
}

/// A header dimension: a whole number of at least one that fits `usize`.
fn dimension(number: f64) -> Option<usize> {
    let whole = number.is_finite() && number >= 1.0 && number.fract() == 0.0;
    // `usize::MAX as f64` rounds up, so the comparison must be strict.
    (whole && number < usize::MAX as f64).then(|| number as usize)
}

/// Render a grid as raster text.
pub fn to_string(data: &GridData) -> String {
    let h = &data.header;
    let (xkey, ykey) = if h.centered {
        ("xllcenter", "yllcenter")
    } else {
        ("xllcorner", "yllcorner")
    };
    let mut out = String::new();
    let _ = writeln!(out, "ncols        {}", h.ncols);
    let _ = writeln!(out, "nrows        {}", h.nrows);
    let _ = writeln!(out, "{xkey:<12} {}", h.xll);
    let _ = writeln!(out, "{ykey:<12} {}", h.yll);
    let _ = writeln!(out, "cellsize     {}", h.cellsize);
    let _ = writeln!(out, "NODATA_value {}", h.nodata);
    for row in data.cells.chunks(h.ncols.max(1)) {
        let line: Vec<String> = row
            .iter()
            .map(|&v| if v.is_nan() { h.nodata.to_string() } else { v.to_string() })
            .collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

/// Write `data` to `path`, creating parent directories as needed.
pub fn write(path: &Path, data: &GridData) -> Result<(), GridError> {
    let io_err = |source| GridError::Io { path: path.to_path_buf(), source };
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(to_string(data).as_bytes()).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
