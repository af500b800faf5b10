//! Metadata sidecar written next to computed grids (`<name>.MET`).

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::GridError;

/// Description of how a grid was produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    pub description: String,
    /// The expression the grid was computed from.
    pub source: String,
    pub producer: String,
    pub decimals: Option<u32>,
}

impl Metadata {
    /// Metadata for `name = expression`.
    pub fn for_expression(name: &str, expression: &str, decimals: Option<u32>) -> Self {
        Metadata {
            description: format!("{name} computed by grid expression"),
            source: expression.to_owned(),
            producer: format!("idfexp {}", env!("CARGO_PKG_VERSION")),
            decimals,
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "description={}", self.description);
        let _ = writeln!(out, "source={}", self.source);
        let _ = writeln!(out, "producer={}", self.producer);
        if let Some(d) = self.decimals {
            let _ = writeln!(out, "decimals={d}");
        }
        out
    }

    /// Sidecar path for a grid file.
    pub fn sidecar_path(grid_path: &Path) -> PathBuf {
        grid_path.with_extension("MET")
    }

    pub fn write_sidecar(&self, grid_path: &Path) -> Result<(), GridError> {
        let path = Self::sidecar_path(grid_path);
        std::fs::write(&path, self.to_text()).map_err(|source| GridError::Io { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_text() {
        let m = Metadata::for_expression("KD", "K * D", Some(2));
        let text = m.to_text();
        assert!(text.contains("source=K * D\n"));
        assert!(text.contains("decimals=2\n"));
        assert!(text.starts_with("description=KD computed"));
    }

    #[test]
    fn sidecar_sits_next_to_grid() {
        assert_eq!(
            Metadata::sidecar_path(Path::new("out/KD.ASC")),
            PathBuf::from("out/KD.MET")
        );
    }
}
