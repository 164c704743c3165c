// ABOUTME: Target geometry and content-addressed dedup keys for the image store
// ABOUTME: Keys combine a SHA-256 of the source bytes with the requested cell geometry

use crate::constants::grid;
use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fmt;

/// Size of the placeholder grid in terminal cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    columns: u32,
    rows: u32,
}

impl Geometry {
    pub fn new(columns: u32, rows: u32) -> Result<Self> {
        if columns == 0 || rows == 0 {
            return Err(Error::InvalidGeometry {
                columns,
                rows,
                reason: "columns and rows must be positive",
            });
        }
        if columns > grid::MAX_DIMENSION || rows > grid::MAX_DIMENSION {
            return Err(Error::InvalidGeometry {
                columns,
                rows,
                reason: "columns and rows are limited to 1024 cells",
            });
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.columns, self.rows)
    }
}

/// Textual key the image store indexes uploads by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    /// Derive the key for `content` displayed at `geometry`.
    ///
    /// The layout is `<hex sha256>x<rows>x<columns>`, right-padded with `=`
    /// to a multiple of four characters so the store accepts it as an
    /// encoded token whatever encoding it assumes.
    pub fn derive(content: &[u8], geometry: Geometry) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        let hash = format!("{:x}", hasher.finalize());

        let mut key = format!("{}x{}x{}", hash, geometry.rows(), geometry.columns());
        while key.len() % 4 != 0 {
            key.push('=');
        }

        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
