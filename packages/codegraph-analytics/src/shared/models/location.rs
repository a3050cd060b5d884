//! Source location types
//!
//! A `Location` pins a symbol, call site, or edge to a region of a source
//! file. Unlike a bare line/column span it carries the file path, because
//! edges are indexed by the file their relationship was observed in.

use serde::{Deserialize, Serialize};

/// Region of a source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Location {
    pub file_path: String,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Location {
    pub fn new(
        file_path: impl Into<String>,
        start_line: u32,
        start_col: u32,
        end_line: u32,
        end_col: u32,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Location with a file but no position (synthetic edges)
    pub fn in_file(file_path: impl Into<String>) -> Self {
        Self::new(file_path, 0, 0, 0, 0)
    }

    /// Zero location (no file, no position)
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    pub fn line_count(&self) -> u32 {
        if self.end_line >= self.start_line {
            self.end_line - self.start_line + 1
        } else {
            0
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}-{}:{}",
            self.file_path, self.start_line, self.start_col, self.end_line, self.end_col
        )
    }
}
