//! Per-file analysis context.

use std::path::{Path, PathBuf};

use crate::shift_table::ShiftTable;

/// State owned by the analysis of one file.
///
/// A context without a shift table belongs to a file that was never templated;
/// shifting through it is the identity.
#[derive(Debug, Clone)]
pub struct FileContext {
    path: PathBuf,
    shift_table: Option<ShiftTable>,
}

impl FileContext {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            shift_table: None,
        }
    }

    #[must_use]
    pub fn with_shift_table(mut self, table: ShiftTable) -> Self {
        self.shift_table = Some(table);
        self
    }

    pub fn set_shift_table(&mut self, table: ShiftTable) {
        self.shift_table = Some(table);
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name component, or the whole path when there is none.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    #[must_use]
    pub fn shift_table(&self) -> Option<&ShiftTable> {
        self.shift_table.as_ref()
    }

    #[must_use]
    pub fn is_templated(&self) -> bool {
        self.shift_table.is_some()
    }
}
