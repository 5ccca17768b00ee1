use anyhow::Result;
use std::path::{Path, PathBuf};

/// Directory traversal that collects template and manifest files.
pub struct FileDiscovery {
    root_path: PathBuf,
    supported_extensions: Vec<String>,
    excludes: Vec<String>,
}

impl FileDiscovery {
    /// Extensions analyzed by default
    const DEFAULT_EXTENSIONS: &'static [&'static str] = &["yaml", "yml", "tpl"];

    /// Directories never descended into
    const SKIPPED_DIRS: &'static [&'static str] = &[".git", "node_modules", "target"];

    /// Create a new FileDiscovery with default extensions
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            supported_extensions: Self::DEFAULT_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            excludes: Vec::new(),
        }
    }

    /// Create a new FileDiscovery with custom extensions
    pub fn with_extensions(root_path: PathBuf, extensions: Vec<String>) -> Self {
        Self {
            root_path,
            supported_extensions: extensions,
            excludes: Vec::new(),
        }
    }

    /// Skip files and directories whose name equals one of `names`, or whose path
    /// relative to the root starts with one of them.
    pub fn with_excludes(mut self, names: Vec<String>) -> Self {
        self.excludes = names;
        self
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Check if an extension is supported
    pub fn is_supported_extension(&self, ext: &str) -> bool {
        self.supported_extensions.contains(&ext.to_lowercase())
    }

    /// All supported files under the root, sorted by path
    pub fn get_files(&self) -> Result<Vec<PathBuf>> {
        self.get_files_in_path(&self.root_path)
    }

    pub fn get_files_in_path(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if path.is_file() {
            if self.is_supported_file(path) {
                return Ok(vec![path.to_path_buf()]);
            }
            return Ok(vec![]);
        }

        if !path.is_dir() {
            anyhow::bail!("Path does not exist: {}", path.display());
        }

        let mut files = Vec::new();
        self.visit_dirs(path, &mut |p: &Path| {
            if self.is_supported_file(p) {
                files.push(p.to_path_buf());
            }
        })?;

        files.sort();
        Ok(files)
    }

    fn is_supported_file(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| self.is_supported_extension(&ext.to_string_lossy()))
            && !self.is_excluded(path)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.excludes.is_empty() {
            return false;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let relative = path.strip_prefix(&self.root_path).unwrap_or(path);
        self.excludes
            .iter()
            .any(|exclude| name == *exclude || relative.starts_with(exclude))
    }

    /// Recursively visit directories and call callback for each file
    pub fn visit_dirs<F>(&self, dir: &Path, cb: &mut F) -> std::io::Result<()>
    where
        F: FnMut(&Path),
    {
        if dir.is_dir() {
            for entry in std::fs::read_dir(dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.is_dir() {
                    let skipped = path
                        .file_name()
                        .is_some_and(|n| Self::SKIPPED_DIRS.iter().any(|d| *d == n.to_string_lossy()));
                    if !skipped && !self.is_excluded(&path) {
                        self.visit_dirs(&path, cb)?;
                    }
                } else {
                    cb(&path);
                }
            }
        }
        Ok(())
    }
}
