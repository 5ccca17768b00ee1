use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Chart metadata file that marks the root directory of a chart.
pub const CHART_FILE: &str = "Chart.yaml";

const VALUES_FILES: &[&str] = &["values.yaml", "values.yml"];

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Failed to find values file")]
    MissingValues,

    #[error("File at {0} is empty")]
    EmptyFile(PathBuf),

    #[error("Failed to read file at {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Role a file plays inside a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartFileKind {
    /// `values.yaml` or `values.yml` at the chart root
    Values,
    /// `Chart.yaml` at the chart root
    Metadata,
    /// `*.tpl` named-template definitions
    Helper,
    /// Anything else; analyzed as a template
    Template,
}

impl ChartFileKind {
    /// Values, metadata and helpers feed the evaluation of other files and are
    /// not analyzed on their own.
    pub fn is_evaluation_input(self) -> bool {
        !matches!(self, ChartFileKind::Template)
    }
}

pub struct ChartLayout;

impl ChartLayout {
    /// Nearest directory containing `Chart.yaml`, walking up from `file` but never
    /// above `base_dir`.
    pub fn find_chart_root(file: &Path, base_dir: &Path) -> Option<PathBuf> {
        let mut current = file.parent();
        while let Some(dir) = current {
            if !dir.starts_with(base_dir) {
                return None;
            }
            if dir.join(CHART_FILE).is_file() {
                return Some(dir.to_path_buf());
            }
            current = dir.parent();
        }
        None
    }

    pub fn classify(file: &Path, chart_root: Option<&Path>) -> ChartFileKind {
        let is_helper = file
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tpl"));
        if is_helper {
            return ChartFileKind::Helper;
        }

        let Some(root) = chart_root else {
            return ChartFileKind::Template;
        };
        if file.parent() != Some(root) {
            return ChartFileKind::Template;
        }

        match file.file_name().and_then(|n| n.to_str()) {
            Some(name) if VALUES_FILES.contains(&name) => ChartFileKind::Values,
            Some(CHART_FILE) => ChartFileKind::Metadata,
            _ => ChartFileKind::Template,
        }
    }

    /// Files the evaluator needs besides the template itself, keyed by their path
    /// relative to the chart root with `/` separators.
    ///
    /// The values file is required. `Chart.yaml` and every `*.tpl` helper of the
    /// chart are included when present. None of them may be blank.
    pub fn auxiliary_files(
        template: &Path,
        chart_root: Option<&Path>,
    ) -> Result<BTreeMap<String, String>, ChartError> {
        let root = chart_root.ok_or(ChartError::MissingValues)?;
        let values_path = VALUES_FILES
            .iter()
            .map(|name| root.join(name))
            .find(|path| path.is_file())
            .ok_or(ChartError::MissingValues)?;

        let mut files = BTreeMap::new();
        files.insert(relative_name(root, &values_path), read_non_blank(&values_path)?);

        let chart_file = root.join(CHART_FILE);
        if chart_file.is_file() {
            files.insert(CHART_FILE.to_string(), read_non_blank(&chart_file)?);
        }

        let mut helpers = Vec::new();
        collect_helpers(root, &mut helpers)?;
        for helper in helpers.into_iter().filter(|h| h != template) {
            let content = read_non_blank(&helper)?;
            files.insert(relative_name(root, &helper), content);
        }

        Ok(files)
    }
}

/// `path` relative to `root`, with forward slashes.
pub fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn read_non_blank(path: &Path) -> Result<String, ChartError> {
    let content = std::fs::read_to_string(path).map_err(|source| ChartError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Err(ChartError::EmptyFile(path.to_path_buf()));
    }
    Ok(content)
}

fn collect_helpers(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ChartError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ChartError::Unreadable {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let path = entry
            .map_err(|source| ChartError::Unreadable {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.is_dir() {
            collect_helpers(&path, out)?;
        } else if ChartLayout::classify(&path, None) == ChartFileKind::Helper {
            out.push(path);
        }
    }
    Ok(())
}
