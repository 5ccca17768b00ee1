//! File system helpers for tplsentry.
//!
//! - `FileDiscovery` walks a target directory for template and manifest files
//! - `ChartLayout` locates chart roots and gathers the files a template needs

mod chart;
mod file_discovery;

pub use chart::{relative_name, ChartError, ChartFileKind, ChartLayout, CHART_FILE};
pub use file_discovery::FileDiscovery;
