use anyhow::{Context, Result};
use std::path::Path;

use tplsentry_template::add_line_markers;

/// Print `file` exactly as the evaluator would receive it.
pub fn run_markers_command(file: &Path) -> Result<()> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    print!("{}", add_line_markers(&source).text);
    if !source.ends_with('\n') {
        println!();
    }
    Ok(())
}
