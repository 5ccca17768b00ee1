//! Template text transformations around evaluation.
//!
//! - `add_line_markers` tags every original line with its origin before evaluation
//! - `clean_evaluated` strips the tags afterwards and builds the Shift Table
//! - `contains_template_directives` decides whether a file needs evaluation at all

mod cleaner;
mod preprocessor;
mod probe;

pub use cleaner::{clean_evaluated, CleanedSource};
pub use preprocessor::{add_line_markers, unmatched_opening_braces, MarkedSource};
pub use probe::contains_template_directives;
