//! Core types for tplsentry.
//!
//! This crate provides the pieces every pipeline stage shares:
//! - Text positions (TextPointer, TextRange)
//! - The line-origin marker grammar (LineMarker)
//! - The per-file Shift Table and FileContext
//! - The Location Shifter that maps expanded positions back to the original source

mod context;
mod lines;
mod location;
mod marker;
mod shift_table;
mod shifter;

pub use context::FileContext;
pub use lines::{line_count, split_lines, OriginalLines, SourceLine};
pub use location::{TextPointer, TextRange};
pub use marker::{split_trailing_marker, LineMarker, MarkerError};
pub use shift_table::ShiftTable;
pub use shifter::{compute_shifted_location, shift_point, shift_range, ShiftError};
