pub mod cli;
pub mod config;
pub mod orchestrator;
pub mod parser;
pub mod report;
pub mod stats;

// Re-export core types for convenience
pub use tplsentry_core::{compute_shifted_location, FileContext, TextPointer, TextRange};
