pub mod locate;
pub mod markers;
pub mod scan;

pub use locate::run_locate_command;
pub use markers::run_markers_command;
pub use scan::run_scan_command;
