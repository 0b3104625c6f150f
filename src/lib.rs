pub mod cli;
pub mod core;
pub mod logging;

/// Current crate version string exposed for CLI and tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
