use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct ValidateArgs {
    /// Pipeline document to check (JSON)
    #[arg(value_name = "FILE")]
    pub document: PathBuf,

    /// Engine policy / topology template (YAML, default: built-in policy)
    #[arg(long, value_name = "FILE", help_heading = "Configuration")]
    pub policy: Option<PathBuf>,

    /// Emit either terminal-friendly text or machine-readable JSON
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: ReportFormat,

    /// Enable verbose diagnostics on stderr
    #[arg(long, help_heading = "Output Options")]
    pub verbose: bool,
}

#[derive(Args)]
pub struct RepairArgs {
    /// Pipeline document to repair in place (JSON)
    #[arg(value_name = "FILE")]
    pub document: PathBuf,

    /// Engine policy / topology template (YAML, default: built-in policy)
    #[arg(long, value_name = "FILE", help_heading = "Configuration")]
    pub policy: Option<PathBuf>,

    /// Cap the repair-then-reverify loop after this many passes
    #[arg(long, value_name = "N", help_heading = "Configuration")]
    pub max_passes: Option<usize>,

    /// Plan and report repairs without writing the document
    #[arg(long)]
    pub dry_run: bool,

    /// Emit either terminal-friendly text or machine-readable JSON
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: ReportFormat,

    /// Enable verbose diagnostics on stderr
    #[arg(long, help_heading = "Output Options")]
    pub verbose: bool,
}

#[derive(Clone, clap::ValueEnum, Debug)]
pub enum ReportFormat {
    /// Human-readable summary
    Text,
    /// JSON payload suitable for downstream tooling
    Json,
}
