pub mod args;
pub mod commands;

pub use args::{RepairArgs, ReportFormat, ValidateArgs};
use clap::{Parser, Subcommand};
use std::process::ExitCode;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
PIPELINE COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "flowmend")]
#[command(version = crate::VERSION)]
#[command(about = "Structural validator and repair engine for automation pipeline documents")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: validate a pipeline, inspect the findings, then repair with a topology policy."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Check a pipeline document for structural problems",
        long_about = "Validate classifies every node, rebuilds the typed connection graph, and runs the full rule battery. Read-only; exits non-zero when ERROR findings exist.",
        after_help = "Example:\n    flowmend validate ./pipeline.json --policy ./topology.yaml"
    )]
    Validate(ValidateArgs),
    #[command(
        about = "Synthesize the minimal missing edges and nodes",
        long_about = "Repair consults the topology template, adds what is provably absent, re-validates after every pass, and writes a timestamped backup before overwriting the document. Nothing is ever deleted.",
        after_help = "Example:\n    flowmend repair ./pipeline.json --policy ./topology.yaml --dry-run"
    )]
    Repair(RepairArgs),
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Validate(args) => commands::validate(args),
        Command::Repair(args) => commands::repair(args),
    }
}
